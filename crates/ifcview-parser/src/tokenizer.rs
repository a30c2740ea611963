// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STEP entity tokenizer built on nom combinators
//!
//! Turns one `#id=TYPE(...);` instance line into a [`DecodedEntity`].

use ifcview_model::{AttributeValue, DecodedEntity, EntityId, IfcType};
use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{opt, recognize},
    error::{Error, ErrorKind},
    multi::separated_list0,
    sequence::{delimited, pair},
    IResult, Parser,
};

/// Borrowed token, converted to an owned [`AttributeValue`] once a line parses
#[derive(Clone, Debug, PartialEq)]
pub enum Token<'a> {
    EntityRef(u32),
    /// Raw string body, still STEP-escaped
    String(&'a str),
    Integer(i64),
    Float(f64),
    Enum(&'a str),
    List(Vec<Token<'a>>),
    TypedValue(&'a str, Vec<Token<'a>>),
    Null,
    Derived,
}

impl Token<'_> {
    pub fn to_attribute_value(&self) -> AttributeValue {
        match self {
            Token::EntityRef(id) => AttributeValue::EntityRef(EntityId(*id)),
            Token::String(s) => AttributeValue::String(decode_step_string(s)),
            Token::Integer(i) => AttributeValue::Integer(*i),
            Token::Float(f) => AttributeValue::Float(*f),
            Token::Enum(s) => AttributeValue::Enum((*s).to_string()),
            Token::List(items) => {
                AttributeValue::List(items.iter().map(Token::to_attribute_value).collect())
            }
            Token::TypedValue(name, args) => AttributeValue::TypedValue(
                name.to_ascii_uppercase(),
                args.iter().map(Token::to_attribute_value).collect(),
            ),
            Token::Null => AttributeValue::Null,
            Token::Derived => AttributeValue::Derived,
        }
    }
}

/// Decode STEP string escapes
///
/// Handles doubled quotes and backslashes, `\X\hh` (ISO 8859-1),
/// `\X2\hhhh...\X0\` (UCS-2) and `\X4\hhhhhhhh...\X0\` (UCS-4). Unknown or
/// broken escapes are kept as written.
pub fn decode_step_string(raw: &str) -> String {
    if !raw.contains('\'') && !raw.contains('\\') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(c) = rest.chars().next() {
        if c == '\'' && rest.starts_with("''") {
            out.push('\'');
            rest = &rest[2..];
        } else if c == '\\' && rest.starts_with("\\\\") {
            out.push('\\');
            rest = &rest[2..];
        } else if let Some(tail) = rest.strip_prefix("\\X2\\") {
            match decode_hex_run(tail, 4) {
                Some((decoded, remaining)) => {
                    out.push_str(&decoded);
                    rest = remaining;
                }
                None => {
                    out.push('\\');
                    rest = &rest[1..];
                }
            }
        } else if let Some(tail) = rest.strip_prefix("\\X4\\") {
            match decode_hex_run(tail, 8) {
                Some((decoded, remaining)) => {
                    out.push_str(&decoded);
                    rest = remaining;
                }
                None => {
                    out.push('\\');
                    rest = &rest[1..];
                }
            }
        } else if let Some(ch) = rest
            .strip_prefix("\\X\\")
            .and_then(|tail| tail.get(..2))
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        {
            out.push(char::from(ch));
            rest = &rest[5..];
        } else {
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    out
}

/// Decode hex groups of `width` digits up to the closing `\X0\`
fn decode_hex_run(input: &str, width: usize) -> Option<(String, &str)> {
    let end = input.find("\\X0\\")?;
    let hex = &input[..end];
    if hex.is_empty() || hex.len() % width != 0 || !hex.is_ascii() {
        return None;
    }
    let mut units = Vec::with_capacity(hex.len() / width);
    for i in (0..hex.len()).step_by(width) {
        units.push(u32::from_str_radix(&hex[i..i + width], 16).ok()?);
    }
    let decoded = if width == 4 {
        let utf16: Vec<u16> = units.into_iter().map(|u| u as u16).collect();
        String::from_utf16(&utf16).ok()?
    } else {
        units.into_iter().map(char::from_u32).collect::<Option<String>>()?
    };
    Some((decoded, &input[end + 4..]))
}

// ============================================================================
// Parsing Primitives
// ============================================================================

fn ws(input: &str) -> IResult<&str, ()> {
    let (input, _) = multispace0(input)?;
    Ok((input, ()))
}

/// `#123`
fn entity_ref(input: &str) -> IResult<&str, Token<'_>> {
    let (rest, _) = char('#')(input)?;
    let (rest, digits) = take_while1(|c: char| c.is_ascii_digit())(rest)?;
    let id = digits
        .parse::<u32>()
        .map_err(|_| nom::Err::Error(Error::new(input, ErrorKind::Digit)))?;
    Ok((rest, Token::EntityRef(id)))
}

/// `'text'`, with `''` as an escaped quote
fn step_string(input: &str) -> IResult<&str, Token<'_>> {
    let (rest, _) = char('\'')(input)?;
    let bytes = rest.as_bytes();
    let mut end = 0;
    while end < bytes.len() {
        if bytes[end] == b'\'' {
            if bytes.get(end + 1) == Some(&b'\'') {
                end += 2;
                continue;
            }
            return Ok((&rest[end + 1..], Token::String(&rest[..end])));
        }
        end += 1;
    }
    Err(nom::Err::Error(Error::new(input, ErrorKind::Char)))
}

/// Integer or real, including `1.`, `-0.5` and `1.5E-3`
fn number(input: &str) -> IResult<&str, Token<'_>> {
    let (rest, num_str) = recognize((
        opt(alt((char('-'), char('+')))),
        take_while1(|c: char| c.is_ascii_digit()),
        opt(pair(char('.'), take_while(|c: char| c.is_ascii_digit()))),
        opt((
            alt((char('e'), char('E'))),
            opt(alt((char('+'), char('-')))),
            take_while1(|c: char| c.is_ascii_digit()),
        )),
    ))
    .parse(input)?;

    let bad = |_| nom::Err::Error(Error::new(input, ErrorKind::Float));
    if num_str.contains(['.', 'e', 'E']) {
        let f: f64 = lexical_core::parse(num_str.as_bytes()).map_err(bad)?;
        Ok((rest, Token::Float(f)))
    } else {
        let i: i64 = lexical_core::parse(num_str.as_bytes()).map_err(bad)?;
        Ok((rest, Token::Integer(i)))
    }
}

/// `.VALUE.`
fn enumeration(input: &str) -> IResult<&str, Token<'_>> {
    let (input, name) = delimited(
        char('.'),
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        char('.'),
    )
    .parse(input)?;
    Ok((input, Token::Enum(name)))
}

fn null_value(input: &str) -> IResult<&str, Token<'_>> {
    let (input, _) = char('$')(input)?;
    Ok((input, Token::Null))
}

fn derived_value(input: &str) -> IResult<&str, Token<'_>> {
    let (input, _) = char('*')(input)?;
    Ok((input, Token::Derived))
}

/// Comma-separated tokens in parentheses
fn token_list(input: &str) -> IResult<&str, Vec<Token<'_>>> {
    delimited(
        pair(char('('), ws),
        separated_list0((ws, char(','), ws), token),
        pair(ws, char(')')),
    )
    .parse(input)
}

fn list(input: &str) -> IResult<&str, Token<'_>> {
    let (input, items) = token_list(input)?;
    Ok((input, Token::List(items)))
}

/// `IFCLABEL('text')`
fn typed_value(input: &str) -> IResult<&str, Token<'_>> {
    let (input, type_name) = take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)?;
    let (input, _) = ws(input)?;
    let (input, args) = token_list(input)?;
    Ok((input, Token::TypedValue(type_name, args)))
}

fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        entity_ref,
        step_string,
        null_value,
        derived_value,
        enumeration,
        number,
        list,
        typed_value,
    ))
    .parse(input)
}

// ============================================================================
// Entity Parsing
// ============================================================================

/// Header of an instance line: `#123 = IFCWALL`
fn instance_head(input: &str) -> IResult<&str, (u32, &str)> {
    let (input, _) = ws(input)?;
    let (input, id) = match entity_ref(input)? {
        (rest, Token::EntityRef(id)) => (rest, id),
        _ => return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag))),
    };
    let (input, _) = (ws, char('='), ws).parse(input)?;
    let (input, type_name) =
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)?;
    let (input, _) = ws(input)?;
    Ok((input, (id, type_name)))
}

/// Parse a complete entity instance
///
/// Format: `#123=IFCWALL(attr1,attr2,...);`
pub fn parse_entity(input: &str) -> Result<DecodedEntity, String> {
    let (rest, (id, type_name)) =
        instance_head(input).map_err(|e| format!("Invalid instance header: {:?}", e))?;
    let (_, tokens) =
        token_list(rest).map_err(|e| format!("Failed to parse attributes: {:?}", e))?;

    Ok(DecodedEntity {
        id: EntityId(id),
        ifc_type: IfcType::parse(type_name),
        attributes: tokens.iter().map(Token::to_attribute_value).collect(),
    })
}

/// Arguments of a header record, e.g. the `(...)` after `FILE_NAME`
pub fn parse_arguments(input: &str) -> Option<Vec<AttributeValue>> {
    let (_, tokens) = token_list(input.trim_start()).ok()?;
    Some(tokens.iter().map(Token::to_attribute_value).collect())
}
