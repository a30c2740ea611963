// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Offline launcher host
//!
//! Unpacks an export archive into memory and answers requests for its
//! entries under a fixed path prefix, the way the launcher's request
//! interceptor serves an archive without extracting it to disk.

use crate::error::Result;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// A response from the host
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Response {
    fn not_found() -> Self {
        Self {
            status: 404,
            content_type: "text/plain",
            body: b"Not found".to_vec(),
        }
    }
}

#[derive(Clone, Debug)]
struct HostedFile {
    content_type: &'static str,
    data: Vec<u8>,
}

/// Content type from a file name's extension
pub fn content_type_for(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    let ext = lower.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    match ext {
        "html" => "text/html",
        "js" => "text/javascript",
        "css" => "text/css",
        "json" => "application/json",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

/// Collapse runs of `/` into one
fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out
}

/// In-memory file host over an unpacked archive
#[derive(Clone, Debug)]
pub struct VirtualHost {
    prefix: String,
    files: BTreeMap<String, HostedFile>,
}

impl VirtualHost {
    /// Unpack every file entry of a ZIP archive under `prefix`
    pub fn unpack(archive: &[u8], prefix: &str) -> Result<Self> {
        let prefix = collapse_slashes(&format!("/{}/", prefix));
        let mut zip = ZipArchive::new(Cursor::new(archive))?;
        let mut files = BTreeMap::new();

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            // declared sizes are untrusted; grow as data arrives
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            let path = collapse_slashes(&format!("{}{}", prefix, name));
            files.insert(
                path,
                HostedFile {
                    content_type: content_type_for(&name),
                    data,
                },
            );
        }

        log::info!("Launcher host serving {} files under {}", files.len(), prefix);
        Ok(Self { prefix, files })
    }

    /// Answer a request path
    ///
    /// Returns `None` for paths outside the prefix so the caller can pass
    /// them through. Anything before the prefix (a deployment base path) is
    /// ignored.
    pub fn serve(&self, path: &str) -> Option<Response> {
        let path = collapse_slashes(path);
        let start = path.find(&self.prefix)?;
        let key = &path[start..];
        Some(match self.files.get(key) {
            Some(file) => Response {
                status: 200,
                content_type: file.content_type,
                body: file.data.clone(),
            },
            None => Response::not_found(),
        })
    }

    /// URL the launcher navigates to after unpacking
    pub fn entry_url(&self) -> String {
        format!("{}{}", self.prefix, crate::export::VIEWER_ENTRY)
    }

    /// Hosted paths with their content types
    pub fn paths(&self) -> impl Iterator<Item = (&str, &'static str)> {
        self.files
            .iter()
            .map(|(path, file)| (path.as_str(), file.content_type))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExportConfig;
    use crate::export::{ExportModel, MemoryAssets, Packager};
    use crate::error::ViewerError;

    fn archive() -> Vec<u8> {
        let assets = MemoryAssets::new()
            .with("web-ifc.wasm", b"\0asm".to_vec())
            .with("export-bundle.js", "var IFC_EXPORT_APP = {};");
        Packager::new(&assets, &ExportConfig::default())
            .build_archive(&[ExportModel {
                filename: "house.ifc",
                bytes: b"ISO-10303-21;",
                visible: true,
            }])
            .unwrap()
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("viewer.html"), "text/html");
        assert_eq!(content_type_for("app.JS"), "text/javascript");
        assert_eq!(content_type_for("style.css"), "text/css");
        assert_eq!(content_type_for("bundle.json"), "application/json");
        assert_eq!(content_type_for("wasm/web-ifc.wasm"), "application/wasm");
        assert_eq!(content_type_for("models/0_house.ifc"), "application/octet-stream");
        assert_eq!(content_type_for("README"), "application/octet-stream");
    }

    #[test]
    fn test_serves_archive_entries() {
        let host = VirtualHost::unpack(&archive(), "/__ifc_zip__/").unwrap();
        assert_eq!(host.len(), 4);
        assert_eq!(host.entry_url(), "/__ifc_zip__/viewer.html");

        let wasm = host.serve("/__ifc_zip__/wasm/web-ifc.wasm").unwrap();
        assert_eq!(wasm.status, 200);
        assert_eq!(wasm.content_type, "application/wasm");
        assert_eq!(wasm.body, b"\0asm");

        let model = host.serve("/user/repo//__ifc_zip__//models/0_house.ifc").unwrap();
        assert_eq!(model.status, 200);
        assert_eq!(model.body, b"ISO-10303-21;");
    }

    #[test]
    fn test_missing_path_is_404() {
        let host = VirtualHost::unpack(&archive(), "__ifc_zip__").unwrap();
        let missing = host.serve("/__ifc_zip__/nope.js").unwrap();
        assert_eq!(missing.status, 404);
        assert_eq!(missing.body, b"Not found");
        assert!(host.serve("/index.html").is_none());
    }

    #[test]
    fn test_inflated_declared_size_is_not_preallocated() {
        let mut bytes = archive();
        // central directory headers; uncompressed size sits 24 bytes in
        let mut patched = 0;
        let mut at = 0;
        while let Some(pos) = bytes[at..].windows(4).position(|w| w == b"PK\x01\x02") {
            let header = at + pos;
            bytes[header + 24..header + 28].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());
            patched += 1;
            at = header + 4;
        }
        assert_eq!(patched, 4);

        // must not reserve ~4 GiB per entry; reading may still reject the mismatch
        match VirtualHost::unpack(&bytes, "/__ifc_zip__/") {
            Ok(host) => {
                let model = host.serve("/__ifc_zip__/models/0_house.ifc").unwrap();
                assert_eq!(model.body, b"ISO-10303-21;");
            }
            Err(err) => assert!(matches!(err, ViewerError::Archive(_) | ViewerError::Io(_))),
        }
    }

    #[test]
    fn test_rejects_non_archive() {
        assert!(matches!(
            VirtualHost::unpack(b"not a zip", "/__ifc_zip__/"),
            Err(ViewerError::Archive(_))
        ));
    }
}
