// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI command definitions, routing, and logging setup.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ifcview_core::{
    load_config_from, DirAssets, Message, ModelId, PropertyTab, Session, ViewerConfig,
    VirtualHost,
};
use ifcview_parser::StepParser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG: &str = "ifcview.toml";

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ifcview - index, inspect and package IFC building models.
#[derive(Parser)]
#[command(
    name = "ifcview",
    version,
    about = "Index IFC models, inspect element properties and build offline viewer archives.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Path to an ifcview.toml config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the index pass and print element counts per type.
    Index {
        /// IFC file to index.
        file: PathBuf,
    },

    /// Print one element's property tab.
    Show {
        /// IFC file containing the element.
        file: PathBuf,

        /// GlobalId of the element.
        global_id: String,

        /// Tab to print: summary, location, material, partof, conflicts, psets, qto or type.
        #[arg(short, long, default_value = "summary")]
        tab: String,

        /// Print the panel HTML instead of text rows.
        #[arg(long)]
        html: bool,
    },

    /// Extract every element record as JSON.
    Dump {
        /// IFC file to extract.
        file: PathBuf,

        /// Output file (defaults to stdout).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Package models into an offline viewer archive.
    Export {
        /// IFC files to include, shown when the viewer opens.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output file (defaults to the configured archive name).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Extra IFC files to include hidden (can be specified multiple times).
        #[arg(long)]
        hidden: Vec<PathBuf>,

        /// Write one self-contained HTML page for the first file instead.
        #[arg(long)]
        single_html: bool,
    },

    /// List the URLs the offline launcher serves for an archive.
    ServeList {
        /// Archive produced by `export`.
        archive: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Logging setup
// ---------------------------------------------------------------------------

/// Initialize the logger based on CLI flags; `RUST_LOG` wins when set.
pub(crate) fn init_logging(cli: &Cli) {
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_target(false)
        .init();
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Index { file } => cmd_index(config, &file),
        Command::Show {
            file,
            global_id,
            tab,
            html,
        } => cmd_show(config, &file, &global_id, &tab, html),
        Command::Dump { file, out } => cmd_dump(config, &file, out.as_deref()),
        Command::Export {
            files,
            out,
            hidden,
            single_html,
        } => cmd_export(config, &files, &hidden, out.as_deref(), single_html),
        Command::ServeList { archive } => cmd_serve_list(config, &archive),
    }
}

fn load_config(path: Option<&Path>) -> Result<ViewerConfig> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG));
    load_config_from(path).with_context(|| format!("invalid config file {}", path.display()))
}

fn new_session(config: ViewerConfig) -> Session {
    Session::new(Box::new(StepParser::new()), config)
}

/// Read a file from disk and index it into the session
fn load_file(session: &mut Session, path: &Path) -> Result<ModelId> {
    let bytes = fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let name = display_name(path);

    let bar = index_progress_bar()?;
    let sink = bar.clone();
    let subscription = session.subscribe(move |_, message| {
        if let Message::LoadProgress { done, total, .. } = message {
            sink.set_length(*total as u64);
            sink.set_position(*done as u64);
        }
    });
    let result = session.load_model(&name, bytes);
    session.unsubscribe(subscription);
    bar.finish_and_clear();

    match result {
        Ok(id) => Ok(id),
        Err(_) => bail!("{}", session.state().status),
    }
}

fn index_progress_bar() -> Result<ProgressBar> {
    let bar = ProgressBar::new(0);
    bar.set_style(ProgressStyle::with_template(
        "{spinner:.cyan} Indexing IFC... {pos}/{len} {wide_bar}",
    )?);
    Ok(bar)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Write output to a file, or stdout when no path is given
fn write_output(out: Option<&Path>, contents: &[u8]) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(path, contents).with_context(|| format!("cannot write {}", path.display()))?;
            info!("Wrote {} ({} bytes)", path.display(), contents.len());
        }
        None => {
            use std::io::Write;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(contents)?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_index(config: ViewerConfig, file: &Path) -> Result<()> {
    let mut session = new_session(config);
    let id = load_file(&mut session, file)?;
    let Some(workspace) = session.workspace(id) else {
        bail!("model {} disappeared after loading", id);
    };
    let index = workspace.index();
    let stats = index.stats();

    println!("{}: {} elements", workspace.filename(), index.len());
    println!(
        "  scanned {}, without GlobalId {}, failed {}, duplicates {}",
        stats.scanned, stats.without_id, stats.failed, stats.duplicates
    );
    let counts = index.type_counts();
    let width = counts.keys().map(String::len).max().unwrap_or(0);
    for (ifc_type, count) in counts {
        println!("  {:<width$}  {}", ifc_type, count, width = width);
    }
    Ok(())
}

fn cmd_show(
    config: ViewerConfig,
    file: &Path,
    global_id: &str,
    tab: &str,
    html: bool,
) -> Result<()> {
    let mut session = new_session(config);
    let id = load_file(&mut session, file)?;
    let tab = session.set_tab(tab);

    let Some(record) = session.select(id, global_id)? else {
        bail!("no element with GlobalId {} in {}", global_id, file.display());
    };

    if html {
        println!("{}", session.property_table());
        return Ok(());
    }

    print!("{}", format_rows(tab, &tab.rows(&record)));
    Ok(())
}

/// Plain-text rendering of a tab's rows
fn format_rows(tab: PropertyTab, rows: &[(String, String)]) -> String {
    let mut out = format!("[{}]\n", tab);
    if rows.is_empty() {
        out.push_str("No properties found.\n");
        return out;
    }
    let width = rows.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    for (key, value) in rows {
        out.push_str(&format!("{:<width$}  {}\n", key, value, width = width));
    }
    out
}

fn cmd_dump(config: ViewerConfig, file: &Path, out: Option<&Path>) -> Result<()> {
    let mut session = new_session(config);
    let id = load_file(&mut session, file)?;
    let records = session.dump_records(id)?;
    info!("Extracted {} records from {}", records.len(), file.display());
    let json = serde_json::to_string_pretty(&records.to_json()?)?;
    write_output(out, json.as_bytes())
}

fn cmd_export(
    config: ViewerConfig,
    files: &[PathBuf],
    hidden: &[PathBuf],
    out: Option<&Path>,
    single_html: bool,
) -> Result<()> {
    let assets = DirAssets::new(&config.export.assets_dir);
    let archive_name = config.export.archive_name.clone();
    let mut session = new_session(config);

    for file in files {
        load_file(&mut session, file)?;
    }
    for file in hidden {
        let id = load_file(&mut session, file)?;
        session.toggle_visibility(id)?;
    }

    if single_html {
        if files.len() > 1 || !hidden.is_empty() {
            log::warn!("--single-html packages only {}", display_name(&files[0]));
        }
        let Some(page) = session.export_single_html(&assets) else {
            bail!("{}", session.state().status);
        };
        let default_out = files[0].with_extension("html");
        let path = out.unwrap_or(default_out.as_path());
        write_output(Some(path), page.as_bytes())?;
        println!("{} -> {}", session.state().status, path.display());
        return Ok(());
    }

    let Some(archive) = session.export_archive(&assets) else {
        bail!("{}", session.state().status);
    };
    let default_out = PathBuf::from(archive_name);
    let path = out.unwrap_or(default_out.as_path());
    write_output(Some(path), &archive)?;
    println!("{} -> {}", session.state().status, path.display());
    Ok(())
}

fn cmd_serve_list(config: ViewerConfig, archive: &Path) -> Result<()> {
    let bytes = fs::read(archive).with_context(|| format!("cannot read {}", archive.display()))?;
    let host = VirtualHost::unpack(&bytes, &config.export.launcher_prefix)
        .with_context(|| format!("{} is not a viewer archive", archive.display()))?;

    println!("entry: {}", host.entry_url());
    for (path, content_type) in host.paths() {
        println!("  {}  {}", path, content_type);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_export_flags() {
        let cli = Cli::try_parse_from([
            "ifcview",
            "-vv",
            "export",
            "a.ifc",
            "b.ifc",
            "--hidden",
            "site.ifc",
            "-o",
            "out.zip",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Export {
                files,
                out,
                hidden,
                single_html,
            } => {
                assert_eq!(files, vec![PathBuf::from("a.ifc"), PathBuf::from("b.ifc")]);
                assert_eq!(hidden, vec![PathBuf::from("site.ifc")]);
                assert_eq!(out, Some(PathBuf::from("out.zip")));
                assert!(!single_html);
            }
            _ => panic!("expected export"),
        }
    }

    #[test]
    fn test_export_requires_files() {
        assert!(Cli::try_parse_from(["ifcview", "export"]).is_err());
    }

    #[test]
    fn test_show_defaults_to_summary() {
        let cli = Cli::try_parse_from(["ifcview", "show", "house.ifc", "2O2Fr$t4X7Zf8NOew3FLOH"])
            .unwrap();
        match cli.command {
            Command::Show { tab, html, .. } => {
                assert_eq!(tab, "summary");
                assert!(!html);
            }
            _ => panic!("expected show"),
        }
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let config = load_config(Some(Path::new("/nonexistent/ifcview.toml"))).unwrap();
        assert_eq!(config.index_batch_size, 400);
    }

    #[test]
    fn test_format_rows_aligns_keys() {
        let rows = vec![
            ("Name".to_string(), "Wall".to_string()),
            ("GlobalId".to_string(), "abc".to_string()),
        ];
        assert_eq!(
            format_rows(PropertyTab::Summary, &rows),
            format!("[{}]\nName      Wall\nGlobalId  abc\n", PropertyTab::Summary)
        );
        assert!(format_rows(PropertyTab::Psets, &[]).ends_with("No properties found.\n"));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Path::new("models/house.ifc")), "house.ifc");
    }
}
