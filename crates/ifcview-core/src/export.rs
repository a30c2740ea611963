// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Offline export packaging
//!
//! An export archive holds everything needed to view the loaded models
//! without a server:
//!
//! ```text
//! wasm/web-ifc.wasm        parser runtime
//! models/{i}_{safeName}    one file per loaded model, in load order
//! bundle.json              {"models":[{"filename","ifcPath","visible"}]}
//! viewer.html              page that inlines the viewer runtime script
//! ```
//!
//! The legacy single-file mode inlines one model and the parser runtime as
//! base64 into a single HTML page instead.

use crate::config::ExportConfig;
use crate::error::{Result, ViewerError};
use crate::tabs::escape_html;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Archive path of the parser runtime
pub const WASM_ENTRY: &str = "wasm/web-ifc.wasm";
/// Archive path of the manifest
pub const BUNDLE_ENTRY: &str = "bundle.json";
/// Archive path of the generated page
pub const VIEWER_ENTRY: &str = "viewer.html";

/// Source of the static files an export embeds
pub trait AssetSource {
    /// Read an asset; fails with `MissingAsset` when it does not exist
    fn read(&self, name: &str) -> Result<Vec<u8>>;
}

/// Assets read from a directory
#[derive(Clone, Debug)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for DirAssets {
    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.root.join(name);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ViewerError::missing_asset(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Assets held in memory
#[derive(Clone, Debug, Default)]
pub struct MemoryAssets {
    files: FxHashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(name.into(), bytes.into());
    }
}

impl AssetSource for MemoryAssets {
    fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| ViewerError::missing_asset(name))
    }
}

/// One model handed to the packager
#[derive(Clone, Copy, Debug)]
pub struct ExportModel<'a> {
    pub filename: &'a str,
    pub bytes: &'a [u8],
    pub visible: bool,
}

/// `bundle.json`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub models: Vec<BundleEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntry {
    pub filename: String,
    #[serde(rename = "ifcPath")]
    pub ifc_path: String,
    pub visible: bool,
}

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`
pub fn safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Archive path of the `index`-th model
pub fn model_path(index: usize, filename: &str) -> String {
    format!("models/{}_{}", index, safe_file_name(filename))
}

impl BundleManifest {
    pub fn for_models(models: &[ExportModel<'_>]) -> Self {
        Self {
            models: models
                .iter()
                .enumerate()
                .map(|(i, m)| BundleEntry {
                    filename: m.filename.to_string(),
                    ifc_path: model_path(i, m.filename),
                    visible: m.visible,
                })
                .collect(),
        }
    }
}

/// Builds export archives and single-file pages from an asset source
pub struct Packager<'a> {
    assets: &'a dyn AssetSource,
    wasm_asset: String,
    runtime_asset: String,
}

impl<'a> Packager<'a> {
    pub fn new(assets: &'a dyn AssetSource, config: &ExportConfig) -> Self {
        Self {
            assets,
            wasm_asset: config.wasm_asset.clone(),
            runtime_asset: config.runtime_asset.clone(),
        }
    }

    fn runtime_script(&self) -> Result<String> {
        let bytes = self.assets.read(&self.runtime_asset)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Build the ZIP archive for the given models
    pub fn build_archive(&self, models: &[ExportModel<'_>]) -> Result<Vec<u8>> {
        if models.is_empty() {
            return Err(ViewerError::NothingToExport);
        }
        // read assets before writing anything
        let wasm = self.assets.read(&self.wasm_asset)?;
        let runtime = self.runtime_script()?;
        let manifest = BundleManifest::for_models(models);

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        zip.start_file(WASM_ENTRY, options)?;
        zip.write_all(&wasm)?;

        for (model, entry) in models.iter().zip(&manifest.models) {
            zip.start_file(entry.ifc_path.as_str(), options)?;
            zip.write_all(model.bytes)?;
        }

        zip.start_file(BUNDLE_ENTRY, options)?;
        zip.write_all(&serde_json::to_vec(&manifest)?)?;

        zip.start_file(VIEWER_ENTRY, options)?;
        zip.write_all(viewer_html(&runtime).as_bytes())?;

        let bytes = zip.finish()?.into_inner();
        log::info!(
            "Built export archive: {} model(s), {} bytes",
            models.len(),
            bytes.len()
        );
        Ok(bytes)
    }

    /// Render one self-contained HTML page with the model and the parser
    /// runtime inlined as base64
    pub fn single_html(&self, model: &ExportModel<'_>) -> Result<String> {
        let wasm = self.assets.read(&self.wasm_asset)?;
        let runtime = self.runtime_script()?;
        let boot = format!(
            "window.IFC_MODEL_NAME = {};\n    window.IFC_MODEL_BASE64 = \"{}\";\n    \
             window.IFC_WASM_BASE64 = \"{}\";",
            inline_json(&serde_json::to_string(model.filename)?),
            STANDARD.encode(model.bytes),
            STANDARD.encode(&wasm)
        );
        Ok(page(
            &escape_html(model.filename),
            &boot,
            &runtime,
            "ifcBase64: window.IFC_MODEL_BASE64,\n      wasmBase64: window.IFC_WASM_BASE64",
        ))
    }
}

/// Make serialized JSON safe inside a `<script>` element
///
/// JSON string escapes leave `<`, `>` and `&` alone, so a value could close
/// the element or open a comment.
fn inline_json(json: &str) -> String {
    json.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

/// `viewer.html` for an archive export
pub fn viewer_html(runtime: &str) -> String {
    page(
        "IFC Offline Viewer Export",
        "window.IFC_BUNDLE_URL = \"./bundle.json\";",
        runtime,
        "bundleUrl: window.IFC_BUNDLE_URL",
    )
}

/// Shell styles
const STYLE: &str = r#"    body { margin:0; font-family: Arial, sans-serif; height:100vh; display:grid; grid-template-columns: 1fr 320px; background:#f2f2f2; color:#1d1f2b; }
    #viewer { position: relative; background:#f2f2f2; }
    #left { display:none; }
    #right { padding:16px; overflow:auto; background:#171a34; color:#f5f7ff; }
    #list { display:flex; flex-direction:column; gap:8px; }
    .item { padding:8px; border-radius:8px; background:#1f2346; cursor:pointer; }
    .item.active { outline: 2px solid #7bdff6; }
    .tag { font-size:10px; color:#ffd36e; margin-left:6px; }
    .tabs { display:flex; gap:6px; flex-wrap:wrap; margin-bottom:6px; }
    .tab { padding:6px 10px; font-size:12px; border-radius:6px; background:#e8ebf2; color:#1d1f2b; border:1px solid #d7dbe3; cursor:pointer; }
    .tab.active { background:#7bdff6; color:#081018; border-color:transparent; }
    #props { font-size:12px; background:#f8f9fb; color:#1d1f2b; padding:8px; border-radius:8px; border:1px solid #d7dbe3; }
    .prop-table { width:100%; border-collapse:collapse; font-size:12px; }
    .prop-table tr:nth-child(even) { background:#eef1f6; }
    .prop-table td { padding:6px 8px; vertical-align:top; border-bottom:1px solid #e1e5ec; word-break:break-word; }
    .prop-key { width:40%; color:#3f4661; font-weight:600; }
    .empty { color:#666; }
    #clip-panel { position:absolute; left:16px; bottom:16px; width:260px; background:#ffffff; border:1px solid #e0e0e0; border-radius:12px; padding:12px; box-shadow:0 8px 22px rgba(0,0,0,0.12); font-size:12px; color:#333; display:none; z-index:9; }
    #clip-panel .clip-title { font-weight:600; margin-bottom:6px; }
    #clip-panel .clip-hint { font-size:11px; color:#666; margin-bottom:8px; }
    .clip-row { display:grid; grid-template-columns:64px 1fr; gap:8px; align-items:center; margin-bottom:8px; }
    .clip-row input[type="range"] { width:100%; }
    .clip-value { display:inline-block; font-size:11px; color:#555; background:#f5f5f5; border:1px solid #e0e0e0; border-radius:4px; padding:1px 6px; margin-left:6px; }
    #clip-actions { display:flex; gap:8px; }
    #clip-actions .btn { padding:6px 10px; border-radius:6px; border:1px solid #d0d0d0; background:#f5f5f5; cursor:pointer; }
    #view-cube-canvas { position:absolute; right:12px; top:12px; width:92px; height:92px; z-index:10; border-radius:10px; background:rgba(255,255,255,0.85); box-shadow:0 6px 18px rgba(0,0,0,0.18); border:1px solid rgba(0,0,0,0.12); }
    #plan-panel { position:absolute; right:12px; top:120px; width:240px; background:#ffffff; border:1px solid rgba(0,0,0,0.12); border-radius:12px; box-shadow:0 8px 20px rgba(0,0,0,0.16); padding:12px; z-index:10; display:none; color:#1d1f2b; font-size:12px; }
    #plan-panel h4 { margin:0 0 8px; font-size:13px; }
    #plan-panel label { display:flex; align-items:center; gap:8px; margin-bottom:8px; }
    #plan-panel select { width:100%; padding:6px 8px; border-radius:6px; border:1px solid #d7dbe3; background:#ffffff; font-size:12px; }
    .mini-hint { font-size:11px; color:#666; }
    #aps-ribbon { position:absolute; bottom:16px; left:50%; transform:translateX(-50%); background:rgba(255,255,255,0.92); border:1px solid rgba(0,0,0,0.12); border-radius:14px; box-shadow:0 10px 26px rgba(0,0,0,0.16); display:flex; gap:10px; padding:10px 12px; z-index:8; }
    .aps-btn { width:40px; height:40px; border-radius:10px; border:1px solid rgba(0,0,0,0.12); background:#ffffff; display:inline-flex; align-items:center; justify-content:center; cursor:pointer; }
    .aps-btn.active { outline:2px solid #4a90e2; }
    .aps-btn svg { width:20px; height:20px; stroke:#1d1f2b; }
"#;

/// Viewport overlays the runtime attaches its tools to
const VIEWPORT_TOOLS: &str = r#"    <div id="clip-panel">
      <div class="clip-title">Clip</div>
      <div class="clip-hint">Slide to clip the model in specific direction</div>
      <div class="clip-row"><div>Length X <span id="clip-x-value" class="clip-value">0 - 100</span></div><input id="clip-x-min" type="range" min="0" max="100" value="0"></div>
      <div class="clip-row"><div></div><input id="clip-x-max" type="range" min="0" max="100" value="100"></div>
      <div class="clip-row"><div>Length Z <span id="clip-z-value" class="clip-value">0 - 100</span></div><input id="clip-z-min" type="range" min="0" max="100" value="0"></div>
      <div class="clip-row"><div></div><input id="clip-z-max" type="range" min="0" max="100" value="100"></div>
      <div class="clip-row"><div>Length Y <span id="clip-y-value" class="clip-value">0 - 100</span></div><input id="clip-y-min" type="range" min="0" max="100" value="0"></div>
      <div class="clip-row"><div></div><input id="clip-y-max" type="range" min="0" max="100" value="100"></div>
      <div id="clip-actions">
        <button id="clip-unclip" class="btn" type="button">Unclip</button>
        <button id="clip-close" class="btn" type="button">Close</button>
      </div>
    </div>
    <canvas id="view-cube-canvas" width="120" height="120"></canvas>
    <div id="plan-panel">
      <h4>2D Plan View</h4>
      <label><input id="plan-enable" type="checkbox" /> Enable plan view</label>
      <div style="margin-bottom:8px;">
        <select id="plan-level">
          <option value="">Choose level</option>
        </select>
      </div>
      <div class="mini-hint">Section: 1.2 m above the chosen level</div>
    </div>
    <div id="aps-ribbon" aria-label="Viewer tools">
      <button id="tool-map" class="aps-btn" aria-label="Plan view">
        <svg viewBox="0 0 24 24" fill="none" stroke-width="1.8">
          <path d="M4 6l6-2 4 2 6-2v14l-6 2-4-2-6 2z" />
          <path d="M10 4v14M14 6v14" />
        </svg>
      </button>
      <button id="tool-clip" class="aps-btn" aria-label="Section/Clip">
        <svg viewBox="0 0 24 24" fill="none" stroke-width="1.8">
          <path d="M4 6h16M8 6v12M4 18h16" />
        </svg>
      </button>
      <button id="tool-camera" class="aps-btn" aria-label="Perspective / Orthographic">
        <svg viewBox="0 0 24 24" fill="none" stroke-width="1.8">
          <path d="M4 7h10l4 3v7H4z" />
          <path d="M8 10h2" />
        </svg>
      </button>
    </div>
"#;

fn page(title: &str, boot: &str, runtime: &str, source: &str) -> String {
    // a literal closing tag inside the runtime would end the script element
    let runtime = runtime.replace("</script", "<\\/script");
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{title}</title>
  <style>
{STYLE}  </style>
</head>
<body>
  <main id="viewer">
{VIEWPORT_TOOLS}  </main>
  <aside id="left"><div id="list"></div></aside>
  <aside id="right">
    <h3>Properties</h3>
    <div id="property-tabs" class="tabs"></div>
    <div id="props">Select an element.</div>
  </aside>

  <script>
    {boot}
  </script>
  <script>
{runtime}
  </script>
  <script>
    IFC_EXPORT_APP.init({{
      containerId: "viewer",
      listId: "list",
      propsId: "props",
      {source}
    }});
  </script>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    const RUNTIME: &str = "var IFC_EXPORT_APP = { init: function (opts) {} };";

    fn assets() -> MemoryAssets {
        MemoryAssets::new()
            .with("web-ifc.wasm", b"\0asm\x01\0\0\0".to_vec())
            .with("export-bundle.js", RUNTIME)
    }

    fn entries(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
        (0..zip.len())
            .map(|i| {
                let mut file = zip.by_index(i).unwrap();
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes).unwrap();
                (file.name().to_string(), bytes)
            })
            .collect()
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("Hus A (rev 2).ifc"), "Hus_A__rev_2_.ifc");
        assert_eq!(safe_file_name("plan-1_v.2.ifc"), "plan-1_v.2.ifc");
        assert_eq!(safe_file_name("Vägg.ifc"), "V_gg.ifc");
        assert_eq!(model_path(3, "a b.ifc"), "models/3_a_b.ifc");
    }

    #[test]
    fn test_archive_layout() {
        let assets = assets();
        let packager = Packager::new(&assets, &ExportConfig::default());
        let models = [
            ExportModel {
                filename: "house.ifc",
                bytes: b"ISO-10303-21;",
                visible: true,
            },
            ExportModel {
                filename: "site plan.ifc",
                bytes: b"ISO-10303-21;site",
                visible: false,
            },
        ];
        let archive = packager.build_archive(&models).unwrap();
        let files = entries(&archive);
        let names: Vec<&str> = files.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "wasm/web-ifc.wasm",
                "models/0_house.ifc",
                "models/1_site_plan.ifc",
                "bundle.json",
                "viewer.html"
            ]
        );
        assert_eq!(files[2].1, b"ISO-10303-21;site");

        let manifest: serde_json::Value = serde_json::from_slice(&files[3].1).unwrap();
        assert_eq!(
            manifest,
            serde_json::json!({"models": [
                {"filename": "house.ifc", "ifcPath": "models/0_house.ifc", "visible": true},
                {"filename": "site plan.ifc", "ifcPath": "models/1_site_plan.ifc", "visible": false}
            ]})
        );

        let html = String::from_utf8(files[4].1.clone()).unwrap();
        assert!(html.contains(r#"window.IFC_BUNDLE_URL = "./bundle.json";"#));
        for id in [
            "clip-panel",
            "clip-x-min",
            "clip-x-max",
            "clip-y-min",
            "clip-y-max",
            "clip-z-min",
            "clip-z-max",
            "view-cube-canvas",
            "aps-ribbon",
            "tool-clip",
            "plan-panel",
            "property-tabs",
        ] {
            assert!(html.contains(&format!(r#"id="{}""#, id)), "missing #{}", id);
        }
        assert!(html.contains(RUNTIME));
        assert!(html.contains(r#"containerId: "viewer""#));
        assert!(html.contains("bundleUrl: window.IFC_BUNDLE_URL"));
    }

    #[test]
    fn test_nothing_to_export() {
        let assets = assets();
        let packager = Packager::new(&assets, &ExportConfig::default());
        assert!(matches!(
            packager.build_archive(&[]),
            Err(ViewerError::NothingToExport)
        ));
    }

    #[test]
    fn test_missing_runtime() {
        let assets = MemoryAssets::new().with("web-ifc.wasm", vec![0u8]);
        let packager = Packager::new(&assets, &ExportConfig::default());
        let model = ExportModel {
            filename: "a.ifc",
            bytes: b"x",
            visible: true,
        };
        match packager.build_archive(&[model]) {
            Err(ViewerError::MissingAsset(name)) => assert_eq!(name, "export-bundle.js"),
            other => panic!("unexpected {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_dir_assets_missing_file() {
        let assets = DirAssets::new("/definitely/not/here");
        assert!(matches!(
            assets.read("web-ifc.wasm"),
            Err(ViewerError::MissingAsset(_))
        ));
    }

    #[test]
    fn test_single_html_inlines_model() {
        let assets = assets().with("export-bundle.js", "let s = '</script>';");
        let packager = Packager::new(&assets, &ExportConfig::default());
        let html = packager
            .single_html(&ExportModel {
                filename: "<house>.ifc",
                bytes: b"ISO-10303-21;",
                visible: true,
            })
            .unwrap();
        assert!(html.contains(&STANDARD.encode(b"ISO-10303-21;")));
        assert!(html.contains(&STANDARD.encode(b"\0asm\x01\0\0\0")));
        assert!(html.contains("<title>&lt;house&gt;.ifc</title>"));
        assert!(html.contains(r"let s = '<\/script>';"));
        assert!(html.contains("ifcBase64: window.IFC_MODEL_BASE64"));
        assert!(html.contains("wasmBase64: window.IFC_WASM_BASE64"));
        assert!(html.contains(&format!(
            "window.IFC_MODEL_BASE64 = \"{}\";",
            STANDARD.encode(b"ISO-10303-21;")
        )));
    }

    #[test]
    fn test_single_html_escapes_hostile_filename() {
        let assets = assets();
        let packager = Packager::new(&assets, &ExportConfig::default());
        let html = packager
            .single_html(&ExportModel {
                filename: "</script><script>alert(1)</script>.ifc",
                bytes: b"ISO-10303-21;",
                visible: true,
            })
            .unwrap();
        assert!(!html.contains("<script>alert(1)"));
        let escaped = r#"window.IFC_MODEL_NAME = "\u003c/script\u003e\u003cscript\u003e"#;
        assert!(html.contains(escaped));
        assert_eq!(html.matches("<script>").count(), 3);
    }
}
