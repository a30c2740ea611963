// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Viewer configuration loaded from TOML

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Viewer settings
///
/// Every field has a default, so a partial file (or none) is valid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Elements per batch in the index pass
    pub index_batch_size: usize,
    /// Elements per batch in the bulk record pass
    pub record_batch_size: usize,
    /// Export settings
    pub export: ExportConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            index_batch_size: 400,
            record_batch_size: 100,
            export: ExportConfig::default(),
        }
    }
}

/// Export and launcher settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory holding the static export assets
    pub assets_dir: PathBuf,
    /// Parser runtime binary inside `assets_dir`
    pub wasm_asset: String,
    /// Prebuilt viewer runtime script inside `assets_dir`
    pub runtime_asset: String,
    /// File name offered for the downloaded archive
    pub archive_name: String,
    /// Path prefix the offline launcher serves archive entries under
    pub launcher_prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            wasm_asset: "web-ifc.wasm".to_string(),
            runtime_asset: "export-bundle.js".to_string(),
            archive_name: "ifc-offline-viewer.zip".to_string(),
            launcher_prefix: "/__ifc_zip__/".to_string(),
        }
    }
}

impl ViewerConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let mut config: ViewerConfig = toml::from_str(text)?;
        config.index_batch_size = config.index_batch_size.max(1);
        config.record_batch_size = config.record_batch_size.max(1);
        Ok(config)
    }
}

/// Load configuration from a file; a missing file yields the defaults
pub fn load_config_from(path: &Path) -> Result<ViewerConfig> {
    if !path.exists() {
        log::debug!("No config at {}, using defaults", path.display());
        return Ok(ViewerConfig::default());
    }
    let text = std::fs::read_to_string(path)?;
    ViewerConfig::from_toml(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViewerError;

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::default();
        assert_eq!(config.index_batch_size, 400);
        assert_eq!(config.record_batch_size, 100);
        assert_eq!(config.export.archive_name, "ifc-offline-viewer.zip");
        assert_eq!(config.export.launcher_prefix, "/__ifc_zip__/");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = ViewerConfig::from_toml(
            r#"
index_batch_size = 50

[export]
assets_dir = "dist/export"
"#,
        )
        .unwrap();
        assert_eq!(config.index_batch_size, 50);
        assert_eq!(config.record_batch_size, 100);
        assert_eq!(config.export.assets_dir, PathBuf::from("dist/export"));
        assert_eq!(config.export.wasm_asset, "web-ifc.wasm");
    }

    #[test]
    fn test_zero_batch_is_clamped() {
        let config = ViewerConfig::from_toml("record_batch_size = 0").unwrap();
        assert_eq!(config.record_batch_size, 1);
    }

    #[test]
    fn test_malformed_file() {
        let err = ViewerConfig::from_toml("index_batch_size = \"many\"").unwrap_err();
        assert!(matches!(err, ViewerError::Config(_)));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config_from(Path::new("/definitely/not/here/ifcview.toml")).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }
}
