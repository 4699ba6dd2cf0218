//! Slider import/export as plain JSON arrays.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::settings::{SliderCollection, SliderModel};

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("expected a JSON array of sliders")]
    NotAnArray,
    #[error("entry {index} is not a slider: {source}")]
    InvalidSlider {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Serialize only the collection's sliders, not its name or preset bindings.
pub fn export_json(collection: &SliderCollection) -> Result<String, TransferError> {
    Ok(serde_json::to_string_pretty(&collection.sliders)?)
}

/// `<collection name>.json`, with path separators made harmless.
pub fn export_file_name(collection_name: &str) -> String {
    let stem: String = collection_name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    let stem = stem.trim();
    if stem.is_empty() || stem == "." || stem == ".." {
        "sliders.json".into()
    } else {
        format!("{stem}.json")
    }
}

/// Write the collection's sliders into `dir`, returning the file written.
pub fn export_to_dir(collection: &SliderCollection, dir: &Path) -> Result<PathBuf, TransferError> {
    let path = dir.join(export_file_name(&collection.name));
    let io_err = |source| TransferError::Io {
        path: path.clone(),
        source,
    };
    if !dir.as_os_str().is_empty() && !dir.exists() {
        fs::create_dir_all(dir).map_err(io_err)?;
    }
    fs::write(&path, export_json(collection)?).map_err(io_err)?;
    Ok(path)
}

/// Parse an exported slider list. The top-level value must be an array;
/// fields missing from an element take slider defaults.
pub fn parse_sliders(text: &str) -> Result<Vec<SliderModel>, TransferError> {
    let Value::Array(items) = serde_json::from_str(text)? else {
        return Err(TransferError::NotAnArray);
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item)
                .map_err(|source| TransferError::InvalidSlider { index, source })
        })
        .collect()
}

pub fn read_sliders(path: &Path) -> Result<Vec<SliderModel>, TransferError> {
    let text = fs::read_to_string(path).map_err(|source| TransferError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_sliders(&text)
}

/// Default name offered for an imported collection: the file's base name.
pub fn suggested_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ExtensionSettings;

    const ONE_SLIDER: &str = r#"[{"name":"X","property":"p","min":"0","max":"1","step":"0.01","value":0,"enabled":true}]"#;

    #[test]
    fn import_creates_active_collection() {
        let mut settings = ExtensionSettings::default();
        settings.create_collection("Other").unwrap();
        let sliders = parse_sliders(ONE_SLIDER).unwrap();
        let index = settings.add_collection("Fresh", sliders).unwrap();

        let fresh = &settings.collections[index];
        assert!(fresh.active);
        assert!(fresh.presets.is_empty());
        assert_eq!(fresh.sliders.len(), 1);
        assert_eq!(fresh.sliders[0].name, "X");
        assert_eq!(fresh.sliders[0].step, "0.01");
        assert_eq!(settings.collections.iter().filter(|c| c.active).count(), 1);
    }

    #[test]
    fn rejects_non_array_and_bad_json() {
        assert!(matches!(
            parse_sliders(r#"{"sliders": []}"#),
            Err(TransferError::NotAnArray)
        ));
        assert!(matches!(parse_sliders("[{"), Err(TransferError::Parse(_))));
        assert!(matches!(
            parse_sliders("[1, 2]"),
            Err(TransferError::InvalidSlider { index: 0, .. })
        ));
        let err = parse_sliders(r#"[{"name":"ok"}, "nope"]"#).unwrap_err();
        assert!(matches!(err, TransferError::InvalidSlider { index: 1, .. }));
        assert!(!err.to_string().contains("JSON"));
    }

    #[test]
    fn numeric_bounds_import_as_text() {
        let sliders = parse_sliders(
            r#"[{"name":"T","property":"temperature","min":0,"max":2,"step":0.1,"value":1}]"#,
        )
        .unwrap();
        assert_eq!(sliders[0].min, "0");
        assert_eq!(sliders[0].max, "2");
        assert_eq!(sliders[0].step, "0.1");
        assert_eq!(sliders[0].value, 1.0);
    }

    #[test]
    fn export_contains_only_sliders() {
        let mut settings = ExtensionSettings::default();
        settings.add_slider();
        settings.bind_preset("P").unwrap();
        let json = export_json(settings.active().unwrap()).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["min"], "0");
        assert!(!json.contains("presets"));
    }

    #[test]
    fn export_then_read_back_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = ExtensionSettings::default();
        let i = settings.add_slider().unwrap();
        settings.slider_mut(i).unwrap().property = "top_p".into();
        let path = export_to_dir(settings.active().unwrap(), dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "Default.json");
        assert_eq!(suggested_name(&path), "Default");
        let sliders = read_sliders(&path).unwrap();
        assert_eq!(sliders[0].property, "top_p");
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(export_file_name("a/b"), "a_b.json");
        assert_eq!(export_file_name(".."), "sliders.json");
        assert_eq!(export_file_name("Creative"), "Creative.json");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_sliders(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, TransferError::Io { .. }));
    }
}
