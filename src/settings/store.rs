use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{Map, Value, json};

use super::{DEFAULT_COLLECTION, ExtensionSettings, MODULE_NAME};
use crate::host::HostSnapshot;

/// Top-level key of the host object that holds every extension's namespace.
pub const EXTENSION_SETTINGS_KEY: &str = "extension_settings";

/// Where the extension's settings come from and go back to.
pub trait SettingsRepository {
    /// Fetch the namespace, installing defaults and repairing invariants.
    fn load_extension(&mut self) -> ExtensionSettings;
    /// Write the namespace back into the host settings.
    fn persist(&mut self, settings: &ExtensionSettings) -> anyhow::Result<()>;
}

/// The host's settings object, optionally backed by a JSON file.
pub struct HostSettings {
    path: Option<PathBuf>,
    root: Map<String, Value>,
}

impl HostSettings {
    /// Open the host settings file. A missing file is an empty object.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            path: Some(path.to_path_buf()),
            root: read_root(path)?,
        })
    }

    pub fn in_memory(root: Value) -> Self {
        let root = match root {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { path: None, root }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    pub fn snapshot(&self) -> HostSnapshot {
        HostSnapshot::from_root(&self.root)
    }
}

impl SettingsRepository for HostSettings {
    fn load_extension(&mut self) -> ExtensionSettings {
        ensure_defaults(&mut self.root)
    }

    fn persist(&mut self, settings: &ExtensionSettings) -> anyhow::Result<()> {
        let value = serde_json::to_value(settings)?;

        // Pick up whatever the host wrote since we loaded, so only our
        // namespace is replaced.
        if let Some(path) = &self.path {
            self.root = read_root(path)
                .context("host settings could not be re-read, not overwriting them")?;
        }
        object_entry(&mut self.root, EXTENSION_SETTINGS_KEY).insert(MODULE_NAME.into(), value);

        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let text = serde_json::to_string_pretty(&self.root)?;
        fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
        log::debug!("Saved slider settings to {}", path.display());
        Ok(())
    }
}

pub(crate) fn read_root(path: &Path) -> anyhow::Result<Map<String, Value>> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?
    {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("{} does not hold a JSON object", path.display()),
    }
}

fn default_namespace() -> Value {
    json!({
        "collections": [{
            "active": true,
            "name": DEFAULT_COLLECTION,
            "sliders": [],
            "presets": [],
        }]
    })
}

/// Borrow `map[key]` as an object, replacing anything else found there.
fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let slot = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        log::warn!("Host setting '{key}' is not an object, replacing it");
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(inner) => inner,
        _ => unreachable!("slot was just replaced by an object"),
    }
}

/// Older releases kept a single `sliders` list directly in the namespace.
fn migrate_single_collection(namespace: &mut Map<String, Value>) {
    if namespace.contains_key("collections") {
        return;
    }
    let Some(sliders) = namespace.remove("sliders") else {
        return;
    };
    let sliders = if sliders.is_array() { sliders } else { json!([]) };
    log::info!("Migrating single slider list into collection '{DEFAULT_COLLECTION}'");
    namespace.insert(
        "collections".into(),
        json!([{
            "active": true,
            "name": DEFAULT_COLLECTION,
            "sliders": sliders,
            "presets": [],
        }]),
    );
}

/// Fetch this extension's settings from the host object, creating the
/// namespace on first use, backfilling keys added by newer versions and
/// repairing the collection invariants. The repaired form is written back
/// into `root` so the host persists it.
pub fn ensure_defaults(root: &mut Map<String, Value>) -> ExtensionSettings {
    let extensions = object_entry(root, EXTENSION_SETTINGS_KEY);
    let namespace = extensions
        .entry(MODULE_NAME.to_string())
        .or_insert_with(default_namespace);
    if !namespace.is_object() {
        log::warn!("Slider settings are not an object, resetting to defaults");
        *namespace = default_namespace();
    }
    if let Value::Object(ns) = &mut *namespace {
        migrate_single_collection(ns);
        if let Value::Object(defaults) = default_namespace() {
            for (key, value) in defaults {
                ns.entry(key).or_insert(value);
            }
        }
    }

    let mut settings = match serde_json::from_value::<ExtensionSettings>(namespace.clone()) {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("Discarding unreadable slider settings: {e}");
            ExtensionSettings::default()
        }
    };
    if settings.heal() {
        log::info!("Repaired slider collection state");
    }
    match serde_json::to_value(&settings) {
        Ok(value) => *namespace = value,
        Err(e) => log::warn!("Could not write repaired slider settings back: {e}"),
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namespace(root: &Map<String, Value>) -> &Value {
        &root[EXTENSION_SETTINGS_KEY][MODULE_NAME]
    }

    #[test]
    fn missing_namespace_installs_default() {
        let mut root = Map::new();
        let settings = ensure_defaults(&mut root);
        assert_eq!(settings, ExtensionSettings::default());
        assert_eq!(namespace(&root)["collections"][0]["name"], "Default");
        assert_eq!(namespace(&root)["collections"][0]["active"], true);
    }

    #[test]
    fn empty_collections_restored() {
        let mut root = json!({
            "extension_settings": { "custom_sliders": { "collections": [] } }
        })
        .as_object()
        .cloned()
        .unwrap();
        let settings = ensure_defaults(&mut root);
        assert_eq!(settings.collections.len(), 1);
        assert!(settings.collections[0].active);
    }

    #[test]
    fn first_collection_activated_when_none_active() {
        let mut root = json!({
            "extension_settings": { "custom_sliders": { "collections": [
                { "name": "A", "active": false },
                { "name": "B", "active": false }
            ] } }
        })
        .as_object()
        .cloned()
        .unwrap();
        let settings = ensure_defaults(&mut root);
        assert_eq!(settings.active_index(), Some(0));
        assert!(!settings.collections[1].active);
        assert_eq!(namespace(&root)["collections"][0]["active"], true);
    }

    #[test]
    fn missing_top_level_key_backfilled() {
        let mut root = json!({
            "extension_settings": { "custom_sliders": { "other": 3 } }
        })
        .as_object()
        .cloned()
        .unwrap();
        let settings = ensure_defaults(&mut root);
        assert_eq!(settings.collections[0].name, "Default");
        assert_eq!(namespace(&root)["other"], 3);
    }

    #[test]
    fn legacy_slider_list_migrated() {
        let mut root = json!({
            "extension_settings": { "custom_sliders": { "sliders": [
                { "name": "Temp", "property": "temperature", "min": "0", "max": "2",
                  "step": "0.1", "value": 1.0, "enabled": true }
            ] } }
        })
        .as_object()
        .cloned()
        .unwrap();
        let settings = ensure_defaults(&mut root);
        assert_eq!(settings.collections.len(), 1);
        assert_eq!(settings.collections[0].sliders[0].property, "temperature");
        assert!(namespace(&root).get("sliders").is_none());
    }

    #[test]
    fn garbage_namespace_reset() {
        let mut root = json!({
            "extension_settings": { "custom_sliders": { "collections": 12 } }
        })
        .as_object()
        .cloned()
        .unwrap();
        let settings = ensure_defaults(&mut root);
        assert_eq!(settings, ExtensionSettings::default());
    }

    #[test]
    fn numeric_bounds_keep_the_namespace() {
        let mut root = json!({
            "extension_settings": { "custom_sliders": { "collections": [
                { "name": "Mine", "active": true, "sliders": [
                    { "name": "Temp", "property": "temperature", "min": 0, "max": 2,
                      "step": 0.1, "value": 0.7, "enabled": true }
                ] },
                { "name": "Other", "active": false }
            ] } }
        })
        .as_object()
        .cloned()
        .unwrap();
        let settings = ensure_defaults(&mut root);
        let names: Vec<_> = settings.collections.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Mine", "Other"]);
        let slider = &settings.collections[0].sliders[0];
        assert_eq!(slider.min, "0");
        assert_eq!(slider.max, "2");
        assert_eq!(slider.step, "0.1");
        assert_eq!(namespace(&root)["collections"][0]["sliders"][0]["min"], "0");
    }

    #[test]
    fn persist_refuses_to_overwrite_unreadable_host_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"oai_settings":{}}"#).unwrap();
        let mut host = HostSettings::open(&path).unwrap();
        let settings = host.load_extension();

        fs::write(&path, r#"{"oai_settings":{"chat_comp"#).unwrap();
        assert!(host.persist(&settings).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"oai_settings":{"chat_comp"#);
    }

    #[test]
    fn persist_keeps_host_keys_written_meanwhile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut host = HostSettings::open(&path).unwrap();
        let mut settings = host.load_extension();
        settings.create_collection("Mine").unwrap();

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"oai_settings":{"chat_completion_source":"custom"}}"#).unwrap();
        host.persist(&settings).unwrap();

        let reread = HostSettings::open(&path).unwrap();
        assert_eq!(reread.root()["oai_settings"]["chat_completion_source"], "custom");
        let mut reread = reread;
        let loaded = reread.load_extension();
        assert_eq!(loaded.active().unwrap().name, "Mine");
    }

    #[test]
    fn invalid_host_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(HostSettings::open(&path).is_err());
        fs::write(&path, "[1, 2]").unwrap();
        assert!(HostSettings::open(&path).is_err());
    }
}
