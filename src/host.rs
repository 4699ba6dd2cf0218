//! Read-only view of the host application's state, and the watcher that turns
//! changes to the host settings file into lifecycle events.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use crossbeam_channel::Sender;
use serde_json::{Map, Value};

use crate::settings::store::read_root;

/// The completion source for which slider values are injected.
pub const CUSTOM_SOURCE: &str = "custom";

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// What this extension may read from the host.
pub trait HostContext {
    fn completion_source(&self) -> &str;
    fn preset_name(&self) -> Option<&str>;
}

pub fn is_custom_source(host: &dyn HostContext) -> bool {
    host.completion_source() == CUSTOM_SOURCE
}

/// Host fields this extension cares about, as last seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostSnapshot {
    pub completion_source: String,
    pub preset: Option<String>,
    /// Free-form body-merge text the host sends with custom requests.
    pub include_body: String,
}

impl HostSnapshot {
    pub fn from_root(root: &Map<String, Value>) -> Self {
        let oai = root.get("oai_settings");
        let field = |key: &str| {
            oai.and_then(|o| o.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            completion_source: field("chat_completion_source").unwrap_or_default(),
            preset: field("preset_settings_openai").filter(|p| !p.is_empty()),
            include_body: field("custom_include_body").unwrap_or_default(),
        }
    }
}

impl HostContext for HostSnapshot {
    fn completion_source(&self) -> &str {
        &self.completion_source
    }

    fn preset_name(&self) -> Option<&str> {
        self.preset.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Any host setting changed.
    SettingsUpdated(HostSnapshot),
    /// The selected API preset changed.
    PresetChanged(Option<String>),
}

/// Compare two snapshots and produce the events a host would have emitted.
pub fn diff_events(old: &HostSnapshot, new: &HostSnapshot) -> Vec<HostEvent> {
    let mut events = Vec::new();
    if old == new {
        return events;
    }
    if old.preset != new.preset {
        events.push(HostEvent::PresetChanged(new.preset.clone()));
    }
    events.push(HostEvent::SettingsUpdated(new.clone()));
    events
}

/// Polls the host settings file and reports changes. Stops when dropped.
pub struct Watcher {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Watcher {
    pub fn spawn(path: PathBuf, initial: HostSnapshot, tx: Sender<HostEvent>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let mut last_seen = fingerprint(&path);
        let handle = std::thread::Builder::new()
            .name("host-watcher".into())
            .spawn(move || {
                let mut last = initial;
                while !flag.load(Ordering::Relaxed) {
                    std::thread::sleep(POLL_INTERVAL);
                    let seen = fingerprint(&path);
                    if seen == last_seen {
                        continue;
                    }
                    last_seen = seen;
                    // Half-written or removed files are picked up on the next change.
                    let Ok(root) = read_root(&path) else {
                        continue;
                    };
                    let snapshot = HostSnapshot::from_root(&root);
                    for event in diff_events(&last, &snapshot) {
                        if tx.send(event).is_err() {
                            return;
                        }
                    }
                    last = snapshot;
                }
            })
            .map_err(|e| log::warn!("Host watcher not started: {e}"))
            .ok();
        Self { stop, handle }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Modification time and size. Size catches rewrites within the
/// filesystem's timestamp granularity.
fn fingerprint(path: &std::path::Path) -> Option<(SystemTime, u64)> {
    let meta = std::fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use serde_json::json;

    fn snapshot(source: &str, preset: Option<&str>) -> HostSnapshot {
        HostSnapshot {
            completion_source: source.into(),
            preset: preset.map(str::to_string),
            include_body: String::new(),
        }
    }

    #[test]
    fn reads_host_fields() {
        let root = json!({
            "oai_settings": {
                "chat_completion_source": "custom",
                "preset_settings_openai": "Creative",
                "custom_include_body": "top_k: 40\n"
            }
        });
        let snap = HostSnapshot::from_root(root.as_object().unwrap());
        assert!(is_custom_source(&snap));
        assert_eq!(snap.preset_name(), Some("Creative"));
        assert_eq!(snap.include_body, "top_k: 40\n");
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let snap = HostSnapshot::from_root(&Map::new());
        assert_eq!(snap, HostSnapshot::default());
        assert!(!is_custom_source(&snap));
    }

    #[test]
    fn diff_reports_preset_before_settings() {
        let old = snapshot("custom", Some("A"));
        let new = snapshot("custom", Some("B"));
        assert_eq!(
            diff_events(&old, &new),
            vec![
                HostEvent::PresetChanged(Some("B".into())),
                HostEvent::SettingsUpdated(new.clone()),
            ]
        );
        assert!(diff_events(&new, &new).is_empty());
        let source_only = snapshot("openai", Some("B"));
        assert_eq!(
            diff_events(&new, &source_only),
            vec![HostEvent::SettingsUpdated(source_only.clone())]
        );
    }

    #[test]
    fn watcher_reports_replaced_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let before = json!({ "oai_settings": {
            "chat_completion_source": "custom", "preset_settings_openai": "A"
        } });
        std::fs::write(&path, before.to_string()).unwrap();
        let initial = HostSnapshot::from_root(before.as_object().unwrap());

        let (tx, rx) = unbounded();
        let watcher = Watcher::spawn(path.clone(), initial, tx);
        std::thread::sleep(Duration::from_millis(20));

        let after = json!({ "oai_settings": {
            "chat_completion_source": "custom", "preset_settings_openai": "Bravo",
            "custom_include_body": "top_k: 40"
        } });
        let staged = dir.path().join("settings.json.tmp");
        std::fs::write(&staged, after.to_string()).unwrap();
        std::fs::rename(&staged, &path).unwrap();

        let first = rx.recv_timeout(Duration::from_secs(3)).unwrap();
        assert_eq!(first, HostEvent::PresetChanged(Some("Bravo".into())));
        let second = rx.recv_timeout(Duration::from_secs(3)).unwrap();
        assert!(matches!(second, HostEvent::SettingsUpdated(s) if s.include_body == "top_k: 40"));
        drop(watcher);
    }
}
