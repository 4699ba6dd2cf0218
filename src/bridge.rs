//! Reactions to host lifecycle events: injecting slider values into outgoing
//! requests and following preset changes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_yaml::{Mapping, Number, Value as YamlValue};

use crate::host::{CUSTOM_SOURCE, HostContext, HostEvent, HostSnapshot, is_custom_source};
use crate::settings::ExtensionSettings;

/// The part of an outgoing chat-completion request this extension touches.
/// Every other field passes through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    #[serde(default)]
    pub chat_completion_source: String,
    /// YAML key/value text merged into the request body by the host.
    #[serde(default)]
    pub custom_include_body: String,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Parse body-merge text. Anything that is not a YAML mapping counts as empty.
pub fn parse_body(text: &str) -> Mapping {
    if text.trim().is_empty() {
        return Mapping::new();
    }
    match serde_yaml::from_str::<YamlValue>(text) {
        Ok(YamlValue::Mapping(map)) => map,
        Ok(_) => {
            log::warn!("Request body text is not a key/value mapping, ignoring it");
            Mapping::new()
        }
        Err(e) => {
            log::warn!("Request body text is not valid YAML, ignoring it: {e}");
            Mapping::new()
        }
    }
}

/// Whole numbers go out as integers so integer-only API fields accept them.
fn yaml_number(value: f64) -> YamlValue {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        YamlValue::Number(Number::from(value as i64))
    } else {
        YamlValue::Number(Number::from(value))
    }
}

/// Merge the active collection's sliders into the request's body text.
///
/// Only custom-source requests are touched. Slider properties overwrite keys
/// of the same name. When no slider contributes, the text is left exactly as
/// it was. Returns the number of properties merged.
pub fn prepare_request(settings: &ExtensionSettings, request: &mut RequestDescriptor) -> usize {
    if request.chat_completion_source != CUSTOM_SOURCE {
        return 0;
    }
    let Some(collection) = settings.active() else {
        return 0;
    };
    let pairs: Vec<(&str, f64)> = collection
        .sliders
        .iter()
        .filter(|s| s.enabled && s.is_complete())
        .filter_map(|s| {
            if s.value.is_nan() {
                log::warn!("Slider '{}' has no numeric value, not sent", s.name);
                None
            } else {
                Some((s.property.as_str(), s.clamped_value()))
            }
        })
        .collect();
    if pairs.is_empty() {
        return 0;
    }

    let mut body = parse_body(&request.custom_include_body);
    for &(property, value) in &pairs {
        body.insert(YamlValue::String(property.to_string()), yaml_number(value));
    }
    match serde_yaml::to_string(&body) {
        Ok(text) => {
            request.custom_include_body = text;
            log::debug!("Merged {} slider value(s) into request body", pairs.len());
            pairs.len()
        }
        Err(e) => {
            log::error!("Could not serialize request body: {e}");
            0
        }
    }
}

/// Body text the next request would carry, given the host's current state.
pub fn preview(settings: &ExtensionSettings, host: &HostSnapshot) -> (String, usize) {
    let mut request = RequestDescriptor {
        chat_completion_source: host.completion_source.clone(),
        custom_include_body: host.include_body.clone(),
        other: Map::new(),
    };
    let merged = prepare_request(settings, &mut request);
    (request.custom_include_body, merged)
}

/// The "sliders only apply to custom" hint is shown for every other source.
pub fn hint_visible(host: &dyn HostContext) -> bool {
    !is_custom_source(host)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    Nothing,
    /// Hint visibility was re-evaluated and changed to this value.
    HintChanged(bool),
    /// The named collection became active because its preset was selected.
    Switched(String),
}

/// Apply a host event to the extension state.
pub fn handle_event(
    settings: &mut ExtensionSettings,
    host: &mut HostSnapshot,
    event: HostEvent,
) -> Reaction {
    match event {
        HostEvent::SettingsUpdated(snapshot) => {
            let before = hint_visible(host);
            *host = snapshot;
            let after = hint_visible(host);
            if before != after {
                Reaction::HintChanged(after)
            } else {
                Reaction::Nothing
            }
        }
        HostEvent::PresetChanged(preset) => {
            host.preset = preset;
            match host.preset.as_deref() {
                Some(p) => settings
                    .switch_to_preset(p)
                    .map_or(Reaction::Nothing, |name| Reaction::Switched(name.to_string())),
                None => Reaction::Nothing,
            }
        }
    }
}
