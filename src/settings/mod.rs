pub mod store;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Key of this extension's namespace inside the host's `extension_settings`.
pub const MODULE_NAME: &str = "custom_sliders";
pub const DEFAULT_COLLECTION: &str = "Default";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("a collection named '{0}' already exists")]
    DuplicateName(String),
    #[error("collection name cannot be empty")]
    EmptyName,
    #[error("cannot delete the last remaining collection")]
    LastCollection,
    #[error("no preset is selected")]
    NoPreset,
}

// ---------------------------------------------------------------------------
// Sliders
// ---------------------------------------------------------------------------

/// A user-defined numeric control bound to one request-body property.
///
/// Bounds and step stay strings so the exact text the user typed survives a
/// round trip through the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliderModel {
    #[serde(deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(deserialize_with = "lenient_text")]
    pub property: String,
    #[serde(deserialize_with = "lenient_min")]
    pub min: String,
    #[serde(deserialize_with = "lenient_max")]
    pub max: String,
    #[serde(deserialize_with = "lenient_step")]
    pub step: String,
    #[serde(deserialize_with = "lenient_number")]
    pub value: f64,
    #[serde(deserialize_with = "lenient_bool")]
    pub enabled: bool,
}

impl Default for SliderModel {
    fn default() -> Self {
        Self {
            name: String::new(),
            property: String::new(),
            min: "0".into(),
            max: "1".into(),
            step: "0.01".into(),
            value: 0.0,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliderField {
    Name,
    Property,
    Min,
    Max,
    Step,
    Enabled,
}

impl SliderField {
    pub const ALL: [SliderField; 6] = [
        SliderField::Name,
        SliderField::Property,
        SliderField::Min,
        SliderField::Max,
        SliderField::Step,
        SliderField::Enabled,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SliderField::Name => "Name",
            SliderField::Property => "Property",
            SliderField::Min => "Min",
            SliderField::Max => "Max",
            SliderField::Step => "Step",
            SliderField::Enabled => "On",
        }
    }

    pub fn is_text(self) -> bool {
        self != SliderField::Enabled
    }
}

impl SliderModel {
    /// Sliders without a name or a property are never rendered live nor
    /// injected into requests.
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.property.is_empty()
    }

    pub fn min_bound(&self) -> Option<f64> {
        parse_float(&self.min)
    }

    pub fn max_bound(&self) -> Option<f64> {
        parse_float(&self.max)
    }

    /// The stored value forced into `[min, max]`. Unparsable bounds are
    /// ignored; a NaN value collapses to the lower bound.
    pub fn clamped_value(&self) -> f64 {
        let min = self.min_bound();
        let max = self.max_bound();
        let mut value = if self.value.is_nan() {
            min.unwrap_or(0.0)
        } else {
            self.value
        };
        if let Some(min) = min {
            value = value.max(min);
        }
        if let Some(max) = max {
            value = value.min(max);
        }
        value
    }

    /// Write the clamped value back. Returns true if it changed.
    pub fn clamp_value(&mut self) -> bool {
        let clamped = self.clamped_value();
        let changed = clamped.to_bits() != self.value.to_bits();
        self.value = clamped;
        changed
    }

    /// Increment used by keyboard adjustment. Falls back to 1% of the range
    /// when the step text is not a positive number.
    pub fn step_size(&self) -> f64 {
        match parse_float(&self.step) {
            Some(step) if step > 0.0 && step.is_finite() => step,
            _ => {
                let range = match (self.min_bound(), self.max_bound()) {
                    (Some(lo), Some(hi)) if hi > lo && (hi - lo).is_finite() => hi - lo,
                    _ => 1.0,
                };
                range * 0.01
            }
        }
    }

    pub fn field_text(&self, field: SliderField) -> &str {
        match field {
            SliderField::Name => &self.name,
            SliderField::Property => &self.property,
            SliderField::Min => &self.min,
            SliderField::Max => &self.max,
            SliderField::Step => &self.step,
            SliderField::Enabled => {
                if self.enabled {
                    "yes"
                } else {
                    "no"
                }
            }
        }
    }

    /// Set a text field. `Enabled` is toggled, not typed, so it is ignored here.
    pub fn set_field(&mut self, field: SliderField, text: &str) -> bool {
        let slot = match field {
            SliderField::Name => &mut self.name,
            SliderField::Property => &mut self.property,
            SliderField::Min => &mut self.min,
            SliderField::Max => &mut self.max,
            SliderField::Step => &mut self.step,
            SliderField::Enabled => return false,
        };
        if slot == text {
            return false;
        }
        *slot = text.to_string();
        true
    }
}

/// Accepts a JSON number or a numeric string; anything else is NaN.
fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => parse_float(&s).unwrap_or(f64::NAN),
        _ => f64::NAN,
    })
}

/// Text form of a scalar. Other writers store bounds as numbers.
fn text_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_or<'de, D>(deserializer: D, fallback: &str) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(text_value(value).unwrap_or_else(|| fallback.to_string()))
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    text_or(deserializer, "")
}

fn lenient_min<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    text_or(deserializer, "0")
}

fn lenient_max<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    text_or(deserializer, "1")
}

fn lenient_step<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    text_or(deserializer, "0.01")
}

/// Truthiness the way the settings UI evaluates it: zero, empty text and
/// null are false.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

/// Deserialize a list item by item, dropping entries that do not fit so one
/// bad slider cannot take its neighbours down with it.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        log::warn!("Expected a list in slider settings, using an empty one");
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value(item) {
            Ok(parsed) => out.push(parsed),
            Err(e) => log::warn!("Skipping unreadable slider settings entry {index}: {e}"),
        }
    }
    Ok(out)
}

/// Parse the longest numeric prefix of `text`, the way a browser's
/// `parseFloat` does: `" 1.5px"` is 1.5, `"abc"` is nothing.
pub fn parse_float(text: &str) -> Option<f64> {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let sign_end = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - sign_end;
    if bytes.get(end) == Some(&b'.') {
        let mut frac_end = end + 1;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - end - 1;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return s[sign_end..].starts_with("Infinity").then(|| {
            if s.starts_with('-') {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            }
        });
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    s[..end].parse().ok()
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SliderCollection {
    #[serde(deserialize_with = "lenient_bool")]
    pub active: bool,
    #[serde(deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(deserialize_with = "lenient_list")]
    pub sliders: Vec<SliderModel>,
    #[serde(deserialize_with = "lenient_list")]
    pub presets: Vec<String>,
}

impl SliderCollection {
    pub fn new(name: &str, active: bool) -> Self {
        Self {
            active,
            name: name.to_string(),
            sliders: Vec::new(),
            presets: Vec::new(),
        }
    }

    pub fn has_preset(&self, preset: &str) -> bool {
        self.presets.iter().any(|p| p == preset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Bound,
    /// The preset was taken away from the collection at this index.
    Moved { from: usize },
    AlreadyBound,
}

/// The extension's namespace in the host settings tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionSettings {
    #[serde(default, deserialize_with = "lenient_list")]
    pub collections: Vec<SliderCollection>,
    /// Keys written by other versions of the extension, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self {
            collections: vec![SliderCollection::new(DEFAULT_COLLECTION, true)],
            extra: Map::new(),
        }
    }
}

impl ExtensionSettings {
    /// Restore the invariants: at least one collection, exactly one active.
    /// Returns true if anything had to be fixed.
    pub fn heal(&mut self) -> bool {
        if self.collections.is_empty() {
            log::info!("No slider collections found, creating '{DEFAULT_COLLECTION}'");
            self.collections
                .push(SliderCollection::new(DEFAULT_COLLECTION, true));
            return true;
        }
        match self.collections.iter().position(|c| c.active) {
            None => {
                self.collections[0].active = true;
                true
            }
            Some(first) => {
                let mut changed = false;
                for c in self.collections.iter_mut().skip(first + 1) {
                    changed |= std::mem::replace(&mut c.active, false);
                }
                changed
            }
        }
    }

    pub fn active_index(&self) -> Option<usize> {
        self.collections.iter().position(|c| c.active)
    }

    pub fn active(&self) -> Option<&SliderCollection> {
        self.collections.iter().find(|c| c.active)
    }

    pub fn active_mut(&mut self) -> Option<&mut SliderCollection> {
        self.collections.iter_mut().find(|c| c.active)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.collections.iter().position(|c| c.name == name)
    }

    /// Make the collection at `index` the only active one.
    pub fn activate(&mut self, index: usize) -> bool {
        if index >= self.collections.len() {
            return false;
        }
        for (i, c) in self.collections.iter_mut().enumerate() {
            c.active = i == index;
        }
        true
    }

    pub fn create_collection(&mut self, name: &str) -> Result<usize, ModelError> {
        self.add_collection(name, Vec::new())
    }

    /// Append a new collection holding `sliders` and make it active.
    pub fn add_collection(
        &mut self,
        name: &str,
        sliders: Vec<SliderModel>,
    ) -> Result<usize, ModelError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ModelError::EmptyName);
        }
        if self.position(name).is_some() {
            return Err(ModelError::DuplicateName(name.to_string()));
        }
        for c in &mut self.collections {
            c.active = false;
        }
        self.collections.push(SliderCollection {
            active: true,
            name: name.to_string(),
            sliders,
            presets: Vec::new(),
        });
        Ok(self.collections.len() - 1)
    }

    /// Remove the active collection and activate the first remaining one.
    /// Returns the removed collection.
    pub fn delete_active(&mut self) -> Result<SliderCollection, ModelError> {
        if self.collections.len() <= 1 {
            return Err(ModelError::LastCollection);
        }
        let index = self.active_index().unwrap_or(0);
        let removed = self.collections.remove(index);
        self.activate(0);
        Ok(removed)
    }

    /// Bind `preset` to the active collection. A preset belongs to at most
    /// one collection, so any other binding is dropped.
    pub fn bind_preset(&mut self, preset: &str) -> Result<BindOutcome, ModelError> {
        let preset = preset.trim();
        if preset.is_empty() {
            return Err(ModelError::NoPreset);
        }
        let active = self.active_index().unwrap_or(0);
        let mut moved_from = None;
        for (i, c) in self.collections.iter_mut().enumerate() {
            if i != active && c.has_preset(preset) {
                c.presets.retain(|p| p != preset);
                moved_from.get_or_insert(i);
            }
        }
        let Some(target) = self.collections.get_mut(active) else {
            return Err(ModelError::NoPreset);
        };
        let already = target.has_preset(preset);
        if !already {
            target.presets.push(preset.to_string());
        }
        Ok(match moved_from {
            Some(from) => BindOutcome::Moved { from },
            None if already => BindOutcome::AlreadyBound,
            None => BindOutcome::Bound,
        })
    }

    pub fn collection_for_preset(&self, preset: &str) -> Option<usize> {
        self.collections.iter().position(|c| c.has_preset(preset))
    }

    /// React to the host selecting `preset`: if another collection is bound
    /// to it, activate that one and return its name.
    pub fn switch_to_preset(&mut self, preset: &str) -> Option<&str> {
        let index = self.collection_for_preset(preset)?;
        if self.collections[index].active {
            return None;
        }
        self.activate(index);
        Some(self.collections[index].name.as_str())
    }

    // -- slider operations on the active collection --

    pub fn sliders(&self) -> &[SliderModel] {
        self.active()
            .map(|c| c.sliders.as_slice())
            .unwrap_or_default()
    }

    pub fn slider_mut(&mut self, index: usize) -> Option<&mut SliderModel> {
        self.active_mut().and_then(|c| c.sliders.get_mut(index))
    }

    pub fn add_slider(&mut self) -> Option<usize> {
        let c = self.active_mut()?;
        c.sliders.push(SliderModel::default());
        Some(c.sliders.len() - 1)
    }

    pub fn remove_slider(&mut self, index: usize) -> Option<SliderModel> {
        let c = self.active_mut()?;
        (index < c.sliders.len()).then(|| c.sliders.remove(index))
    }

    /// Swap with the previous slider. The first slider stays put.
    pub fn move_slider_up(&mut self, index: usize) -> bool {
        match self.active_mut() {
            Some(c) if index > 0 && index < c.sliders.len() => {
                c.sliders.swap(index - 1, index);
                true
            }
            _ => false,
        }
    }

    /// Swap with the next slider. The last slider stays put.
    pub fn move_slider_down(&mut self, index: usize) -> bool {
        match self.active_mut() {
            Some(c) if index + 1 < c.sliders.len() => {
                c.sliders.swap(index, index + 1);
                true
            }
            _ => false,
        }
    }

    pub fn set_slider_field(&mut self, index: usize, field: SliderField, text: &str) -> bool {
        self.slider_mut(index)
            .is_some_and(|s| s.set_field(field, text))
    }

    /// Flip the enabled flag, returning the new state.
    pub fn toggle_slider(&mut self, index: usize) -> Option<bool> {
        let slider = self.slider_mut(index)?;
        slider.enabled = !slider.enabled;
        Some(slider.enabled)
    }
}
