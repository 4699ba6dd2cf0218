//! Projection of the active collection into live controls, independent of
//! how they are drawn.

use std::collections::HashSet;

use crate::host::{HostContext, is_custom_source};
use crate::settings::ExtensionSettings;

pub const ID_PREFIX: &str = "custom_slider_";

/// Control identifier for a property: anything outside `[A-Za-z0-9_-]`
/// becomes `_`.
pub fn control_id(property: &str) -> String {
    let mut id = String::with_capacity(ID_PREFIX.len() + property.len());
    id.push_str(ID_PREFIX);
    id.extend(property.chars().map(|c| {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            c
        } else {
            '_'
        }
    }));
    id
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveControl {
    /// Index of the backing slider in the active collection.
    pub slider: usize,
    pub id: String,
    pub label: String,
    pub min: f64,
    pub max: f64,
    pub value: f64,
}

impl LiveControl {
    /// Position of the value in `[min, max]` as `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        let span = self.max - self.min;
        if span.is_finite() && span > 0.0 {
            ((self.value - self.min) / span).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct LivePanel {
    /// Controls are only shown when the host targets the custom source.
    pub visible: bool,
    pub controls: Vec<LiveControl>,
    /// Sliders left out because their id was already taken, as (name, id).
    pub duplicates: Vec<(String, String)>,
    /// Some stored value was out of bounds and has been clamped.
    pub clamped: bool,
}

/// Build the live panel for the active collection. Enabled sliders with a
/// name and property get a control; stored values are clamped in place.
pub fn project(settings: &mut ExtensionSettings, host: &dyn HostContext) -> LivePanel {
    let mut panel = LivePanel {
        visible: is_custom_source(host),
        ..LivePanel::default()
    };
    let Some(collection) = settings.active_mut() else {
        return panel;
    };
    let mut seen = HashSet::new();
    for (i, slider) in collection.sliders.iter_mut().enumerate() {
        if !slider.enabled || !slider.is_complete() {
            continue;
        }
        let id = control_id(&slider.property);
        if !seen.insert(id.clone()) {
            panel.duplicates.push((slider.name.clone(), id));
            continue;
        }
        panel.clamped |= slider.clamp_value();
        let min = slider.min_bound().filter(|v| v.is_finite()).unwrap_or(0.0);
        let max = slider
            .max_bound()
            .filter(|v| v.is_finite() && *v >= min)
            .unwrap_or(min.max(slider.value));
        panel.controls.push(LiveControl {
            slider: i,
            id,
            label: slider.name.clone(),
            min,
            max,
            value: slider.value,
        });
    }
    panel
}

/// Move a slider's value by `steps` increments and clamp it. Returns the new
/// value, or None if there is no such slider.
pub fn nudge(settings: &mut ExtensionSettings, slider: usize, steps: f64) -> Option<f64> {
    let s = settings.slider_mut(slider)?;
    let base = s.clamped_value();
    s.value = round_noise(base + s.step_size() * steps);
    s.clamp_value();
    Some(s.value)
}

/// Drop accumulated binary-fraction noise (0.1 + 0.2 style).
fn round_noise(value: f64) -> f64 {
    let rounded = (value * 1e9).round() / 1e9;
    if rounded.is_finite() { rounded } else { value }
}

/// Set a slider's value directly, clamped to its bounds.
pub fn set_value(settings: &mut ExtensionSettings, slider: usize, value: f64) -> Option<f64> {
    let s = settings.slider_mut(slider)?;
    s.value = value;
    s.clamp_value();
    Some(s.value)
}
