//! Preset message composition
//!
//! Turns a raw user message plus preset choices into the text sent to the
//! model. Flat presets become `Style:`/`Artist/Style:`/... lines; hierarchical
//! `selections` (when enabled) become a structured brief.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::catalog::{LegacyPresets, PromptCatalog};

/// Preset name meaning "no selection"
pub const NO_PRESET: &str = "None";

/// How preset lines are attached to the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetForm {
    /// Appended as a bracketed note to a chat turn
    Chat,
    /// Wrapped into a one-shot generation brief
    Oneshot,
}

/// Preset fields shared by every generation request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetSelection {
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub composition: Option<String>,
    #[serde(default)]
    pub lighting: Option<String>,
    /// Hierarchical wizard output (level1..level5, universal)
    #[serde(default)]
    pub selections: Option<Value>,
}

/// Message text after presets were applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    pub text: String,
    /// The hierarchical builder produced `text`
    pub hierarchical: bool,
}

fn chosen(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(NO_PRESET)
}

impl PresetSelection {
    /// One line per selected flat preset, using the catalog's fragment text
    pub fn preset_lines(&self, presets: &LegacyPresets) -> Vec<String> {
        let categories = [
            ("Style", &self.style, &presets.styles),
            ("Artist/Style", &self.artist, &presets.artists),
            ("Composition", &self.composition, &presets.composition),
            ("Lighting", &self.lighting, &presets.lighting),
        ];

        categories
            .into_iter()
            .filter_map(|(label, choice, table)| {
                let name = choice.as_deref().filter(|n| !n.is_empty() && *n != NO_PRESET)?;
                table.get(name).map(|fragment| format!("{}: {}", label, fragment))
            })
            .collect()
    }

    fn non_empty_selections(&self) -> Option<&Value> {
        self.selections
            .as_ref()
            .filter(|s| s.as_object().is_some_and(|o| !o.is_empty()))
    }

    /// Apply presets to `message`
    pub fn compose(&self, message: &str, catalog: &PromptCatalog, form: PresetForm) -> ComposedMessage {
        if let (Some(selections), Some(document)) =
            (self.non_empty_selections(), catalog.hierarchical())
        {
            tracing::debug!("Applying hierarchical selections");
            let text = build_hierarchical_prompt(message, selections, document);
            if !text.trim().is_empty() {
                return ComposedMessage {
                    text,
                    hierarchical: true,
                };
            }
        }

        let lines = self.preset_lines(catalog.presets());
        let text = if lines.is_empty() {
            message.to_string()
        } else {
            let info = lines.join("\n");
            match form {
                PresetForm::Chat => format!("{}\n\n[Selected presets: {}]", message, info),
                PresetForm::Oneshot => format!(
                    "User's image idea: {}\n\nSelected presets:\n{}\n\nPlease create a detailed prompt incorporating these elements.",
                    message, info
                ),
            }
        };

        ComposedMessage {
            text,
            hierarchical: false,
        }
    }

    /// Preset record stored with a history entry
    pub fn history_json(&self, hierarchical: bool) -> Value {
        let mut record = self.flat_json();
        if hierarchical {
            if let (Some(map), Some(selections)) = (record.as_object_mut(), &self.selections) {
                map.insert("hierarchical".to_string(), selections.clone());
            }
        }
        record
    }

    /// `{style, artist, composition, lighting}` with "None" for unset fields
    pub fn flat_json(&self) -> Value {
        json!({
            "style": chosen(&self.style),
            "artist": chosen(&self.artist),
            "composition": chosen(&self.composition),
            "lighting": chosen(&self.lighting),
        })
    }
}

pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn spaced(value: &Value) -> String {
    text(value).replace('_', " ")
}

/// Capitalise each word, lowercasing the rest
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if prev_alpha {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

fn joined(value: &Value) -> String {
    match value {
        Value::Array(items) => items.iter().map(text).collect::<Vec<_>>().join(", "),
        other => text(other),
    }
}

fn object<'a>(value: Option<&'a Value>) -> Option<&'a Map<String, Value>> {
    value.and_then(Value::as_object)
}

/// Expand hierarchical `selections` against the presets document.
///
/// Falls back to `user_input` when nothing is selected or the selection does
/// not resolve against `presets`.
pub fn build_hierarchical_prompt(user_input: &str, selections: &Value, presets: &Value) -> String {
    if !truthy(selections) {
        return user_input.to_string();
    }

    match hierarchical_parts(user_input, selections, presets) {
        Some(prompt) => {
            tracing::info!("Built hierarchical prompt ({} chars)", prompt.len());
            prompt
        }
        None => {
            tracing::debug!("Hierarchical selections did not resolve, using plain input");
            user_input.to_string()
        }
    }
}

fn hierarchical_parts(user_input: &str, selections: &Value, presets: &Value) -> Option<String> {
    let mut parts = vec![user_input.to_string(), String::new()];

    let category_id = selections.get("level1").and_then(Value::as_str).filter(|s| !s.is_empty())?;
    let Some(category) = presets.get("categories").and_then(|c| c.get(category_id)) else {
        tracing::warn!("Category '{}' not found in presets", category_id);
        return None;
    };

    let type_data = selections
        .get("level2")
        .and_then(Value::as_str)
        .and_then(|id| category.get("level2_types")?.get(id));
    if let Some(type_data) = type_data {
        parts.push(format!(
            "Style: {} > {}",
            category.get("name").map(text)?,
            type_data.get("name").map(text)?
        ));
    }

    let artist = type_data.and_then(|t| {
        let id = selections.get("level3")?.as_str()?;
        t.get("level3_artists")?.get(id)
    });
    if let Some(artist) = artist {
        parts.push(format!("Artist Style: {}", artist.get("name").map(text)?));
        if let Some(description) = artist.get("description").filter(|v| truthy(v)) {
            parts.push(format!("Description: {}", text(description)));
        }
        if let Some(signature) = artist.get("signature").filter(|v| truthy(v)) {
            parts.push(format!("Signature: {}", text(signature)));
        }
        parts.push(String::new());

        let technical = object(artist.get("level4_technical")).filter(|t| !t.is_empty());
        let level4 = object(selections.get("level4")).filter(|l| !l.is_empty());
        if let (Some(technical), Some(level4)) = (technical, level4) {
            parts.push("Technical Details:".to_string());
            for (key, choice) in level4 {
                let Some(tech) = technical.get(key) else {
                    continue;
                };
                let tech_name = tech.get("name").map(text)?;
                let options = tech.get("options").and_then(Value::as_array);

                match options {
                    Some(options) if options.first().is_some_and(Value::is_object) => {
                        let found = options
                            .iter()
                            .find(|opt| opt.get("id").is_some_and(|id| id == choice));
                        if let Some(option) = found {
                            let description = option
                                .get("description")
                                .filter(|d| truthy(d))
                                .map(|d| format!(" ({})", text(d)))
                                .unwrap_or_default();
                            parts.push(format!(
                                "- {}: {}{}",
                                tech_name,
                                option.get("name").map(text)?,
                                description
                            ));
                        }
                    }
                    _ => parts.push(format!("- {}: {}", tech_name, spaced(choice))),
                }
            }
            parts.push(String::new());
        }
    }

    if let Some(level5) = object(selections.get("level5")).filter(|l| !l.is_empty()) {
        parts.push("Scene Details:".to_string());
        for (key, value) in level5 {
            let label = title_case(&key.replace('_', " "));
            match value {
                Value::Array(_) => parts.push(format!("- {}: {}", label, joined(value))),
                Value::Object(nested) => {
                    for (sub_key, sub_value) in nested {
                        parts.push(format!(
                            "- {} - {}: {}",
                            label,
                            title_case(&sub_key.replace('_', " ")),
                            text(sub_value)
                        ));
                    }
                }
                other => parts.push(format!("- {}: {}", label, spaced(other))),
            }
        }
        parts.push(String::new());
    }

    if let Some(universal) = object(selections.get("universal")).filter(|u| !u.is_empty()) {
        let fields: [(&str, &str, fn(&Value) -> String); 6] = [
            ("mood", "Mood", joined),
            ("time_of_day", "Time", spaced),
            ("lighting", "Lighting", spaced),
            ("color_palette", "Colors", spaced),
            ("weather_atmosphere", "Weather", spaced),
            ("camera_effects", "Camera Effects", joined),
        ];

        let mut added = false;
        for (key, label, render) in fields {
            if let Some(value) = universal.get(key).filter(|v| truthy(v)) {
                parts.push(format!("{}: {}", label, render(value)));
                added = true;
            }
        }
        if added {
            parts.push(String::new());
        }
    }

    Some(parts.join("\n").trim().to_string())
}
