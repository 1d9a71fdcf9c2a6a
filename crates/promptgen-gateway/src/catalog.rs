//! Prompt catalog
//!
//! System prompts, personas and presets loaded from disk into one owned value.
//! The gateway holds it behind a lock and swaps its contents on
//! [`PromptCatalog::reload`]; nothing here is process-global.
//!
//! Every loader degrades instead of failing: missing or malformed files log an
//! error and fall back to built-in prompts or empty catalogs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::config::CatalogSettings;

/// Model type used when the requested one has no prompt
pub const DEFAULT_MODEL_TYPE: &str = "flux";

/// Model types with built-in prompts, in reload order
pub const MODEL_TYPES: [&str; 2] = ["sdxl", "flux"];

const SDXL_ONESHOT: &str = r#"You are an expert prompt engineer for Stable Diffusion XL (SDXL). When users describe an image idea, you expand it into a detailed, effective prompt.

The user may provide preset selections for style, artist/photographer, composition, and lighting. When these are provided, incorporate them naturally into the prompt.

SDXL works best with:
- Natural language descriptions with rich details
- Quality tags like: masterpiece, best quality, highly detailed, sharp focus, 8k
- Specific details about: subject, composition, lighting, camera angle, art style, mood, colors
- Negative prompts to avoid unwanted elements

Format your response as:
PROMPT: [detailed positive prompt incorporating any presets]
NEGATIVE: [negative prompt with things to avoid]

Be creative, specific, and detailed. Weave the preset selections naturally into the description."#;

const FLUX_ONESHOT: &str = r#"You are an expert prompt engineer for Flux models. When users describe an image idea, you expand it into a detailed, effective prompt.

The user may provide preset selections for style, artist/photographer, composition, and lighting. When these are provided, incorporate them naturally and seamlessly into the prompt description.

Flux models work best with:
- Natural language, conversational style prompts
- Very detailed scene descriptions
- Specific lighting and atmospheric details
- Camera angles and composition details
- Art style and mood descriptions
- No need for quality tags or negative prompts (Flux ignores them)

Format your response as:
PROMPT: [single detailed natural language prompt incorporating any presets naturally]

Be extremely descriptive and creative. Write like you're describing a photograph or painting in detail. Integrate the preset selections seamlessly into the narrative."#;

const SDXL_CHAT: &str = r#"You are a collaborative prompt engineering partner helping the user craft prompts for Stable Diffusion XL (SDXL). Use a conversational tone and work iteratively.

For each user message:
- Briefly acknowledge the request and how it fits the ongoing concept.
- Brainstorm 2-3 improved prompt variations labeled as Option 1, Option 2, etc. Write them as rich natural language descriptions that naturally include any provided presets.
- Provide a short list of negative prompt considerations that SDXL users might add, highlighting differences between the options when helpful.
- Ask at least one follow-up question or suggest the next tweak to keep the collaboration moving forward.

Do not reply with a single "PROMPT:" line. Keep responses friendly, structured, and easy to skim in chat format."#;

const FLUX_CHAT: &str = r#"You are a creative brainstorming partner for Flux image models. Respond conversationally and iterate with the user.

For each reply:
- Offer 2-3 distinct creative directions or prompt variations, each clearly labeled (e.g., Option 1, Option 2) and written in vivid natural language.
- Call out noteworthy stylistic, compositional, or lighting ideas for each option, integrating any presets the user selected.
- Ask at least one clarifying or exploratory question to encourage further refinement, or suggest what the user might try next.

Avoid emitting a single "PROMPT:" response. Keep the tone collaborative and idea-focused."#;

/// Which system prompt family to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptMode {
    Oneshot,
    Chat,
}

impl PromptMode {
    fn suffix(&self) -> &'static str {
        match self {
            PromptMode::Oneshot => "oneshot",
            PromptMode::Chat => "chat",
        }
    }
}

fn builtin_prompt(model_type: &str, mode: PromptMode) -> &'static str {
    match (model_type, mode) {
        ("sdxl", PromptMode::Oneshot) => SDXL_ONESHOT,
        ("sdxl", PromptMode::Chat) => SDXL_CHAT,
        (_, PromptMode::Oneshot) => FLUX_ONESHOT,
        (_, PromptMode::Chat) => FLUX_CHAT,
    }
}

/// Persona metadata from `personas.json`.
///
/// Display fields (name, icon, category, ...) are kept verbatim in `meta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<String>,

    #[serde(default)]
    pub supports_presets: bool,

    #[serde(flatten)]
    pub meta: serde_json::Map<String, Value>,
}

/// Flat presets: display name to prompt fragment, per category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyPresets {
    #[serde(default)]
    pub styles: BTreeMap<String, String>,
    #[serde(default)]
    pub artists: BTreeMap<String, String>,
    #[serde(default)]
    pub composition: BTreeMap<String, String>,
    #[serde(default)]
    pub lighting: BTreeMap<String, String>,
}

impl LegacyPresets {
    /// Only the `None` entry in every category
    pub fn fallback() -> Self {
        let none = || BTreeMap::from([("None".to_string(), String::new())]);
        Self {
            styles: none(),
            artists: none(),
            composition: none(),
            lighting: none(),
        }
    }
}

/// Empty hierarchical document with the expected top-level keys
pub fn hierarchical_fallback() -> Value {
    serde_json::json!({
        "version": "1.0",
        "categories": {},
        "preset_packs": {"packs": []},
        "universal_options": {},
        "quality_tags": {"flux": {}, "sdxl": {}}
    })
}

/// Everything the routes need to turn a request into a transcript
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    settings: CatalogSettings,
    prompts: HashMap<(String, PromptMode), String>,
    personas: BTreeMap<String, Persona>,
    presets: LegacyPresets,
    hierarchical: Option<Value>,
}

impl PromptCatalog {
    /// Load the catalog described by `settings`
    pub fn load(settings: CatalogSettings) -> Self {
        let mut catalog = Self {
            settings,
            prompts: HashMap::new(),
            personas: BTreeMap::new(),
            presets: LegacyPresets::default(),
            hierarchical: None,
        };
        catalog.reload();
        catalog
    }

    /// Re-read every file; returns the names of the reloaded system prompts
    pub fn reload(&mut self) -> Vec<String> {
        let mut reloaded = Vec::new();
        for mode in [PromptMode::Oneshot, PromptMode::Chat] {
            for model_type in MODEL_TYPES {
                let prompt = load_system_prompt(&self.settings.prompts_dir, model_type, mode);
                self.prompts
                    .insert((model_type.to_string(), mode), prompt);
                reloaded.push(match mode {
                    PromptMode::Oneshot => model_type.to_string(),
                    PromptMode::Chat => format!("{}_chat", model_type),
                });
            }
        }
        tracing::info!("System prompts loaded successfully");

        self.personas = load_personas(&self.settings.personas_file);
        self.reload_presets();

        reloaded
    }

    /// Re-read the flat and hierarchical preset files
    pub fn reload_presets(&mut self) {
        self.presets = load_legacy_presets(&self.settings.presets_file);
        self.hierarchical = self
            .settings
            .enable_hierarchical_presets
            .then(|| load_hierarchical_presets(&self.settings.hierarchical_presets_file));
    }

    /// System prompt for a model type; unknown types use the flux prompt
    pub fn system_prompt(&self, model_type: &str, mode: PromptMode) -> &str {
        self.prompts
            .get(&(model_type.to_string(), mode))
            .or_else(|| self.prompts.get(&(DEFAULT_MODEL_TYPE.to_string(), mode)))
            .map(String::as_str)
            .unwrap_or_else(|| builtin_prompt(DEFAULT_MODEL_TYPE, mode))
    }

    pub fn personas(&self) -> &BTreeMap<String, Persona> {
        &self.personas
    }

    pub fn persona(&self, id: &str) -> Option<&Persona> {
        self.personas.get(id)
    }

    /// Read a persona's prompt file; `None` if it is unknown, unset or unreadable
    pub fn persona_prompt(&self, id: &str) -> Option<String> {
        let persona = self.persona(id)?;
        let Some(prompt_file) = persona.prompt_file.as_deref().filter(|f| !f.is_empty()) else {
            tracing::error!("No prompt_file specified for persona: {}", id);
            return None;
        };

        let path = self.settings.personas_dir.join(prompt_file);
        match std::fs::read_to_string(&path) {
            Ok(content) if !content.trim().is_empty() => {
                tracing::debug!("Loaded prompt for persona '{}' from {}", id, path.display());
                Some(content)
            }
            Ok(_) => {
                tracing::error!("Persona prompt file is empty: {}", path.display());
                None
            }
            Err(e) => {
                tracing::error!("Cannot read persona prompt {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn presets(&self) -> &LegacyPresets {
        &self.presets
    }

    /// Hierarchical document, present only when the feature is enabled
    pub fn hierarchical(&self) -> Option<&Value> {
        self.hierarchical.as_ref()
    }

    pub fn hierarchical_enabled(&self) -> bool {
        self.settings.enable_hierarchical_presets
    }
}

fn load_system_prompt(dir: &Path, model_type: &str, mode: PromptMode) -> String {
    let path = dir.join(format!("{}_{}.txt", model_type, mode.suffix()));
    match std::fs::read_to_string(&path) {
        Ok(content) if !content.trim().is_empty() => {
            tracing::info!("Loaded {} {} prompt from {}", model_type, mode.suffix(), path.display());
            content.trim().to_string()
        }
        Ok(_) => {
            tracing::warn!("{} is empty, using fallback", path.display());
            builtin_prompt(model_type, mode).to_string()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("{} not found, using fallback", path.display());
            builtin_prompt(model_type, mode).to_string()
        }
        Err(e) => {
            tracing::error!("Error loading {}: {}, using fallback", path.display(), e);
            builtin_prompt(model_type, mode).to_string()
        }
    }
}

/// Read and parse a JSON file, logging instead of failing
fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Option<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::error!("{} file not readable: {} ({})", what, path.display(), e);
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!("Invalid JSON in {} file {}: {}", what, path.display(), e);
            None
        }
    }
}

fn load_personas(path: &Path) -> BTreeMap<String, Persona> {
    match read_json::<BTreeMap<String, Persona>>(path, "Personas") {
        Some(personas) => {
            tracing::info!("Loaded {} personas from {}", personas.len(), path.display());
            personas
        }
        None => {
            tracing::warn!("Using empty fallback personas");
            BTreeMap::new()
        }
    }
}

fn load_legacy_presets(path: &Path) -> LegacyPresets {
    read_json(path, "Presets").unwrap_or_else(|| {
        tracing::warn!("Using minimal fallback legacy presets");
        LegacyPresets::fallback()
    })
}

fn load_hierarchical_presets(path: &Path) -> Value {
    match read_json::<Value>(path, "Hierarchical presets") {
        Some(presets) => {
            if presets.get("categories").is_none() || presets.get("preset_packs").is_none() {
                tracing::warn!("Hierarchical presets file missing expected structure");
            }
            presets
        }
        None => {
            tracing::warn!("Using minimal fallback hierarchical presets");
            hierarchical_fallback()
        }
    }
}
