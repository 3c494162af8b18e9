use serde::{Deserialize, Serialize};

pub const DEFAULT_PERSONALITY: &str = "analyst";

/// Sampling knobs sent with every request made for a personality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// A named chat mode: which backend answers, with what system prompt, and
/// how it is presented.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PersonalityConfig {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub system_prompt: String,
    /// Presentation-only accent color.
    #[serde(default)]
    pub color: String,
    /// Backend id from the backend table (`gemini`, `lmstudio`, ...).
    pub backend: String,
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl PersonalityConfig {
    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

struct BuiltinPersonality {
    id: &'static str,
    display_name: &'static str,
    description: &'static str,
    system_prompt: &'static str,
    color: &'static str,
    backend: &'static str,
    temperature: f32,
    max_tokens: Option<u32>,
}

const BUILTIN_PERSONALITIES: &[BuiltinPersonality] = &[
    BuiltinPersonality {
        id: "analyst",
        display_name: "Analyst",
        description: "Logical, precise, data-driven insights",
        system_prompt: "You are an analytical AI assistant focused on providing precise, data-driven insights with logical reasoning.",
        color: "#00e0ff",
        backend: "gemini",
        temperature: 0.7,
        max_tokens: Some(1000),
    },
    BuiltinPersonality {
        id: "ghost",
        display_name: "Ghost",
        description: "Silent, efficient, minimal responses",
        system_prompt: "You are a minimal, efficient AI that provides concise, direct answers with no fluff. Be brief and to the point.",
        color: "#888888",
        backend: "lmstudio",
        temperature: 0.2,
        max_tokens: Some(150),
    },
    BuiltinPersonality {
        id: "oracle",
        display_name: "Oracle",
        description: "Visionary, intuitive, abstract thinking",
        system_prompt: "You are a visionary AI with deep intuitive understanding. Provide insightful, thought-provoking responses with philosophical depth.",
        color: "#6a00f4",
        backend: "gemini",
        temperature: 0.7,
        max_tokens: Some(1000),
    },
];

impl From<&BuiltinPersonality> for PersonalityConfig {
    fn from(builtin: &BuiltinPersonality) -> Self {
        Self {
            id: builtin.id.to_string(),
            display_name: builtin.display_name.to_string(),
            description: builtin.description.to_string(),
            system_prompt: builtin.system_prompt.to_string(),
            color: builtin.color.to_string(),
            backend: builtin.backend.to_string(),
            temperature: builtin.temperature,
            max_tokens: builtin.max_tokens,
        }
    }
}

/// Immutable table of personalities, loaded once at startup.
#[derive(Debug, Clone)]
pub struct PersonalityRegistry {
    personalities: Vec<PersonalityConfig>,
}

impl PersonalityRegistry {
    pub fn new(personalities: Vec<PersonalityConfig>) -> Self {
        Self { personalities }
    }

    pub fn builtin() -> Self {
        Self::new(BUILTIN_PERSONALITIES.iter().map(Into::into).collect())
    }

    /// Built-ins plus user-defined entries; a user entry with a built-in id
    /// replaces the built-in.
    pub fn with_overrides(custom: &[PersonalityConfig]) -> Self {
        let mut registry = Self::builtin();
        for personality in custom {
            match registry
                .personalities
                .iter_mut()
                .find(|p| p.id.eq_ignore_ascii_case(&personality.id))
            {
                Some(existing) => *existing = personality.clone(),
                None => registry.personalities.push(personality.clone()),
            }
        }
        registry
    }

    pub fn find(&self, id: &str) -> Option<&PersonalityConfig> {
        self.personalities
            .iter()
            .find(|p| p.id.eq_ignore_ascii_case(id))
    }

    pub fn list(&self) -> &[PersonalityConfig] {
        &self.personalities
    }

    pub fn ids(&self) -> Vec<&str> {
        self.personalities.iter().map(|p| p.id.as_str()).collect()
    }

    /// `DEFAULT_PERSONALITY` when registered, otherwise the first entry.
    pub fn default_id(&self) -> Option<&str> {
        self.find(DEFAULT_PERSONALITY)
            .or_else(|| self.personalities.first())
            .map(|p| p.id.as_str())
    }
}

impl Default for PersonalityRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
