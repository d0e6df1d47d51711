//! Persona reference data.
//!
//! Personas are read-only records looked up by id. The pipeline never
//! mutates them; it only reads the system prompt and the display fields.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub description: String,
    pub system_prompt: String,
}

impl Persona {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
        }
    }
}

/// Lookup of personas by id.
#[cfg_attr(test, mockall::automock)]
pub trait PersonaRegistry: Send + Sync {
    fn get(&self, id: &str) -> Option<Persona>;
    fn all(&self) -> Vec<Persona>;
}

/// Registry held entirely in memory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPersonaRegistry {
    order: Vec<String>,
    personas: HashMap<String, Persona>,
}

impl InMemoryPersonaRegistry {
    pub fn new(personas: impl IntoIterator<Item = Persona>) -> Self {
        let mut registry = Self::default();
        for persona in personas {
            registry.insert(persona);
        }
        registry
    }

    /// The personas shipped with the binary.
    pub fn with_defaults() -> Self {
        Self::new(default_personas())
    }

    /// Loads a JSON array of personas from `path`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read personas file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid personas file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let personas: Vec<Persona> = serde_json::from_str(raw)?;
        if personas.is_empty() {
            bail!("no personas defined");
        }
        if let Some(bad) = personas.iter().find(|p| p.id.trim().is_empty()) {
            bail!("persona '{}' has an empty id", bad.name);
        }
        Ok(Self::new(personas))
    }

    /// Adds or replaces a persona, keeping its original position on replace.
    pub fn insert(&mut self, persona: Persona) {
        if !self.personas.contains_key(&persona.id) {
            self.order.push(persona.id.clone());
        }
        self.personas.insert(persona.id.clone(), persona);
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

impl PersonaRegistry for InMemoryPersonaRegistry {
    fn get(&self, id: &str) -> Option<Persona> {
        self.personas.get(id).cloned()
    }

    fn all(&self) -> Vec<Persona> {
        self.order
            .iter()
            .filter_map(|id| self.personas.get(id).cloned())
            .collect()
    }
}

fn default_personas() -> Vec<Persona> {
    vec![
        Persona::new(
            "eli5",
            "Explain Like I'm 5",
            "Simple words and friendly comparisons a child could follow.",
            "You explain things to a curious five-year-old. Use short sentences, everyday \
             words, and playful comparisons. Never talk down to the reader.",
        ),
        Persona::new(
            "pirate",
            "Pirate Captain",
            "A salty sea captain retelling the story from the quarterdeck.",
            "You are a weathered pirate captain. Retell the material in hearty pirate speech, \
             with nautical metaphors, while keeping every fact accurate.",
        ),
        Persona::new(
            "shakespeare",
            "The Bard",
            "Elizabethan prose with a dramatic flourish.",
            "You are William Shakespeare. Rewrite the material in Early Modern English with \
             theatrical flair, keeping the meaning intact.",
        ),
        Persona::new(
            "executive",
            "Executive Summary",
            "Crisp, decision-oriented briefing for busy leaders.",
            "You brief senior executives. Lead with the bottom line, quantify where possible, \
             and end with clear implications and next steps.",
        ),
    ]
}
