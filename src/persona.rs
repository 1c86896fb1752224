//! Personas: named system prompts the user picks in the UI.
//!
//! A handful are built in; `[personas.<name>]` entries in the config add
//! new ones or replace a built-in of the same name.

use serde::Serialize;

use crate::config::Config;

struct BuiltinPersona {
    name: &'static str,
    description: &'static str,
    system_prompt: &'static str,
}

const BUILTIN_PERSONAS: &[BuiltinPersona] = &[
    BuiltinPersona {
        name: "assistant",
        description: "General-purpose helpful assistant",
        system_prompt: "You are a helpful, knowledgeable assistant. Answer accurately and \
            clearly. If you are unsure, say so. When the user attaches files, ground your \
            answer in their contents.",
    },
    BuiltinPersona {
        name: "coder",
        description: "Software engineer focused on working code",
        system_prompt: "You are an experienced software engineer. Prefer concrete, working \
            code over prose. Point out bugs and edge cases you notice. Use fenced code \
            blocks with a language tag.",
    },
    BuiltinPersona {
        name: "tutor",
        description: "Patient teacher who explains step by step",
        system_prompt: "You are a patient tutor. Explain ideas step by step, check \
            understanding with short questions, and use simple examples before \
            introducing jargon.",
    },
    BuiltinPersona {
        name: "concise",
        description: "Shortest correct answer, no filler",
        system_prompt: "Answer with the shortest response that is fully correct. No \
            preamble, no restating the question, no closing remarks.",
    },
    BuiltinPersona {
        name: "editor",
        description: "Proof-reads and rewrites text",
        system_prompt: "You are a careful copy editor. Fix grammar, spelling, and clarity \
            while preserving the author's voice. Return the revised text first, then a \
            short list of the notable changes.",
    },
];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_PERSONAS.iter().any(|p| p.name == name)
}

/// A resolved persona.
#[derive(Debug, Clone)]
pub struct Persona {
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    /// `builtin` or `config`.
    pub source: &'static str,
}

/// Listing entry for `GET /api/personas`.
#[derive(Debug, Clone, Serialize)]
pub struct PersonaInfo {
    pub name: String,
    pub description: String,
    pub source: String,
}

#[derive(Debug, Clone, Default)]
pub struct PersonaRegistry {
    personas: Vec<Persona>,
}

impl PersonaRegistry {
    /// Built-ins first (in declaration order), then config-only personas in
    /// name order. A config entry with a built-in's name replaces it in place.
    pub fn from_config(config: &Config) -> Self {
        let mut personas: Vec<Persona> = BUILTIN_PERSONAS
            .iter()
            .map(|p| Persona {
                name: p.name.to_string(),
                description: p.description.to_string(),
                system_prompt: p.system_prompt.to_string(),
                source: "builtin",
            })
            .collect();

        for (name, entry) in &config.personas {
            let persona = Persona {
                name: name.clone(),
                description: entry.description.clone(),
                system_prompt: entry.system_prompt.trim().to_string(),
                source: "config",
            };
            match personas.iter_mut().find(|p| &p.name == name) {
                Some(existing) => *existing = persona,
                None => personas.push(persona),
            }
        }

        Self { personas }
    }

    pub fn get(&self, name: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.name == name)
    }

    /// System prompt for `name`. The error lists the known personas.
    pub fn system_prompt(&self, name: &str) -> Result<&str, String> {
        self.get(name)
            .map(|p| p.system_prompt.as_str())
            .ok_or_else(|| {
                let known: Vec<&str> = self.personas.iter().map(|p| p.name.as_str()).collect();
                format!("unknown persona: '{}' (available: {})", name, known.join(", "))
            })
    }

    pub fn list(&self) -> Vec<PersonaInfo> {
        self.personas
            .iter()
            .map(|p| PersonaInfo {
                name: p.name.clone(),
                description: p.description.clone(),
                source: p.source.to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

/// Print the persona catalog (`chatdesk personas`).
pub fn list_personas(config: &Config) {
    let registry = PersonaRegistry::from_config(config);
    let default = &config.chat.default_persona;

    println!("{:<16} {:<8} DESCRIPTION", "PERSONA", "SOURCE");
    for persona in &registry.personas {
        let marker = if &persona.name == default { " (default)" } else { "" };
        println!(
            "{:<16} {:<8} {}{}",
            persona.name, persona.source, persona.description, marker
        );
    }
}
