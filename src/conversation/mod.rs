//! Conversation types and state management
//!
//! [`ConversationStore`] owns the transcript and the student's profile for one
//! session. It never talks to the completion provider; the turn dispatcher
//! does that and appends the result here.

mod export;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use crate::config::{compose_greeting, compose_system_prompt, Persona};

pub use export::ExportFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-tagged transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TurnError {
    #[error("{0} turn must have non-empty content")]
    EmptyContent(Role),

    #[error("the system turn is only set by initialize or reset")]
    SystemTurn,
}

/// A class label from the configured roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClassLabel(String);

impl ClassLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed set of class labels a student can pick from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassRoster {
    labels: Vec<String>,
}

impl ClassRoster {
    /// Returns `None` for an empty roster.
    pub fn new(labels: Vec<String>) -> Option<Self> {
        let labels: Vec<String> = labels
            .into_iter()
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .collect();

        if labels.is_empty() {
            None
        } else {
            Some(Self { labels })
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The first label is preselected for a new student.
    pub fn default_label(&self) -> ClassLabel {
        ClassLabel(self.labels[0].clone())
    }

    pub fn label(&self, raw: &str) -> Option<ClassLabel> {
        let raw = raw.trim();
        self.labels
            .iter()
            .find(|label| label.as_str() == raw)
            .map(|label| ClassLabel(label.clone()))
    }
}

impl Default for ClassRoster {
    fn default() -> Self {
        Self {
            labels: ["1", "2", "3", "4"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentProfile {
    /// Empty means the student has not told us their name.
    pub name: String,
    pub class_label: ClassLabel,
}

impl StudentProfile {
    /// The name, or `placeholder` when it is unknown
    pub fn display_name<'a>(&'a self, placeholder: &'a str) -> &'a str {
        if self.name.is_empty() {
            placeholder
        } else {
            &self.name
        }
    }
}

/// What happens to the transcript when the student's name changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenamePolicy {
    /// Replace the system prompt, keep every other turn
    #[default]
    Preserve,
    /// Start over with a personalized prompt and greeting
    Reset,
}

impl FromStr for RenamePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "preserve" => Ok(RenamePolicy::Preserve),
            "reset" => Ok(RenamePolicy::Reset),
            other => Err(format!("expected 'preserve' or 'reset', got '{}'", other)),
        }
    }
}

/// Result of a profile update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileChange {
    Unchanged,
    PromptRegenerated,
    ConversationReset,
}

/// Authoritative transcript and student profile for one session
#[derive(Debug)]
pub struct ConversationStore {
    persona: Arc<Persona>,
    policy: RenamePolicy,
    turns: Vec<Turn>,
    profile: StudentProfile,
    /// Bumped whenever the transcript is replaced wholesale.
    generation: u64,
}

impl ConversationStore {
    /// A fresh store seeded with the persona's system prompt and greeting
    pub fn new(persona: Arc<Persona>, policy: RenamePolicy, class_label: ClassLabel) -> Self {
        let system_prompt = persona.system_prompt.content.clone();
        let greeting = compose_greeting(&persona, "");

        let mut store = Self {
            persona,
            policy,
            turns: Vec::new(),
            profile: StudentProfile {
                name: String::new(),
                class_label,
            },
            generation: 0,
        };
        store.initialize(system_prompt, greeting);
        store
    }

    /// Replace the transcript with `[system, assistant greeting]`.
    pub fn initialize(&mut self, system_prompt: impl Into<String>, greeting: impl Into<String>) {
        self.turns = vec![
            Turn::new(Role::System, system_prompt),
            Turn::new(Role::Assistant, greeting),
        ];
        self.generation += 1;
    }

    /// Explicit wipe; same as [`initialize`](Self::initialize).
    pub fn reset(&mut self, system_prompt: impl Into<String>, greeting: impl Into<String>) {
        self.initialize(system_prompt, greeting);
    }

    pub fn append_turn(&mut self, role: Role, content: impl Into<String>) -> Result<(), TurnError> {
        if role == Role::System {
            return Err(TurnError::SystemTurn);
        }

        let content = content.into();
        if content.trim().is_empty() {
            return Err(TurnError::EmptyContent(role));
        }

        self.turns.push(Turn::new(role, content));
        Ok(())
    }

    /// Update the profile, regenerating the system prompt when the name changes.
    pub fn set_profile(&mut self, name: &str, class_label: ClassLabel) -> ProfileChange {
        let name = name.trim();
        self.profile.class_label = class_label;

        if name == self.profile.name {
            return ProfileChange::Unchanged;
        }
        self.profile.name = name.to_string();

        let system_prompt = compose_system_prompt(&self.persona.system_prompt.content, name);
        match self.policy {
            RenamePolicy::Preserve => {
                match self.turns.first_mut() {
                    Some(head) if head.role == Role::System => {
                        *head = Turn::new(Role::System, system_prompt);
                    }
                    _ => self.turns.insert(0, Turn::new(Role::System, system_prompt)),
                }
                ProfileChange::PromptRegenerated
            }
            RenamePolicy::Reset => {
                let greeting = compose_greeting(&self.persona, name);
                self.initialize(system_prompt, greeting);
                ProfileChange::ConversationReset
            }
        }
    }

    /// System prompt and greeting for a fresh start with the current profile
    pub fn fresh_start(&self) -> (String, String) {
        let name = self.profile.name.as_str();
        (
            compose_system_prompt(&self.persona.system_prompt.content, name),
            compose_greeting(&self.persona, name),
        )
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Turns shown to the student; the system turn is never among them.
    pub fn visible_turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|turn| turn.role != Role::System)
    }

    pub fn profile(&self) -> &StudentProfile {
        &self.profile
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
