//! Persona templates and system-prompt composition
//!
//! A persona bundles everything the tutor says on its own: the base system
//! prompt, the greetings that open a conversation, the apology used when the
//! completion provider fails, and the quick-question list. Personas load from
//! TOML files; the built-in Dr. Luna persona is used when none is configured.
//!
//! # Example Persona File
//!
//! ```toml
//! [persona]
//! name = "Dr. Luna"
//! topic = "moon_exploration"
//! student_placeholder = "Student"
//!
//! [system_prompt]
//! content = """
//! You are 'Dr. Luna', a friendly moon expert...
//! """
//!
//! [greeting]
//! anonymous = "Hi! I'm Dr. Luna 🌙"
//! named = "Hi {name}! I'm Dr. Luna 🌙"
//! apology = "Oops, I couldn't answer just now. Ask me again?"
//!
//! [[examples.questions]]
//! label = "🌙 Today's moon"
//! question = "What shape is the moon today? When can I see it?"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Placeholder replaced by the student's name in the named greeting.
const NAME_PLACEHOLDER: &str = "{name}";

/// A tutor persona loaded from TOML or taken from [`builtin`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// Persona metadata
    pub persona: PersonaInfo,

    /// The base system prompt, before personalization
    pub system_prompt: SystemPrompt,

    /// Canned lines the tutor says without asking the model
    #[serde(default)]
    pub greeting: Greetings,

    /// Quick questions offered as one-click triggers
    #[serde(default)]
    pub examples: PromptExamples,
}

/// Persona metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaInfo {
    /// Display name, used as the assistant label in exports
    pub name: String,

    /// Brief description
    #[serde(default)]
    pub description: String,

    /// Topic label used as the export file prefix
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Label for a student who has not entered a name
    #[serde(default = "default_student_placeholder")]
    pub student_placeholder: String,
}

fn default_topic() -> String {
    "moon_exploration".to_string()
}

fn default_student_placeholder() -> String {
    "Student".to_string()
}

/// System prompt content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPrompt {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Greetings {
    /// Opening line when the student's name is unknown
    #[serde(default = "default_anonymous_greeting")]
    pub anonymous: String,

    /// Opening line for a named student; `{name}` is substituted
    #[serde(default = "default_named_greeting")]
    pub named: String,

    /// Reply appended when the completion provider fails
    #[serde(default = "default_apology")]
    pub apology: String,
}

fn default_anonymous_greeting() -> String {
    builtin::ANONYMOUS_GREETING.to_string()
}

fn default_named_greeting() -> String {
    builtin::NAMED_GREETING.to_string()
}

fn default_apology() -> String {
    builtin::APOLOGY.to_string()
}

impl Default for Greetings {
    fn default() -> Self {
        Self {
            anonymous: default_anonymous_greeting(),
            named: default_named_greeting(),
            apology: default_apology(),
        }
    }
}

/// Quick questions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptExamples {
    #[serde(default)]
    pub questions: Vec<QuickQuestion>,
}

/// A predefined utterance submittable with a single action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickQuestion {
    /// Short button label
    pub label: String,

    /// The text submitted on the student's behalf
    pub question: String,
}

impl QuickQuestion {
    fn new(label: &str, question: &str) -> Self {
        Self {
            label: label.to_string(),
            question: question.to_string(),
        }
    }
}

impl Persona {
    /// The built-in Dr. Luna persona
    pub fn builtin() -> Self {
        Self {
            persona: PersonaInfo {
                name: builtin::NAME.to_string(),
                description: builtin::DESCRIPTION.to_string(),
                topic: default_topic(),
                student_placeholder: default_student_placeholder(),
            },
            system_prompt: SystemPrompt {
                content: builtin::SYSTEM_PROMPT.to_string(),
            },
            greeting: Greetings::default(),
            examples: PromptExamples {
                questions: builtin::quick_questions(),
            },
        }
    }

    /// Load a persona directly from a file path
    pub async fn load_from_file(path: &Path) -> Result<Self, PromptError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PromptError::IoError(format!("{}: {}", path.display(), e)))?;

        let persona = Self::from_toml(&content)?;
        tracing::info!(
            "Loaded persona '{}' from {} ({} quick questions)",
            persona.persona.name,
            path.display(),
            persona.examples.questions.len()
        );
        Ok(persona)
    }

    /// Parse and validate a persona from TOML text
    pub fn from_toml(content: &str) -> Result<Self, PromptError> {
        let persona: Persona =
            toml::from_str(content).map_err(|e| PromptError::ParseError(e.to_string()))?;
        persona.validate()?;
        Ok(persona)
    }

    /// Every line the tutor can say on its own must be non-empty.
    pub fn validate(&self) -> Result<(), PromptError> {
        let required = [
            ("persona.name", &self.persona.name),
            ("persona.student_placeholder", &self.persona.student_placeholder),
            ("persona.topic", &self.persona.topic),
            ("system_prompt.content", &self.system_prompt.content),
            ("greeting.anonymous", &self.greeting.anonymous),
            ("greeting.named", &self.greeting.named),
            ("greeting.apology", &self.greeting.apology),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(PromptError::Invalid(format!("{} must not be empty", field)));
            }
        }

        if let Some(blank) = self
            .examples
            .questions
            .iter()
            .position(|q| q.question.trim().is_empty())
        {
            return Err(PromptError::Invalid(format!(
                "quick question #{} has no text",
                blank
            )));
        }

        Ok(())
    }

    pub fn quick_questions(&self) -> &[QuickQuestion] {
        &self.examples.questions
    }

    pub fn quick_question(&self, index: usize) -> Option<&QuickQuestion> {
        self.examples.questions.get(index)
    }
}

/// Build the system prompt for a student.
///
/// An empty (or blank) name yields `base` unchanged. Otherwise `base` is
/// followed by a fixed personalization clause that embeds the name verbatim.
pub fn compose_system_prompt(base: &str, student_name: &str) -> String {
    if student_name.trim().is_empty() {
        return base.to_string();
    }

    format!(
        "{}\n\n[Student name]\nThe student you are talking with is named '{}'. \
         Call them by name now and then when you answer.",
        base, student_name
    )
}

/// The opening assistant line for a student, personalized when the name is known.
pub fn compose_greeting(persona: &Persona, student_name: &str) -> String {
    if student_name.trim().is_empty() {
        return persona.greeting.anonymous.clone();
    }

    persona.greeting.named.replace(NAME_PLACEHOLDER, student_name)
}

/// Errors from persona loading
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid persona: {0}")]
    Invalid(String),
}

/// The built-in Dr. Luna persona
pub mod builtin {
    use super::QuickQuestion;

    pub const NAME: &str = "Dr. Luna";

    pub const DESCRIPTION: &str = "Friendly moon expert for 4th-grade moon observation lessons";

    pub const SYSTEM_PROMPT: &str = r#"You are 'Dr. Luna', a friendly moon expert.
You are talking with 4th-grade elementary school students.

[Rules]
- Talk casually, keep it short and friendly.
- Answer in 2-3 sentences, 50 words or fewer.
- Use easy words instead of difficult ones.
- Quizzes are true/false or three-choice only, at textbook level.
- Never say anything that is not true. If you are not sure, say "I don't know".

[Role]
1. Explain the moon's shapes and phases (new moon, crescent, first quarter, full moon, last quarter)
2. Show how to observe the moon
3. Share fun moon stories and quizzes
4. Encourage and praise the student"#;

    pub const ANONYMOUS_GREETING: &str =
        "Hi! I'm Dr. Luna 🌙\n\nShall we start today's moon adventure together?";

    pub const NAMED_GREETING: &str =
        "Hi {name}! I'm Dr. Luna 🌙\n\nShall we start today's moon adventure together?";

    pub const APOLOGY: &str =
        "Oh no, my telescope got foggy and I couldn't answer just now 🌫️ Could you ask me again in a moment?";

    pub fn quick_questions() -> Vec<QuickQuestion> {
        [
            ("🌙 Today's moon", "What shape is the moon today? When can I see it?"),
            ("📖 Moon stories", "Tell me a fun story or legend about the moon"),
            ("🔍 How to observe", "What should I look at, and how, when I observe the moon?"),
            ("❓ Moon quiz", "Give me a fun quiz about the moon"),
            ("🌗 Changing shape", "Explain why the moon's shape changes"),
            ("🏔️ Moon surface", "What is on the moon's surface? Tell me about the lunar seas"),
            ("📅 Lunar calendar", "How is the lunar calendar related to the moon's shape?"),
            ("⚠️ Safety rules", "What should I be careful about when I observe the moon at night?"),
            ("👩‍🚀 Moon missions", "Have people been to the moon? What happened there?"),
            ("🔭 Daytime moon", "Can I only see the moon at night? Can I see it during the day?"),
            ("🌍 Moon vs. Earth", "Why is there no air on the moon? How is it different from Earth?"),
            ("✍️ Observation diary", "How do I write a good moon observation diary?"),
            ("🛡️ Top 3 safety tips", "Tell me 3 things to be careful about when I watch the moon at night"),
        ]
        .into_iter()
        .map(|(label, question)| QuickQuestion::new(label, question))
        .collect()
    }
}
