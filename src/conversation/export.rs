//! Plain-text transcript export

use chrono::NaiveDate;
use serde::Serialize;

use super::{ConversationStore, Role};

/// A one-shot download: file name plus body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportFile {
    pub filename: String,
    pub body: String,
}

impl ConversationStore {
    /// Render every non-system turn as `label: content`, blank-line separated.
    pub fn export_text(&self) -> String {
        let info = &self.persona.persona;
        let student = self.profile.display_name(&info.student_placeholder);

        self.visible_turns()
            .map(|turn| {
                let label = match turn.role {
                    Role::Assistant => info.name.as_str(),
                    _ => student,
                };
                format!("{}: {}\n", label, turn.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn export_file(&self, date: NaiveDate) -> ExportFile {
        let info = &self.persona.persona;
        ExportFile {
            filename: export_filename(
                &info.topic,
                self.profile.display_name(&info.student_placeholder),
                date,
            ),
            body: self.export_text(),
        }
    }
}

/// `{topic}_{student}_{YYYY-MM-DD}.txt`, with path-hostile characters replaced.
pub fn export_filename(topic: &str, student: &str, date: NaiveDate) -> String {
    format!(
        "{}_{}_{}.txt",
        filename_component(topic),
        filename_component(student),
        date.format("%Y-%m-%d")
    )
}

fn filename_component(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
