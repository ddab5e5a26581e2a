//! Tutoring sessions
//!
//! A [`TutorSession`] is the explicit per-student session object: it owns the
//! conversation store and the turn dispatcher. Nothing is shared between
//! sessions except the stateless completion provider.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::config::Persona;
use crate::conversation::{
    ClassLabel, ConversationStore, ExportFile, ProfileChange, RenamePolicy, StudentProfile,
    Turn, TurnError,
};

use super::dispatcher::{DispatchState, SubmitOutcome, TurnDispatcher};

/// Read-only snapshot for rendering
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub state: DispatchState,
    pub profile: StudentProfile,
    /// Visible turns only; the system prompt is never exposed.
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
}

pub struct TutorSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    store: Arc<Mutex<ConversationStore>>,
    dispatcher: TurnDispatcher,
}

impl TutorSession {
    pub fn new(
        persona: Arc<Persona>,
        policy: RenamePolicy,
        class_label: ClassLabel,
        dispatcher: TurnDispatcher,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            store: Arc::new(Mutex::new(ConversationStore::new(persona, policy, class_label))),
            dispatcher,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> DispatchState {
        self.dispatcher.state()
    }

    pub async fn submit(&self, text: &str) -> Result<SubmitOutcome, TurnError> {
        self.dispatcher.submit(&self.store, text).await
    }

    pub async fn set_profile(&self, name: &str, class_label: ClassLabel) -> ProfileChange {
        let change = self.store.lock().await.set_profile(name, class_label);
        if change != ProfileChange::Unchanged {
            tracing::info!(session = %self.id, ?change, "Student profile updated");
        }
        change
    }

    /// Wipe the transcript, keeping the student's profile.
    pub async fn reset(&self) {
        let mut store = self.store.lock().await;
        let (system_prompt, greeting) = store.fresh_start();
        store.reset(system_prompt, greeting);
        tracing::info!(session = %self.id, "Conversation reset");
    }

    pub async fn export(&self, date: NaiveDate) -> ExportFile {
        self.store.lock().await.export_file(date)
    }

    pub async fn view(&self) -> SessionView {
        let store = self.store.lock().await;
        SessionView {
            id: self.id,
            state: self.dispatcher.state(),
            profile: store.profile().clone(),
            turns: store.visible_turns().cloned().collect(),
            created_at: self.created_at,
        }
    }
}

/// Live sessions keyed by id
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<TutorSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: TutorSession) -> Arc<TutorSession> {
        let session = Arc::new(session);
        self.sessions
            .write()
            .await
            .insert(session.id(), session.clone());
        tracing::info!(session = %session.id(), "Session started");
        session
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<TutorSession>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// End a session; its transcript is gone afterwards.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::info!(session = %id, "Session ended");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
