//! Turn dispatcher
//!
//! One `submit` is one request/response cycle against the completion
//! provider:
//! 1. Ignore blank input and input that arrives while a reply is pending
//! 2. Append the student's turn
//! 3. Ask the provider for a reply, bounded by a timeout
//! 4. Append the reply, or the persona's apology if the provider failed
//!
//! There is no retry. A student asking again is the retry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::conversation::{ConversationStore, Role, Turn, TurnError};
use crate::providers::{CompletionOptions, CompletionProvider, ProviderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchState {
    Idle,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IgnoreReason {
    Blank,
    Busy,
}

/// What a single `submit` did to the conversation
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Nothing was appended.
    Ignored(IgnoreReason),
    /// The provider's reply was appended.
    Answered { reply: String },
    /// The provider failed; the apology notice was appended instead.
    Recovered { notice: String, error: ProviderError },
    /// The conversation was replaced while the reply was pending; the reply was dropped.
    Discarded,
}

impl SubmitOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            SubmitOutcome::Ignored(_) => "ignored",
            SubmitOutcome::Answered { .. } => "answered",
            SubmitOutcome::Recovered { .. } => "recovered",
            SubmitOutcome::Discarded => "discarded",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DispatcherSettings {
    pub options: CompletionOptions,
    pub timeout: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            options: CompletionOptions::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Clears the pending flag on drop, so every exit path returns to `Idle`.
struct PendingGuard {
    flag: Arc<AtomicBool>,
}

impl PendingGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Everything the reply half of a cycle needs once the student's turn is in.
struct PendingReply {
    provider: Arc<dyn CompletionProvider>,
    settings: DispatcherSettings,
    store: Arc<Mutex<ConversationStore>>,
    transcript: Vec<Turn>,
    generation: u64,
    apology: String,
    _pending: PendingGuard,
}

impl PendingReply {
    async fn resolve(self) -> Result<SubmitOutcome, TurnError> {
        let provider = self.provider.name();
        let result = match tokio::time::timeout(
            self.settings.timeout,
            self.provider.complete(&self.transcript, self.settings.options),
        )
        .await
        {
            Ok(Ok(reply)) if reply.trim().is_empty() => Err(ProviderError::InvalidResponse(
                "Provider returned an empty reply".to_string(),
            )),
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.settings.timeout)),
        };

        let mut store = self.store.lock().await;
        if store.generation() != self.generation {
            tracing::warn!(
                provider,
                "Conversation was reset while a reply was pending; discarding the reply"
            );
            return Ok(SubmitOutcome::Discarded);
        }

        match result {
            Ok(reply) => {
                store.append_turn(Role::Assistant, reply.clone())?;
                Ok(SubmitOutcome::Answered { reply })
            }
            Err(error) => {
                tracing::error!(
                    provider,
                    error = %error,
                    "Completion failed; answering with the apology notice"
                );
                store.append_turn(Role::Assistant, self.apology.clone())?;
                Ok(SubmitOutcome::Recovered {
                    notice: self.apology,
                    error,
                })
            }
        }
    }
}

pub struct TurnDispatcher {
    provider: Arc<dyn CompletionProvider>,
    settings: DispatcherSettings,
    pending: Arc<AtomicBool>,
}

impl TurnDispatcher {
    pub fn new(provider: Arc<dyn CompletionProvider>, settings: DispatcherSettings) -> Self {
        Self {
            provider,
            settings,
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> DispatchState {
        if self.pending.load(Ordering::Acquire) {
            DispatchState::Pending
        } else {
            DispatchState::Idle
        }
    }

    /// Run one student turn against `store`.
    ///
    /// The store lock is never held while the provider is working, so the UI
    /// can still read the transcript (and see the student's turn) meanwhile.
    /// Once the student's turn is appended the reply half runs on its own
    /// task: dropping this future (a client hanging up) still ends the cycle
    /// with the reply or the apology, and the dispatcher stays `Pending`
    /// until it does.
    pub async fn submit(
        &self,
        store: &Arc<Mutex<ConversationStore>>,
        user_text: &str,
    ) -> Result<SubmitOutcome, TurnError> {
        let text = user_text.trim();
        if text.is_empty() {
            tracing::debug!("Ignoring blank submission");
            return Ok(SubmitOutcome::Ignored(IgnoreReason::Blank));
        }

        let Some(pending) = PendingGuard::acquire(&self.pending) else {
            tracing::debug!("Ignoring submission while a reply is pending");
            return Ok(SubmitOutcome::Ignored(IgnoreReason::Busy));
        };

        let reply = {
            let mut guard = store.lock().await;
            guard.append_turn(Role::User, text)?;
            PendingReply {
                provider: self.provider.clone(),
                settings: self.settings,
                store: store.clone(),
                transcript: guard.turns().to_vec(),
                generation: guard.generation(),
                apology: guard.persona().greeting.apology.clone(),
                _pending: pending,
            }
        };

        tracing::debug!(
            provider = self.provider.name(),
            turns = reply.transcript.len(),
            "Requesting completion"
        );

        match tokio::spawn(reply.resolve()).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => {
                tracing::warn!("Reply task was cancelled by runtime shutdown");
                Ok(SubmitOutcome::Discarded)
            }
        }
    }
}
