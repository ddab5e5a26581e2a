//! Scripted completion provider for tests
//!
//! Replies are queued up front and handed out in order; every request is
//! recorded so tests can inspect the transcript the dispatcher sent.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::conversation::Turn;

use super::{CompletionOptions, CompletionProvider, ProviderError};

enum Step {
    Reply(String),
    Fail(ProviderError),
    /// Never answers; the dispatcher's timeout has to fire.
    Hang,
    /// Answers once the test calls `notify_one` on the handle.
    WaitFor(Arc<Notify>, String),
}

#[derive(Default)]
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<(Vec<Turn>, CompletionOptions)>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Step::Reply(text.into()))
    }

    pub fn fail(self, error: ProviderError) -> Self {
        self.push(Step::Fail(error))
    }

    pub fn hang(self) -> Self {
        self.push(Step::Hang)
    }

    /// Queue a reply held back until the returned handle is notified.
    pub fn gated_reply(self, text: impl Into<String>) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        (self.push(Step::WaitFor(gate.clone(), text.into())), gate)
    }

    pub fn requests(&self) -> Vec<(Vec<Turn>, CompletionOptions)> {
        self.requests.lock().unwrap().clone()
    }

    fn push(self, step: Step) -> Self {
        self.steps.lock().unwrap().push_back(step);
        self
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        turns: &[Turn],
        options: CompletionOptions,
    ) -> Result<String, ProviderError> {
        self.requests
            .lock()
            .unwrap()
            .push((turns.to_vec(), options));

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(text)) => Ok(text),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::InvalidResponse("hung step woke up".to_string()))
            }
            Some(Step::WaitFor(gate, text)) => {
                gate.notified().await;
                Ok(text)
            }
            None => Err(ProviderError::InvalidResponse(
                "no scripted reply left".to_string(),
            )),
        }
    }
}
