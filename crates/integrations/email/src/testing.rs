//! An in-memory [`EmailBackend`] for tests.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::backend::{EmailBackend, EmailMessage, EmailResult};
use crate::error::EmailError;

/// Records every message it is asked to send.
///
/// Failures can be queued with [`RecordingBackend::fail_next`]; each send
/// consumes one queued failure before succeeding again.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    sent: Mutex<Vec<EmailMessage>>,
    failures: Mutex<VecDeque<EmailError>>,
    attempts: Mutex<usize>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next send fail with `error`.
    pub fn fail_next(&self, error: EmailError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(error);
    }

    /// Messages delivered so far.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Total number of send attempts, successful or not.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EmailBackend for RecordingBackend {
    async fn send(&self, message: &EmailMessage) -> Result<EmailResult, EmailError> {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        let failure = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(err) = failure {
            return Err(err);
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(EmailResult {
            message_id: None,
            status: "recorded".to_owned(),
        })
    }

    async fn health_check(&self) -> Result<(), EmailError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}
