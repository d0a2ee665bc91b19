//! Session ledger
//!
//! Append-only record correlating each outbound request with the validated events the
//! agent returned for it. The ledger is a cheap cloneable handle; the client and every
//! stream it opens share the same underlying [`Session`].

use crate::protocol::events::ResponseEvent;
use crate::protocol::session::{Interaction, RequestMessage, ResponseMessage, Session};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LedgerError {
    #[error("No interaction has been started")]
    NoInteraction,
    #[error("Interaction for request {request_id} already received its done event")]
    InteractionComplete { request_id: String },
}

/// Shared handle to one session's history
#[derive(Debug, Clone)]
pub struct SessionLedger {
    session: Arc<Mutex<Session>>,
}

impl SessionLedger {
    /// Fresh session served by `processor_id`
    pub fn new(processor_id: impl Into<String>) -> Self {
        Self::resume(Session::new(processor_id))
    }

    /// Continue a session a caller kept from an earlier run
    pub fn resume(session: Session) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a new interaction and make its query the current request
    ///
    /// Returns the index of the new interaction.
    pub fn begin_interaction(&self, request: RequestMessage) -> usize {
        let mut session = self.lock();
        session.request_id = request.event.id.clone();
        session.interactions.push(Interaction::new(request));

        let index = session.interactions.len() - 1;
        debug!(
            interaction = index,
            request_id = %session.request_id,
            "Interaction started"
        );
        index
    }

    /// Append a validated event to the most recent interaction
    pub fn append_response(&self, event: ResponseEvent) -> Result<(), LedgerError> {
        let mut session = self.lock();
        let interaction = session
            .interactions
            .last_mut()
            .ok_or(LedgerError::NoInteraction)?;

        if interaction.is_complete() {
            return Err(LedgerError::InteractionComplete {
                request_id: interaction.request.event.id.to_string(),
            });
        }

        interaction.responses.push(ResponseMessage { event });
        Ok(())
    }

    /// Read-only copy of the session as it stands now
    pub fn snapshot(&self) -> Session {
        self.lock().clone()
    }

    pub fn last_interaction(&self) -> Option<Interaction> {
        self.lock().interactions.last().cloned()
    }

    pub fn interaction_count(&self) -> usize {
        self.lock().interactions.len()
    }

    pub fn processor_id(&self) -> String {
        self.lock().processor_id.clone()
    }
}
