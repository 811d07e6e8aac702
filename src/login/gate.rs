//! Login gate
//!
//! Turns an admission decision into the response the game protocol sends
//! back to a logging-in client.

use crate::admission::policy::retry_interval;
use crate::admission::queue::{AdmissionDecision, AdmissionQueue};
use crate::types::{ClientDescriptor, ClientId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Answer to a login request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginResponse {
    /// The session may enter the game
    Admitted,
    /// The client must wait and retry
    WaitingList {
        slot: usize,
        retry_after: Duration,
        message: String,
    },
}

impl LoginResponse {
    pub fn is_admitted(&self) -> bool {
        matches!(self, LoginResponse::Admitted)
    }

    /// Retry delay as the single byte carried by the waiting list packet
    pub fn retry_after_seconds(&self) -> Option<u8> {
        match self {
            LoginResponse::Admitted => None,
            LoginResponse::WaitingList { retry_after, .. } => {
                Some(u8::try_from(retry_after.as_secs()).unwrap_or(u8::MAX))
            }
        }
    }
}

/// Text shown to a client placed on the waiting list
pub fn waiting_list_message(slot: usize) -> String {
    format!(
        "Too many players online.\nYou are at place {} on the waiting list.",
        slot
    )
}

/// Entry point for connection handlers
#[derive(Debug, Clone)]
pub struct LoginGate {
    queue: Arc<AdmissionQueue>,
}

impl LoginGate {
    pub fn new(queue: Arc<AdmissionQueue>) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &Arc<AdmissionQueue> {
        &self.queue
    }

    /// Handle a login request or a retry from a waiting client
    pub fn handle_login<C: ClientDescriptor + ?Sized>(&self, client: &C) -> LoginResponse {
        match self.queue.evaluate(client) {
            AdmissionDecision::Admitted(reason) => {
                debug!(
                    "Client {} admitted ({})",
                    client.client_id(),
                    reason.as_str()
                );
                LoginResponse::Admitted
            }
            AdmissionDecision::Queued {
                slot, newly_queued, ..
            } => {
                if newly_queued {
                    info!(
                        "Client {} placed on the waiting list at place {}",
                        client.client_id(),
                        slot
                    );
                }

                LoginResponse::WaitingList {
                    slot,
                    retry_after: retry_interval(slot),
                    message: waiting_list_message(slot),
                }
            }
        }
    }

    /// Forget a waiting client whose connection dropped
    pub fn disconnect(&self, client_id: ClientId) -> bool {
        let removed = self.queue.cancel(client_id);
        if removed {
            info!("Client {} left the waiting list", client_id);
        }
        removed
    }

    /// Current place of a client on the waiting list (0 if not waiting)
    pub fn waiting_position<C: ClientDescriptor + ?Sized>(&self, client: &C) -> usize {
        self.queue.queue_position(client)
    }
}
