//! API request and response types

use crate::state_machine::{ConversationState, Phase, StepId};
use serde::{Deserialize, Serialize};

/// Response for a newly created conversation
#[derive(Debug, Serialize)]
pub struct CreateConversationResponse {
    pub id: String,
}

/// Request to send a message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

/// Result of one turn
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub response: String,
    pub phase: Phase,
    pub image_saved: bool,
    pub steps: Vec<StepId>,
}

/// Stored conversation
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: String,
    pub state: ConversationState,
}

/// Generic success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
