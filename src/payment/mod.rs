//! Payment processor boundary. The core only depends on this contract; the
//! real gateway lives behind it, and the simulated implementation stands in
//! for local runs and tests.

pub mod simulated;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::PaymentMethod;

#[derive(Debug, Clone)]
pub struct CreateIntent {
    pub order_id: Uuid,
    /// Minor currency units (cents).
    pub amount: i64,
    pub email: String,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresConfirmation,
    RequiresAction,
    Processing,
    Succeeded,
    Failed,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::RequiresConfirmation => "requires_confirmation",
            IntentStatus::RequiresAction => "requires_action",
            IntentStatus::Processing => "processing",
            IntentStatus::Succeeded => "succeeded",
            IntentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requires_confirmation" => Some(IntentStatus::RequiresConfirmation),
            "requires_action" => Some(IntentStatus::RequiresAction),
            "processing" => Some(IntentStatus::Processing),
            "succeeded" => Some(IntentStatus::Succeeded),
            "failed" => Some(IntentStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub intent_id: String,
    pub client_secret: String,
    pub status: IntentStatus,
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("declined: {0}")]
    Declined(String),

    #[error("unknown intent")]
    UnknownIntent,

    #[error("processor unreachable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_intent(&self, req: CreateIntent) -> Result<PaymentIntent, ProcessorError>;

    /// Client-side confirmation. Card networks may demand an extra
    /// authentication step, reported as `RequiresAction`.
    async fn confirm_intent(&self, client_secret: &str) -> Result<PaymentIntent, ProcessorError>;
}
