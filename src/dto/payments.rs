use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Order;
use crate::payment::IntentStatus;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateIntentRequest {
    pub order_id: Uuid,
    /// Required for guest orders; must match the order's guest email.
    pub guest_email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IntentResponse {
    pub intent_id: String,
    pub client_secret: String,
    pub status: IntentStatus,
    /// Minor currency units, as sent to the processor.
    pub amount: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmPaymentRequest {
    pub order_id: Uuid,
    pub client_secret: String,
    pub guest_email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmPaymentResponse {
    pub status: IntentStatus,
    pub order: Order,
}

/// Out-of-band status delivery from the processor.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookPayload {
    pub intent_id: String,
    pub status: IntentStatus,
}
