use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::payments::{
        ConfirmPaymentRequest, ConfirmPaymentResponse, CreateIntentRequest, IntentResponse,
        WebhookPayload,
    },
    error::AppResult,
    middleware::auth::MaybeAuthUser,
    models::Order,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/intent", post(create_intent))
        .route("/confirm", post(confirm_payment))
        .route("/webhook", post(webhook))
}

#[utoipa::path(
    post,
    path = "/api/payments/intent",
    request_body = CreateIntentRequest,
    responses(
        (status = 200, description = "Intent for the order's total in minor units", body = ApiResponse<IntentResponse>),
        (status = 400, description = "Order is not awaiting payment"),
        (status = 409, description = "Stored total disagrees with line items")
    ),
    tag = "Payments"
)]
pub async fn create_intent(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    Json(payload): Json<CreateIntentRequest>,
) -> AppResult<Json<ApiResponse<IntentResponse>>> {
    let resp = payment_service::create_intent(&state, user.as_ref(), payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/payments/confirm",
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Confirmation outcome; Paid only on success", body = ApiResponse<ConfirmPaymentResponse>),
        (status = 402, description = "Declined or requires additional authentication")
    ),
    tag = "Payments"
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> AppResult<Json<ApiResponse<ConfirmPaymentResponse>>> {
    let resp = payment_service::confirm_payment(&state, user.as_ref(), payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    request_body = WebhookPayload,
    responses(
        (status = 200, description = "Processor status reconciled; duplicate deliveries are no-ops", body = ApiResponse<Order>)
    ),
    tag = "Payments"
)]
pub async fn webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = payment_service::handle_webhook(&state, payload).await?;
    Ok(Json(resp))
}
