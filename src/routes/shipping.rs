use axum::{Json, Router, routing::post};

use crate::{
    response::{ApiResponse, Meta},
    shipping::{self, ShippingInput, Validated},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/validate", post(validate))
}

/// Pre-submit address check. Always 200; the verdict is in `ok`/`errors`.
/// Checkout re-runs the same validation server-side.
#[utoipa::path(
    post,
    path = "/api/shipping/validate",
    request_body = ShippingInput,
    responses(
        (status = 200, description = "Normalized address with field-level errors", body = ApiResponse<Validated>)
    ),
    tag = "Shipping"
)]
pub async fn validate(Json(payload): Json<ShippingInput>) -> Json<ApiResponse<Validated>> {
    let result = shipping::validate(&payload);
    let message = if result.ok { "Valid" } else { "Invalid" };
    Json(ApiResponse::success(message, result, Some(Meta::empty())))
}
