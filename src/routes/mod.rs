use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod cart;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod payments;
pub mod shipping;
pub mod uploads;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/cart", cart::router())
        .nest("/shipping", shipping::router())
        .nest("/orders", orders::router())
        .nest("/payments", payments::router())
        .nest("/uploads", uploads::router())
        .nest("/admin", admin::router())
}
