use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::orders::{
        CheckoutRequest, GuestCheckoutRequest, OrderHistory, OrderList, OrderWithItems,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, MaybeAuthUser},
    models::{Order, Owner},
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

/// Guest callers identify themselves with the email the order was placed
/// under.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GuestAccessQuery {
    pub guest_email: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/checkout", post(checkout))
        .route("/guest", post(guest_checkout))
        .route("/latest", get(latest_order))
        .route("/{id}", get(get_order))
        .route("/{id}/history", get(get_order_history))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "asc or desc by creation time")
    ),
    responses(
        (status = 200, description = "Current user's orders", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Pending order created from the cart", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Empty cart"),
        (status = 422, description = "Shipping validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::checkout(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/guest",
    request_body = GuestCheckoutRequest,
    responses(
        (status = 200, description = "Pending guest order created", body = ApiResponse<OrderWithItems>),
        (status = 422, description = "Shipping validation failed")
    ),
    tag = "Orders"
)]
pub async fn guest_checkout(
    State(state): State<AppState>,
    Json(payload): Json<GuestCheckoutRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::guest_checkout(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/latest",
    params(
        ("guest_email" = Option<String>, Query, description = "Guest email when not authenticated")
    ),
    responses(
        (status = 200, description = "Most recent order for the caller", body = ApiResponse<Order>),
        (status = 404, description = "No orders yet")
    ),
    tag = "Orders"
)]
pub async fn latest_order(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    Query(query): Query<GuestAccessQuery>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let owner = resolve_owner(user.as_ref(), query.guest_email.as_deref())?;
    let resp = order_service::get_last_order_for_owner(&state, &owner).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(
        ("guest_email" = Option<String>, Query, description = "Guest email when not authenticated")
    ),
    responses(
        (status = 200, description = "Order with frozen line items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Not found or not yours")
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<GuestAccessQuery>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp =
        order_service::get_order(&state, user.as_ref(), query.guest_email.as_deref(), id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}/history",
    params(
        ("guest_email" = Option<String>, Query, description = "Guest email when not authenticated")
    ),
    responses(
        (status = 200, description = "Status timeline, oldest first", body = ApiResponse<OrderHistory>),
        (status = 404, description = "Not found or not yours")
    ),
    tag = "Orders"
)]
pub async fn get_order_history(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<GuestAccessQuery>,
) -> AppResult<Json<ApiResponse<OrderHistory>>> {
    let resp =
        order_service::get_order_history(&state, user.as_ref(), query.guest_email.as_deref(), id)
            .await?;
    Ok(Json(resp))
}

fn resolve_owner(user: Option<&AuthUser>, guest_email: Option<&str>) -> AppResult<Owner> {
    if let Some(user) = user {
        return Ok(Owner::User(user.user_id));
    }
    match guest_email {
        Some(email) if !email.trim().is_empty() => {
            Ok(Owner::Guest(email.trim().to_lowercase()))
        }
        _ => Err(AppError::BadRequest(
            "Authenticate or supply guest_email".into(),
        )),
    }
}
