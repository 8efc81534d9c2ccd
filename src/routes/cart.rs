use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::cart::{
        AddItemsOutcome, AddItemsRequest, CartList, MoveItemRequest, PricedCartItem,
        UpdateItemRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(cart_list).post(add_items))
        .route("/{id}", axum::routing::patch(update_item).delete(remove_item))
        .route("/{id}/move", post(move_item))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Current user's cart, priced", body = ApiResponse<CartList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_list(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = cart_service::list_cart(&state.pool, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddItemsRequest,
    responses(
        (status = 200, description = "Items added; batch may be truncated at the cart ceiling", body = ApiResponse<AddItemsOutcome>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_items(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddItemsRequest>,
) -> AppResult<Json<ApiResponse<AddItemsOutcome>>> {
    let resp = cart_service::add_items(&state.pool, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/cart/{id}",
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Item updated", body = ApiResponse<PricedCartItem>),
        (status = 404, description = "No such item")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateItemRequest>,
) -> AppResult<Json<ApiResponse<PricedCartItem>>> {
    let resp = cart_service::update_item(&state.pool, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/{id}",
    responses(
        (status = 200, description = "Item removed", body = ApiResponse<CartList>),
        (status = 404, description = "No such item")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = cart_service::remove_item(&state.pool, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart/{id}/move",
    request_body = MoveItemRequest,
    responses(
        (status = 200, description = "Item moved; out-of-range moves are no-ops", body = ApiResponse<CartList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn move_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MoveItemRequest>,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = cart_service::move_item(&state.pool, &user, id, payload.direction).await?;
    Ok(Json(resp))
}
