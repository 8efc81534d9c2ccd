use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use sea_orm::{ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use uuid::Uuid;

use crate::{
    dto::orders::{AddEventRequest, OrderList, OrderWithItems},
    entity::orders::{Column as OrderCol, Entity as Orders},
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    models::Order,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_all_orders))
        .route("/orders/{id}", get(get_order_admin))
        .route("/orders/{id}/events", post(add_order_event))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "asc or desc by creation time")
    ),
    responses(
        (status = 200, description = "All orders", body = ApiResponse<OrderList>),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    ensure_admin(&user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let mut finder = Orders::find().filter(condition);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_service::order_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(Json(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    )))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<OrderWithItems>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_order_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    ensure_admin(&user)?;
    let resp = order_service::get_order(&state, Some(&user), None, id).await?;
    Ok(Json(resp))
}

/// Advance an order through its fulfillment chain (or cancel it). Payment
/// confirmation is NOT accepted here; `Paid` arrives only through the
/// payment bridge.
#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/events",
    request_body = AddEventRequest,
    responses(
        (status = 200, description = "Status advanced", body = ApiResponse<Order>),
        (status = 400, description = "Illegal transition"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn add_order_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddEventRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    ensure_admin(&user)?;

    if payload.status == crate::models::OrderStatus::Paid {
        return Err(crate::error::AppError::BadRequest(
            "Paid is set by the payment bridge, not manually".into(),
        ));
    }

    let (order, _) = order_service::add_order_event(&state, id, payload.status, payload.note).await?;
    Ok(Json(ApiResponse::success(
        "Status updated",
        order,
        Some(Meta::empty()),
    )))
}
