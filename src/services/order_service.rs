use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseTransaction, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{
        CheckoutRequest, GuestCheckoutRequest, OrderHistory, OrderList, OrderWithItems,
    },
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        order_events::{
            ActiveModel as OrderEventActive, Column as OrderEventCol, Entity as OrderEvents,
            Model as OrderEventModel,
        },
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderEvent, OrderLine, OrderStatus, Owner, PaymentMethod, Size},
    pricing,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    shipping::{self, ShippingAddress},
    state::AppState,
};

/// Unpriced line item heading into an order; prices are derived server-side.
#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub image_url: String,
    pub label: Option<String>,
    pub size: Size,
    pub quantity: i32,
    pub rush: bool,
    pub embroidery_text: Option<String>,
    pub accessory_count: i32,
}

/// Checkout for an authenticated user: freezes the cart into a pending
/// order and clears the cart, all in one transaction.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let address = validated_shipping(&payload.shipping)?;

    let txn = state.orm.begin().await?;

    let cart_rows = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .order_by_asc(CartCol::Position)
        .lock(LockType::Update)
        .all(&txn)
        .await?;

    if cart_rows.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let items: Vec<NewLineItem> = cart_rows
        .iter()
        .map(|row| {
            let size = Size::parse(&row.size).ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("unknown size {:?} in cart", row.size))
            })?;
            Ok(NewLineItem {
                image_url: row.image_url.clone(),
                label: row.label.clone(),
                size,
                quantity: row.quantity,
                rush: row.rush,
                embroidery_text: row.embroidery_text.clone(),
                accessory_count: row.accessory_count,
            })
        })
        .collect::<AppResult<_>>()?;

    let (order, lines, event) = insert_order(
        &txn,
        Owner::User(user.user_id),
        items,
        payload.total,
        payload.payment_method,
        address,
        payload.notes,
    )
    .await?;

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    finish_order_creation(state, Some(user.user_id), payload.total, &order, &event).await;

    Ok(ApiResponse::success(
        "Order created",
        order_with_items(order, lines)?,
        Some(Meta::empty()),
    ))
}

/// Checkout for a guest identified only by email; items come inline since
/// guests have no persistent cart.
pub async fn guest_checkout(
    state: &AppState,
    payload: GuestCheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let guest_email = payload.email.trim().to_lowercase();
    if !shipping::is_email(&guest_email) {
        return Err(AppError::BadRequest("A valid guest email is required".into()));
    }
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("No items submitted".into()));
    }
    if payload.items.len() > super::cart_service::MAX_CART_ITEMS {
        return Err(AppError::BadRequest(format!(
            "At most {} items per order",
            super::cart_service::MAX_CART_ITEMS
        )));
    }

    let address = validated_shipping(&payload.shipping)?;

    let items: Vec<NewLineItem> = payload
        .items
        .into_iter()
        .map(|item| NewLineItem {
            image_url: item.image_url,
            label: item.label,
            size: item.size,
            quantity: item.quantity,
            rush: item.rush,
            embroidery_text: item.embroidery_text,
            accessory_count: item.accessory_count,
        })
        .collect();

    let txn = state.orm.begin().await?;
    let (order, lines, event) = insert_order(
        &txn,
        Owner::Guest(guest_email),
        items,
        payload.total,
        payload.payment_method,
        address,
        payload.notes,
    )
    .await?;
    txn.commit().await?;

    finish_order_creation(state, None, payload.total, &order, &event).await;

    Ok(ApiResponse::success(
        "Order created",
        order_with_items(order, lines)?,
        Some(Meta::empty()),
    ))
}

/// Persist a pending order, its frozen line items and the first timeline
/// event inside the caller's transaction. The total is recomputed here; a
/// client that disagrees is flagged and overruled, never trusted. Orders are
/// never created as `Paid`; confirmation always arrives through the
/// payment bridge.
async fn insert_order(
    txn: &DatabaseTransaction,
    owner: Owner,
    items: Vec<NewLineItem>,
    client_total: i64,
    method: PaymentMethod,
    address: ShippingAddress,
    notes: Option<String>,
) -> AppResult<(OrderModel, Vec<OrderItemModel>, OrderEventModel)> {
    let prices: Vec<pricing::LinePrice> = items
        .iter()
        .map(|item| {
            pricing::price_line_item(
                item.size,
                item.quantity,
                item.rush,
                item.embroidery_text.as_deref(),
                item.accessory_count,
            )
        })
        .collect();
    let total = pricing::order_total(&prices);

    if client_total != total {
        tracing::warn!(
            submitted = client_total,
            computed = total,
            "order total mismatch; using server-side total"
        );
    }

    let status = method.initial_status();
    let order_id = Uuid::new_v4();

    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(owner.user_id()),
        guest_email: Set(owner.guest_email().map(str::to_string)),
        email: Set(address.email.clone()),
        total: Set(total),
        status: Set(status.as_str().to_string()),
        payment_method: Set(method.as_str().to_string()),
        payment_intent_id: Set(None),
        payment_status: Set(None),
        shipping: Set(serde_json::to_value(&address).map_err(anyhow::Error::from)?),
        notes: Set(notes),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(txn)
    .await?;

    let mut lines = Vec::with_capacity(items.len());
    for (item, price) in items.into_iter().zip(prices) {
        let line = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            image_url: Set(item.image_url),
            label: Set(item.label),
            size: Set(item.size.as_str().to_string()),
            quantity: Set(item.quantity.max(1)),
            rush: Set(item.rush),
            embroidery_text: Set(item.embroidery_text),
            accessory_count: Set(item.accessory_count.max(0)),
            unit_price: Set(price.unit_price),
            line_total: Set(price.line_total),
            created_at: NotSet,
        }
        .insert(txn)
        .await?;
        lines.push(line);
    }

    let event = OrderEventActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        seq: NotSet,
        status: Set(status.as_str().to_string()),
        note: Set(Some(initial_event_note(status).to_string())),
        at: NotSet,
    }
    .insert(txn)
    .await?;

    Ok((order, lines, event))
}

fn initial_event_note(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::VoucherGenerated => "Voucher generated, awaiting payment",
        _ => "Order received, awaiting payment",
    }
}

async fn finish_order_creation(
    state: &AppState,
    user_id: Option<Uuid>,
    client_total: i64,
    order: &OrderModel,
    event: &OrderEventModel,
) {
    // The discrepancy is a tampering/bug signal worth a durable flag, not
    // just a log line.
    if client_total != order.total {
        if let Err(err) = log_audit(
            &state.pool,
            user_id,
            "total_mismatch",
            Some("orders"),
            Some(serde_json::json!({
                "order_id": order.id,
                "submitted": client_total,
                "computed": order.total,
            })),
        )
        .await
        {
            tracing::warn!(error = %err, "audit log failed");
        }
    }

    if let Err(err) = log_audit(
        &state.pool,
        user_id,
        "order_created",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    match (order_from_entity(order.clone()), event_from_entity(event.clone())) {
        (Ok(order), Ok(event)) => {
            state.notifier.publish_order(&order);
            state.notifier.publish_event(&event);
        }
        _ => tracing::warn!(order_id = %order.id, "skipping notify for undecodable order"),
    }
}

/// Append a timeline event and move the order's current status in one
/// transaction, so readers never see history and status disagree. This is
/// the only sanctioned way to change an order's status. Re-appending the
/// current status is an idempotent no-op (returns no new event), which is
/// what makes duplicate payment confirmations harmless.
pub async fn add_order_event(
    state: &AppState,
    order_id: Uuid,
    status: OrderStatus,
    note: Option<String>,
) -> AppResult<(Order, Option<OrderEvent>)> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let current = parse_status(&order.status)?;

    if current == status {
        tracing::debug!(%order_id, status = status.as_str(), "duplicate status event ignored");
        txn.commit().await?;
        return Ok((order_from_entity(order)?, None));
    }

    if !current.can_transition_to(status) {
        return Err(AppError::BadRequest(format!(
            "Cannot transition from {} to {}",
            current.as_str(),
            status.as_str()
        )));
    }

    let event = OrderEventActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        seq: NotSet,
        status: Set(status.as_str().to_string()),
        note: Set(note),
        at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut active: OrderActive = order.into();
    active.status = Set(status.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        order.user_id,
        "order_event",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let order = order_from_entity(order)?;
    let event = event_from_entity(event)?;
    state.notifier.publish_order(&order);
    state.notifier.publish_event(&event);

    Ok((order, Some(event)))
}

/// Fetch an order visible to the caller: its owning user, an admin, or a
/// guest presenting the order's email.
pub async fn get_order(
    state: &AppState,
    user: Option<&AuthUser>,
    guest_email: Option<&str>,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = find_visible_order(state, user, guest_email, id).await?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "OK",
        order_with_items(order, items)?,
        Some(Meta::empty()),
    ))
}

/// Event timeline, ascending by server timestamp (append sequence breaks
/// exact ties).
pub async fn get_order_history(
    state: &AppState,
    user: Option<&AuthUser>,
    guest_email: Option<&str>,
    id: Uuid,
) -> AppResult<ApiResponse<OrderHistory>> {
    let order = find_visible_order(state, user, guest_email, id).await?;

    let events = OrderEvents::find()
        .filter(OrderEventCol::OrderId.eq(order.id))
        .order_by_asc(OrderEventCol::At)
        .order_by_asc(OrderEventCol::Seq)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(event_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        "OK",
        OrderHistory { events },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
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
        .map(order_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Most recently created order for an owner; the fallback landing view when
/// no explicit order id is supplied. Depends on the composite
/// owner + created_at index checked at startup.
pub async fn get_last_order_for_owner(
    state: &AppState,
    owner: &Owner,
) -> AppResult<ApiResponse<Order>> {
    let condition = match owner {
        Owner::User(id) => Condition::all().add(OrderCol::UserId.eq(*id)),
        Owner::Guest(email) => Condition::all().add(OrderCol::GuestEmail.eq(email.clone())),
    };

    let order = Orders::find()
        .filter(condition)
        .order_by_desc(OrderCol::CreatedAt)
        .limit(1)
        .one(&state.orm)
        .await?;

    let order = match order {
        Some(o) => order_from_entity(o)?,
        None => return Err(AppError::NotFound),
    };

    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}

async fn find_visible_order(
    state: &AppState,
    user: Option<&AuthUser>,
    guest_email: Option<&str>,
    id: Uuid,
) -> AppResult<OrderModel> {
    let order = Orders::find_by_id(id).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let visible = match user {
        Some(u) if u.is_admin() => true,
        Some(u) => order.user_id == Some(u.user_id),
        None => {
            let presented = guest_email.map(|e| e.trim().to_lowercase());
            presented.is_some() && order.guest_email == presented
        }
    };

    // Unowned orders are indistinguishable from missing ones.
    if !visible {
        return Err(AppError::NotFound);
    }

    Ok(order)
}

fn validated_shipping(raw: &shipping::ShippingInput) -> AppResult<ShippingAddress> {
    let result = shipping::validate(raw);
    if !result.ok {
        return Err(AppError::Validation(result.errors));
    }
    Ok(result.data)
}

fn parse_status(s: &str) -> AppResult<OrderStatus> {
    OrderStatus::parse(s)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown order status {s:?}")))
}

fn order_with_items(
    order: OrderModel,
    items: Vec<OrderItemModel>,
) -> AppResult<OrderWithItems> {
    Ok(OrderWithItems {
        order: order_from_entity(order)?,
        items: items
            .into_iter()
            .map(line_from_entity)
            .collect::<AppResult<Vec<_>>>()?,
    })
}

/// Stored records are coerced into typed models on read; unknown variants
/// mean the row was written by something other than this service.
pub fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let status = parse_status(&model.status)?;
    let payment_method = PaymentMethod::parse(&model.payment_method).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "unknown payment method {:?}",
            model.payment_method
        ))
    })?;
    let shipping: ShippingAddress =
        serde_json::from_value(model.shipping).map_err(anyhow::Error::from)?;

    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        guest_email: model.guest_email,
        email: model.email,
        total: model.total,
        status,
        payment_method,
        payment_intent_id: model.payment_intent_id,
        payment_status: model.payment_status,
        shipping,
        notes: model.notes,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn line_from_entity(model: OrderItemModel) -> AppResult<OrderLine> {
    let size = Size::parse(&model.size).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("unknown size {:?} in order", model.size))
    })?;
    Ok(OrderLine {
        id: model.id,
        order_id: model.order_id,
        image_url: model.image_url,
        label: model.label,
        size,
        quantity: model.quantity,
        rush: model.rush,
        embroidery_text: model.embroidery_text,
        accessory_count: model.accessory_count,
        unit_price: model.unit_price,
        line_total: model.line_total,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

pub fn event_from_entity(model: OrderEventModel) -> AppResult<OrderEvent> {
    Ok(OrderEvent {
        id: model.id,
        order_id: model.order_id,
        seq: model.seq,
        status: parse_status(&model.status)?,
        note: model.note,
        at: model.at.with_timezone(&Utc),
    })
}
