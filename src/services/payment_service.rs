use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::payments::{
        ConfirmPaymentRequest, ConfirmPaymentResponse, CreateIntentRequest, IntentResponse,
        WebhookPayload,
    },
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderStatus},
    payment::{CreateIntent, IntentStatus, ProcessorError},
    pricing,
    response::{ApiResponse, Meta},
    services::order_service::{self, add_order_event},
    state::AppState,
};

/// Ask the processor for a payment intent over the order's total and record
/// the intent reference on the order. The order's lifecycle status is not
/// touched here; only `add_order_event` moves it.
pub async fn create_intent(
    state: &AppState,
    user: Option<&AuthUser>,
    payload: CreateIntentRequest,
) -> AppResult<ApiResponse<IntentResponse>> {
    let order = find_payable_order(state, user, payload.guest_email.as_deref(), payload.order_id)
        .await?;

    // The stored total must still agree with the frozen line items before
    // any money moves; disagreement means tampering or a bug upstream.
    let computed: i64 = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .iter()
        .map(|line| line.line_total)
        .sum();
    if computed != order.total {
        return Err(AppError::TotalMismatch {
            submitted: order.total,
            computed,
        });
    }

    let method = order_service::order_from_entity(order.clone())?.payment_method;
    let amount = pricing::to_minor_units(order.total);

    let intent = state
        .processor
        .create_intent(CreateIntent {
            order_id: order.id,
            amount,
            email: order.email.clone(),
            method,
        })
        .await
        .map_err(processor_error)?;

    record_intent(
        state,
        order,
        Some(intent.intent_id.clone()),
        intent.status,
    )
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        user.map(|u| u.user_id),
        "payment_intent_created",
        Some("orders"),
        Some(serde_json::json!({ "order_id": payload.order_id, "intent_id": intent.intent_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Payment intent created",
        IntentResponse {
            intent_id: intent.intent_id,
            client_secret: intent.client_secret,
            status: intent.status,
            amount,
        },
        Some(Meta::empty()),
    ))
}

/// Confirm an intent with the processor. Only a `Succeeded` result marks
/// the order `Paid`; `Processing` means the confirmation will arrive
/// asynchronously through the webhook, and nothing is asserted locally.
pub async fn confirm_payment(
    state: &AppState,
    user: Option<&AuthUser>,
    payload: ConfirmPaymentRequest,
) -> AppResult<ApiResponse<ConfirmPaymentResponse>> {
    let order = find_payable_order(state, user, payload.guest_email.as_deref(), payload.order_id)
        .await?;

    let intent = state
        .processor
        .confirm_intent(&payload.client_secret)
        .await
        .map_err(processor_error)?;

    if order.payment_intent_id.as_deref() != Some(intent.intent_id.as_str()) {
        return Err(AppError::BadRequest(
            "Payment intent does not belong to this order".into(),
        ));
    }

    let order = match intent.status {
        IntentStatus::Succeeded => {
            let order = record_intent(state, order, None, intent.status).await?;
            let (order, _) = add_order_event(
                state,
                order.id,
                OrderStatus::Paid,
                Some("Payment confirmed".into()),
            )
            .await?;
            order
        }
        IntentStatus::Processing => {
            let order = record_intent(state, order, None, intent.status).await?;
            order_service::order_from_entity(order)?
        }
        IntentStatus::RequiresAction => return Err(AppError::RequiresAction),
        IntentStatus::Failed => {
            record_intent(state, order, None, intent.status).await?;
            return Err(AppError::PaymentDeclined("Payment was not accepted".into()));
        }
        IntentStatus::RequiresConfirmation => {
            return Err(AppError::BadRequest("Intent is not confirmed yet".into()));
        }
    };

    Ok(ApiResponse::success(
        "OK",
        ConfirmPaymentResponse {
            status: intent.status,
            order,
        },
        Some(Meta::empty()),
    ))
}

/// Out-of-band status delivery. Must be idempotent: the same "succeeded"
/// signal delivered twice appends no duplicate `Paid` event, which the
/// repeated-status guard in `add_order_event` guarantees.
pub async fn handle_webhook(
    state: &AppState,
    payload: WebhookPayload,
) -> AppResult<ApiResponse<Order>> {
    let order = Orders::find()
        .filter(OrderCol::PaymentIntentId.eq(payload.intent_id.clone()))
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let current = order_service::order_from_entity(order.clone())?.status;

    let order = match payload.status {
        IntentStatus::Succeeded => {
            let order = record_intent(state, order, None, payload.status).await?;
            if current == OrderStatus::Paid || current.can_transition_to(OrderStatus::Paid) {
                let (order, _) = add_order_event(
                    state,
                    order.id,
                    OrderStatus::Paid,
                    Some("Payment confirmed (webhook)".into()),
                )
                .await?;
                order
            } else {
                // A cancelled or already-fulfilled order cannot regress.
                tracing::warn!(
                    order_id = %order.id,
                    status = current.as_str(),
                    "ignoring succeeded webhook for non-payable order"
                );
                order_service::order_from_entity(order)?
            }
        }
        IntentStatus::Failed => {
            if let Err(err) = log_audit(
                &state.pool,
                None,
                "payment_failed",
                Some("orders"),
                Some(serde_json::json!({ "order_id": order.id, "intent_id": payload.intent_id })),
            )
            .await
            {
                tracing::warn!(error = %err, "audit log failed");
            }
            let order = record_intent(state, order, None, payload.status).await?;
            order_service::order_from_entity(order)?
        }
        _ => {
            let order = record_intent(state, order, None, payload.status).await?;
            order_service::order_from_entity(order)?
        }
    };

    Ok(ApiResponse::success("Webhook processed", order, Some(Meta::empty())))
}

/// Write the intent reference and processor-reported status onto the order
/// without disturbing its lifecycle status.
async fn record_intent(
    state: &AppState,
    order: OrderModel,
    intent_id: Option<String>,
    status: IntentStatus,
) -> AppResult<OrderModel> {
    let mut active: OrderActive = order.into();
    if let Some(intent_id) = intent_id {
        active.payment_intent_id = Set(Some(intent_id));
    }
    active.payment_status = Set(Some(status.as_str().to_string()));
    let order = active.update(&state.orm).await?;
    Ok(order)
}

fn is_awaiting_payment(status: OrderStatus) -> bool {
    matches!(
        status,
        OrderStatus::PendingPayment | OrderStatus::VoucherGenerated
    )
}

async fn find_payable_order(
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
    if !visible {
        return Err(AppError::NotFound);
    }

    let status = order_service::order_from_entity(order.clone())?.status;
    if !is_awaiting_payment(status) {
        return Err(AppError::BadRequest(format!(
            "Order is not awaiting payment (status {})",
            status.as_str()
        )));
    }

    Ok(order)
}

fn processor_error(err: ProcessorError) -> AppError {
    match err {
        ProcessorError::Declined(reason) => AppError::PaymentDeclined(reason),
        ProcessorError::UnknownIntent => AppError::BadRequest("Unknown payment intent".into()),
        ProcessorError::Unavailable(reason) => AppError::Network(reason),
    }
}
