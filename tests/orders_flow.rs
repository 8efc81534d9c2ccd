use std::sync::Arc;

use draw2toy_api::{
    db::{create_orm_conn, create_pool, ensure_indexes, run_migrations},
    dto::{
        cart::{AddItemsRequest, UpdateItemRequest},
        orders::{CheckoutRequest, GuestCheckoutRequest, GuestItemInput},
        payments::{ConfirmPaymentRequest, CreateIntentRequest, WebhookPayload},
    },
    entity::users::ActiveModel as UserActive,
    error::AppError,
    middleware::auth::AuthUser,
    models::{OrderStatus, Owner, PaymentMethod, Size},
    notify::OrderNotifier,
    payment::{IntentStatus, simulated::SimulatedProcessor},
    routes::params::{OrderListQuery, Pagination},
    services::{cart_service, order_service, payment_service},
    shipping::ShippingInput,
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use uuid::Uuid;

// Integration flow: cart -> checkout -> intent -> confirm -> webhook ->
// fulfillment, plus the guest voucher path. One sequential test since it
// owns the database.
#[tokio::test]
async fn checkout_payment_and_fulfillment_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    // The composite index the order queries rely on must exist.
    ensure_indexes(&state.pool).await?;

    let user_id = create_user(&state, "user", "user@example.com").await?;
    let admin_id = create_user(&state, "admin", "admin@example.com").await?;
    let auth_user = AuthUser {
        user_id,
        role: "user".into(),
    };
    let auth_admin = AuthUser {
        user_id: admin_id,
        role: "admin".into(),
    };

    // Two drawings in the cart, each upgraded to the priced scenario:
    // medium 500 + rush 200 + embroidery 120 + accessory 150 = 970 x2 = 1940.
    let added = cart_service::add_items(
        &state.pool,
        &auth_user,
        AddItemsRequest {
            image_urls: vec![
                "/uploads/u/dino.png".into(),
                "/uploads/u/robot.png".into(),
            ],
        },
    )
    .await?;
    let cart = added.data.unwrap().cart;
    assert_eq!(cart.items.len(), 2);
    // New items default to medium, quantity one, no extras.
    assert_eq!(cart.items[0].item.size, Size::Medium);
    assert_eq!(cart.items[0].item.quantity, 1);
    assert_eq!(cart.items[0].unit_price, 500);

    for item in &cart.items {
        cart_service::update_item(
            &state.pool,
            &auth_user,
            item.item.id,
            UpdateItemRequest {
                quantity: Some(2),
                rush: Some(true),
                embroidery_text: Some("Sofi".into()),
                accessory_count: Some(1),
                ..Default::default()
            },
        )
        .await?;
    }

    let cart = cart_service::list_cart(&state.pool, &auth_user).await?.data.unwrap();
    assert_eq!(cart.items[0].unit_price, 970);
    assert_eq!(cart.items[0].line_total, 1940);
    assert_eq!(cart.total, 3880);

    // Checkout with a deliberately wrong client total: the server-side sum
    // wins and the order starts pending, never paid.
    let checkout = order_service::checkout(
        &state,
        &auth_user,
        CheckoutRequest {
            payment_method: PaymentMethod::Card,
            total: 9999,
            shipping: valid_shipping(),
            notes: Some("Please match the drawing colors".into()),
        },
    )
    .await?;
    let order = checkout.data.unwrap();
    assert_eq!(order.order.total, 3880);
    assert_eq!(order.order.status, OrderStatus::PendingPayment);
    assert_eq!(
        order.order.total,
        order.items.iter().map(|i| i.line_total).sum::<i64>()
    );
    let order_id = order.order.id;

    // Checkout clears the cart.
    let cart = cart_service::list_cart(&state.pool, &auth_user).await?.data.unwrap();
    assert!(cart.items.is_empty());

    // Watch the timeline while payment happens.
    let mut history_sub = state.notifier.subscribe_history(order_id);

    // Intent carries the total in minor units; recording it leaves the
    // lifecycle status untouched.
    let intent = payment_service::create_intent(
        &state,
        Some(&auth_user),
        CreateIntentRequest {
            order_id,
            guest_email: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(intent.amount, 388_000);
    assert_eq!(intent.status, IntentStatus::RequiresConfirmation);

    let order = order_service::get_order(&state, Some(&auth_user), None, order_id)
        .await?
        .data
        .unwrap()
        .order;
    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert_eq!(order.payment_intent_id.as_deref(), Some(intent.intent_id.as_str()));

    // Card confirmation succeeds and marks the order paid.
    let confirmed = payment_service::confirm_payment(
        &state,
        Some(&auth_user),
        ConfirmPaymentRequest {
            order_id,
            client_secret: intent.client_secret.clone(),
            guest_email: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(confirmed.status, IntentStatus::Succeeded);
    assert_eq!(confirmed.order.status, OrderStatus::Paid);

    // A duplicate webhook delivery must not append a second paid event.
    let after_webhook = payment_service::handle_webhook(
        &state,
        WebhookPayload {
            intent_id: intent.intent_id.clone(),
            status: IntentStatus::Succeeded,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(after_webhook.status, OrderStatus::Paid);

    let history = order_service::get_order_history(&state, Some(&auth_user), None, order_id)
        .await?
        .data
        .unwrap()
        .events;
    assert_eq!(
        history
            .iter()
            .filter(|e| e.status == OrderStatus::Paid)
            .count(),
        1
    );
    // Timeline reconstructs the current status from its last entry.
    assert_eq!(history.last().unwrap().status, OrderStatus::Paid);
    assert!(history.windows(2).all(|w| w[0].at <= w[1].at));

    // The subscriber saw the paid event.
    let seen = history_sub.recv().await.expect("history event");
    assert_eq!(seen.status, OrderStatus::Paid);
    history_sub.unsubscribe();

    // Admin walks the fulfillment chain; skipping ahead is rejected.
    let err = order_service::add_order_event(&state, order_id, OrderStatus::Delivered, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    for status in [
        OrderStatus::InProcess,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        let (order, event) = order_service::add_order_event(&state, order_id, status, None).await?;
        assert_eq!(order.status, status);
        assert!(event.is_some());
    }

    // Delivered is terminal.
    let err = order_service::add_order_event(&state, order_id, OrderStatus::Cancelled, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let listed = order_service::list_orders(
        &state,
        &auth_user,
        OrderListQuery {
            pagination: Pagination {
                page: None,
                per_page: None,
            },
            status: None,
            sort_order: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(listed.items.len(), 1);
    assert_eq!(listed.items[0].status, OrderStatus::Delivered);

    let last = order_service::get_last_order_for_owner(&state, &Owner::User(user_id))
        .await?
        .data
        .unwrap();
    assert_eq!(last.id, order_id);

    // Cart ceiling: an eleven-image batch is truncated, not rejected.
    let urls: Vec<String> = (0..11).map(|i| format!("/uploads/a/{i}.png")).collect();
    let outcome = cart_service::add_items(
        &state.pool,
        &auth_admin,
        AddItemsRequest { image_urls: urls },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(outcome.accepted, 10);
    assert_eq!(outcome.rejected, 1);
    assert_eq!(outcome.cart.items.len(), 10);

    guest_voucher_flow(&state).await?;
    shipping_rejection(&state, &auth_user).await?;
    total_mismatch_guard(&state, &auth_user).await?;

    Ok(())
}

// Voucher method: order starts at VoucherGenerated, confirmation stays
// Processing, and settlement arrives through the webhook exactly once.
async fn guest_voucher_flow(state: &AppState) -> anyhow::Result<()> {
    let guest_email = "guest@example.com";

    let order = order_service::guest_checkout(
        state,
        GuestCheckoutRequest {
            email: guest_email.into(),
            items: vec![GuestItemInput {
                image_url: "/uploads/g/cat.png".into(),
                label: Some("Cat".into()),
                size: Size::Small,
                quantity: 1,
                rush: false,
                embroidery_text: None,
                accessory_count: 0,
            }],
            payment_method: PaymentMethod::Oxxo,
            total: 300,
            shipping: valid_shipping(),
            notes: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(order.order.status, OrderStatus::VoucherGenerated);
    assert_eq!(order.order.total, 300);
    let order_id = order.order.id;

    let intent = payment_service::create_intent(
        state,
        None,
        CreateIntentRequest {
            order_id,
            guest_email: Some(guest_email.into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(intent.status, IntentStatus::RequiresAction);

    // Confirming a voucher intent does not assert payment locally.
    let confirmed = payment_service::confirm_payment(
        state,
        None,
        ConfirmPaymentRequest {
            order_id,
            client_secret: intent.client_secret.clone(),
            guest_email: Some(guest_email.into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(confirmed.status, IntentStatus::Processing);
    assert_eq!(confirmed.order.status, OrderStatus::VoucherGenerated);

    // The counter payment lands out of band, twice; one paid event results.
    for _ in 0..2 {
        payment_service::handle_webhook(
            state,
            WebhookPayload {
                intent_id: intent.intent_id.clone(),
                status: IntentStatus::Succeeded,
            },
        )
        .await?;
    }

    let history =
        order_service::get_order_history(state, None, Some(guest_email), order_id)
            .await?
            .data
            .unwrap()
            .events;
    assert_eq!(
        history
            .iter()
            .filter(|e| e.status == OrderStatus::Paid)
            .count(),
        1
    );

    let last = order_service::get_last_order_for_owner(
        state,
        &Owner::Guest(guest_email.into()),
    )
    .await?
    .data
    .unwrap();
    assert_eq!(last.id, order_id);
    assert_eq!(last.status, OrderStatus::Paid);

    Ok(())
}

// Malformed shipping never reaches the store; errors come back per field.
async fn shipping_rejection(state: &AppState, user: &AuthUser) -> anyhow::Result<()> {
    cart_service::add_items(
        &state.pool,
        user,
        AddItemsRequest {
            image_urls: vec!["/uploads/u/fox.png".into()],
        },
    )
    .await?;

    let mut shipping = valid_shipping();
    shipping.postal_code = "AB12".into();

    let err = order_service::checkout(
        state,
        user,
        CheckoutRequest {
            payment_method: PaymentMethod::Card,
            total: 500,
            shipping,
            notes: None,
        },
    )
    .await
    .unwrap_err();

    match err {
        AppError::Validation(errors) => {
            assert!(errors.contains_key("postal_code"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    Ok(())
}

// A stored total that no longer matches the frozen line items must block
// intent creation before any money moves.
async fn total_mismatch_guard(state: &AppState, user: &AuthUser) -> anyhow::Result<()> {
    use draw2toy_api::entity::orders::{ActiveModel as OrderActive, Entity as Orders};
    use sea_orm::{ActiveModelTrait, EntityTrait};

    let order = order_service::checkout(
        state,
        user,
        CheckoutRequest {
            payment_method: PaymentMethod::Card,
            total: 500,
            shipping: valid_shipping(),
            notes: None,
        },
    )
    .await?
    .data
    .unwrap()
    .order;

    let stored = Orders::find_by_id(order.id)
        .one(&state.orm)
        .await?
        .expect("order row");
    let mut active: OrderActive = stored.into();
    active.total = Set(9_999);
    active.update(&state.orm).await?;

    let err = payment_service::create_intent(
        state,
        Some(user),
        CreateIntentRequest {
            order_id: order.id,
            guest_email: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::TotalMismatch { .. }));

    Ok(())
}

fn valid_shipping() -> ShippingInput {
    ShippingInput {
        full_name: "Sofía Pérez".into(),
        email: "sofia@example.com".into(),
        phone: "5551234567".into(),
        country: "mx".into(),
        state: "CDMX".into(),
        city: "Ciudad de México".into(),
        neighborhood: "Roma Norte".into(),
        street: "Av. Insurgentes".into(),
        ext_number: "123".into(),
        int_number: "".into(),
        postal_code: "06700".into(),
        references: "Blue door".into(),
    }
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_events, order_items, orders, cart_items, audit_logs, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    let pool = create_pool(database_url).await?;

    Ok(AppState {
        pool,
        orm,
        notifier: Arc::new(OrderNotifier::default()),
        processor: Arc::new(SimulatedProcessor::default()),
        upload_dir: std::env::temp_dir().join("draw2toy-test-uploads"),
    })
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        display_name: Set(None),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}
