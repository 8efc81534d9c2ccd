use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddItemsOutcome, AddItemsRequest, CartList, MoveItemRequest, PricedCartItem, UpdateItemRequest},
        orders::{
            AddEventRequest, CheckoutRequest, GuestCheckoutRequest, GuestItemInput, OrderHistory,
            OrderList, OrderWithItems,
        },
        payments::{
            ConfirmPaymentRequest, ConfirmPaymentResponse, CreateIntentRequest, IntentResponse,
            WebhookPayload,
        },
    },
    models::{CartItem, Order, OrderEvent, OrderLine, OrderStatus, PaymentMethod, Size, User},
    payment::IntentStatus,
    response::{ApiResponse, Meta},
    routes::{admin, auth, cart, health, orders, params, payments, shipping as shipping_routes, uploads},
    shipping::{ShippingAddress, ShippingInput, Validated},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        cart::cart_list,
        cart::add_items,
        cart::update_item,
        cart::remove_item,
        cart::move_item,
        shipping_routes::validate,
        orders::list_orders,
        orders::checkout,
        orders::guest_checkout,
        orders::latest_order,
        orders::get_order,
        orders::get_order_history,
        payments::create_intent,
        payments::confirm_payment,
        payments::webhook,
        uploads::upload,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::add_order_event
    ),
    components(
        schemas(
            User,
            Size,
            PaymentMethod,
            OrderStatus,
            IntentStatus,
            CartItem,
            Order,
            OrderLine,
            OrderEvent,
            ShippingInput,
            ShippingAddress,
            Validated,
            AddItemsRequest,
            AddItemsOutcome,
            UpdateItemRequest,
            MoveItemRequest,
            PricedCartItem,
            CartList,
            CheckoutRequest,
            GuestCheckoutRequest,
            GuestItemInput,
            AddEventRequest,
            OrderWithItems,
            OrderList,
            OrderHistory,
            CreateIntentRequest,
            IntentResponse,
            ConfirmPaymentRequest,
            ConfirmPaymentResponse,
            WebhookPayload,
            uploads::UploadData,
            orders::GuestAccessQuery,
            params::Pagination,
            params::OrderListQuery,
            Meta,
            ApiResponse<Order>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<CartList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Cart", description = "Cart and line item endpoints"),
        (name = "Shipping", description = "Address validation"),
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Payments", description = "Payment intent and confirmation endpoints"),
        (name = "Uploads", description = "Drawing upload endpoint"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
