use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Order, OrderEvent, OrderLine, OrderStatus, PaymentMethod, Size};
use crate::shipping::ShippingInput;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub payment_method: PaymentMethod,
    /// Client-computed total, cross-checked against the server-side sum.
    pub total: i64,
    pub shipping: ShippingInput,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GuestItemInput {
    pub image_url: String,
    pub label: Option<String>,
    pub size: Size,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub rush: bool,
    pub embroidery_text: Option<String>,
    #[serde(default)]
    pub accessory_count: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GuestCheckoutRequest {
    pub email: String,
    pub items: Vec<GuestItemInput>,
    pub payment_method: PaymentMethod,
    pub total: i64,
    pub shipping: ShippingInput,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddEventRequest {
    pub status: OrderStatus,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderHistory {
    pub events: Vec<OrderEvent>,
}
