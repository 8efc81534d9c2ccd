use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{CartItem, Size};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddItemsRequest {
    /// Uploaded drawing URLs, one new line item each.
    pub image_urls: Vec<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateItemRequest {
    pub label: Option<String>,
    pub size: Option<Size>,
    pub quantity: Option<i32>,
    pub rush: Option<bool>,
    /// Empty string clears the embroidery.
    pub embroidery_text: Option<String>,
    pub accessory_count: Option<i32>,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MoveItemRequest {
    pub direction: MoveDirection,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PricedCartItem {
    #[serde(flatten)]
    pub item: CartItem,
    pub unit_price: i64,
    pub line_total: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartList {
    pub items: Vec<PricedCartItem>,
    pub total: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddItemsOutcome {
    pub cart: CartList,
    pub accepted: usize,
    /// Count dropped to stay under the cart ceiling; a warning, not an error.
    pub rejected: usize,
}
