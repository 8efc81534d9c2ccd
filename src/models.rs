use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::shipping::ShippingAddress;

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub role: String,
}

/// Plush size; the base price lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Size {
    Small,
    Medium,
    Large,
}

impl Size {
    pub fn as_str(&self) -> &'static str {
        match self {
            Size::Small => "small",
            Size::Medium => "medium",
            Size::Large => "large",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "small" => Some(Size::Small),
            "medium" => Some(Size::Medium),
            "large" => Some(Size::Large),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Oxxo,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Oxxo => "oxxo",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "card" => Some(PaymentMethod::Card),
            "oxxo" => Some(PaymentMethod::Oxxo),
            _ => None,
        }
    }

    /// Voucher methods are settled out of band (cash at a retail counter),
    /// so their orders start at `VoucherGenerated` instead of `PendingPayment`.
    pub fn is_voucher_based(&self) -> bool {
        matches!(self, PaymentMethod::Oxxo)
    }

    pub fn initial_status(&self) -> OrderStatus {
        if self.is_voucher_based() {
            OrderStatus::VoucherGenerated
        } else {
            OrderStatus::PendingPayment
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    VoucherGenerated,
    Paid,
    InProcess,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::VoucherGenerated => "voucher_generated",
            OrderStatus::Paid => "paid",
            OrderStatus::InProcess => "in_process",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_payment" => Some(OrderStatus::PendingPayment),
            "voucher_generated" => Some(OrderStatus::VoucherGenerated),
            "paid" => Some(OrderStatus::Paid),
            "in_process" => Some(OrderStatus::InProcess),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Legal transitions. `Cancelled` is reachable from any non-terminal
    /// state; the rest follow the fulfillment chain one step at a time.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == OrderStatus::Cancelled {
            return true;
        }
        matches!(
            (self, next),
            (OrderStatus::PendingPayment, OrderStatus::Paid)
                | (OrderStatus::VoucherGenerated, OrderStatus::Paid)
                | (OrderStatus::Paid, OrderStatus::InProcess)
                | (OrderStatus::InProcess, OrderStatus::Shipped)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
        )
    }
}

/// Who an order belongs to: an authenticated account or a guest identified
/// only by email. Distinct from "not authenticated", which owns nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    User(Uuid),
    Guest(String),
}

impl Owner {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Owner::User(id) => Some(*id),
            Owner::Guest(_) => None,
        }
    }

    pub fn guest_email(&self) -> Option<&str> {
        match self {
            Owner::User(_) => None,
            Owner::Guest(email) => Some(email.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_url: String,
    pub label: Option<String>,
    pub size: Size,
    pub quantity: i32,
    pub rush: bool,
    pub embroidery_text: Option<String>,
    pub accessory_count: i32,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub guest_email: Option<String>,
    pub email: String,
    pub total: i64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_intent_id: Option<String>,
    pub payment_status: Option<String>,
    pub shipping: ShippingAddress,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Frozen line-item snapshot embedded in an order at checkout. Prices are
/// captured here and never re-derived from the live cart.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub image_url: String,
    pub label: Option<String>,
    pub size: Size,
    pub quantity: i32,
    pub rush: bool,
    pub embroidery_text: Option<String>,
    pub accessory_count: i32,
    pub unit_price: i64,
    pub line_total: i64,
    pub created_at: DateTime<Utc>,
}

/// One entry of an order's append-only status timeline.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderEvent {
    pub id: Uuid,
    pub order_id: Uuid,
    pub seq: i64,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voucher_methods_start_at_voucher_generated() {
        assert_eq!(
            PaymentMethod::Oxxo.initial_status(),
            OrderStatus::VoucherGenerated
        );
        assert_eq!(
            PaymentMethod::Card.initial_status(),
            OrderStatus::PendingPayment
        );
    }

    #[test]
    fn fulfillment_chain_is_linear() {
        use OrderStatus::*;
        assert!(PendingPayment.can_transition_to(Paid));
        assert!(VoucherGenerated.can_transition_to(Paid));
        assert!(Paid.can_transition_to(InProcess));
        assert!(InProcess.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));

        assert!(!PendingPayment.can_transition_to(Shipped));
        assert!(!Paid.can_transition_to(Delivered));
        assert!(!Shipped.can_transition_to(Paid));
    }

    #[test]
    fn cancelled_reachable_from_any_non_terminal_state() {
        use OrderStatus::*;
        for status in [PendingPayment, VoucherGenerated, Paid, InProcess, Shipped] {
            assert!(status.can_transition_to(Cancelled), "{status:?}");
        }
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn terminal_states_admit_no_transition() {
        use OrderStatus::*;
        for next in [
            PendingPayment,
            VoucherGenerated,
            Paid,
            InProcess,
            Shipped,
            Delivered,
            Cancelled,
        ] {
            assert!(!Delivered.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn status_round_trips_through_text() {
        use OrderStatus::*;
        for status in [
            PendingPayment,
            VoucherGenerated,
            Paid,
            InProcess,
            Shipped,
            Delivered,
            Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("unknown"), None);
    }
}
