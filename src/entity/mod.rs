pub mod audit_logs;
pub mod cart_items;
pub mod order_events;
pub mod order_items;
pub mod orders;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use order_events::Entity as OrderEvents;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use users::Entity as Users;
