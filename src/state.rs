use std::path::PathBuf;
use std::sync::Arc;

use crate::db::{DbPool, OrmConn};
use crate::notify::OrderNotifier;
use crate::payment::PaymentProcessor;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub notifier: Arc<OrderNotifier>,
    pub processor: Arc<dyn PaymentProcessor>,
    pub upload_dir: PathBuf,
}
