use crate::scheduler::Scheduler;
use bekci_alerter::AlertDispatcher;
use bekci_storage::Store;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub scheduler: Arc<Scheduler>,
    pub alerter: Arc<AlertDispatcher>,
    pub start_time: DateTime<Utc>,
}
