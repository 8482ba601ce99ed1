//! Shared application state for all routes. Everything is built before the server binds.

use crate::config::Schema;
use crate::routes::EntryPoint;
use crate::store::Database;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub schema: Arc<Schema>,
    pub db: Database,
    pub entry: Arc<EntryPoint>,
}

impl AppState {
    pub fn new(schema: Schema, db: Database, entry: EntryPoint) -> Self {
        AppState {
            schema: Arc::new(schema),
            db,
            entry: Arc::new(entry),
        }
    }
}
