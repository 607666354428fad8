use crate::db::DbPool;

/// Shared per-process state handed to every handler. Built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
}

impl AppState {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }
}
