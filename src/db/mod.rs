pub mod configs;
pub mod logs;
pub mod memory;
pub mod pool;

pub use configs::PgConfigStore;
pub use logs::PgAuditLogStore;
pub use pool::create_pool;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}
