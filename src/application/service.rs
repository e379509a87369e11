use tracing::{info, warn};

use crate::config::DatabaseSettings;
use crate::storage::Repository;

use super::AppError;

/// Application service over the stock, sale and register ledgers.
/// This is the primary interface for any client (CLI, request handlers, etc.).
///
/// Every mutating operation runs in one transaction whose first statement
/// claims the row that gates it, so checks and writes see the same state.
/// Any early return drops the transaction and nothing is written.
pub struct RetailService {
    pub(super) repo: Repository,
}

impl RetailService {
    /// Create a new service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Open (creating if needed) and migrate the database.
    pub async fn init(settings: &DatabaseSettings) -> Result<Self, AppError> {
        let repo = Repository::init(
            &settings.url(true),
            settings.max_connections,
            settings.busy_timeout(),
        )
        .await?;
        info!(path = %settings.path, "Database ready");
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, AppError> {
        let repo = Repository::connect(
            &settings.url(false),
            settings.max_connections,
            settings.busy_timeout(),
        )
        .await?;
        Ok(Self::new(repo))
    }

    pub async fn close(&self) {
        self.repo.close().await;
    }
}

/// Log a rejected operation and hand the error back.
pub(super) fn rejected(err: AppError) -> AppError {
    warn!(kind = ?err.kind(), "{}", err);
    err
}
