use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use moldtrack_core::UniqueCode;

use crate::projections::StockLevelReadModel;
use crate::read_model::ReadStore;

use super::ServiceError;

const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

/// Lookup surface for resolving a canonical code to a stock item.
pub trait CodeDirectory: Send + Sync {
    fn find(&self, code: &UniqueCode) -> Option<StockLevelReadModel>;
}

impl<S> CodeDirectory for crate::projections::StockLevelsProjection<S>
where
    S: ReadStore<moldtrack_stock::StockItemId, StockLevelReadModel>,
{
    fn find(&self, code: &UniqueCode) -> Option<StockLevelReadModel> {
        self.get_by_code(code.as_str())
    }
}

/// Resolves scanned or typed codes to stock items.
///
/// Resolution distinguishes three outcomes that callers must not conflate:
/// a malformed code ([`ServiceError::Validation`], no lookup performed), a
/// well-formed code with no matching item ([`ServiceError::NotFound`]), and
/// a lookup that missed its deadline ([`ServiceError::Timeout`], the item
/// may or may not exist).
pub struct IdentityResolver<D> {
    directory: Arc<D>,
    deadline: Duration,
}

impl<D> IdentityResolver<D>
where
    D: CodeDirectory + 'static,
{
    pub fn new(directory: Arc<D>) -> Self {
        Self {
            directory,
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    #[instrument(skip(self), err)]
    pub async fn resolve(&self, raw: &str) -> Result<StockLevelReadModel, ServiceError> {
        let code = UniqueCode::parse(raw)?;

        let directory = Arc::clone(&self.directory);
        let lookup = tokio::task::spawn_blocking(move || directory.find(&code));

        match tokio::time::timeout(self.deadline, lookup).await {
            Ok(Ok(Some(item))) => Ok(item),
            Ok(Ok(None)) => Err(ServiceError::NotFound),
            Ok(Err(join)) => Err(ServiceError::Persistence(join.to_string())),
            Err(_) => Err(ServiceError::Timeout(self.deadline)),
        }
    }
}
