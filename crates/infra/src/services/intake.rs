use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::instrument;

use moldtrack_core::UserId;
use moldtrack_events::{EventBus, EventEnvelope};
use moldtrack_stock::{AdjustStock, Direction, StockItemId};

use crate::event_store::EventStore;

use super::ledger::StockLedger;
use super::resolver::{CodeDirectory, IdentityResolver};
use super::ServiceError;

/// Goods-intake flows: manual material intake and scan-driven kit intake.
pub struct IntakeService<S, B, D> {
    ledger: StockLedger<S, B>,
    resolver: IdentityResolver<D>,
}

impl<S, B, D> IntakeService<S, B, D>
where
    S: EventStore + 'static,
    B: EventBus<EventEnvelope<JsonValue>> + 'static,
    D: CodeDirectory + 'static,
{
    pub fn new(ledger: StockLedger<S, B>, resolver: IdentityResolver<D>) -> Self {
        Self { ledger, resolver }
    }

    /// Book received material into stock.
    #[instrument(skip(self), fields(item_id = %item_id, kilograms), err)]
    pub async fn material_intake(
        &self,
        item_id: StockItemId,
        kilograms: i64,
        actor_id: UserId,
        note: Option<String>,
    ) -> Result<(), ServiceError> {
        self.ledger
            .adjust(AdjustStock {
                item_id,
                direction: Direction::In,
                quantity: kilograms,
                actor_id,
                note: note.or_else(|| Some("material intake".to_string())),
                occurred_at: Utc::now(),
            })
            .await
    }

    /// Book one unit of whatever item the scanned code resolves to.
    #[instrument(skip(self, raw_code), err)]
    pub async fn scan_intake(
        &self,
        raw_code: &str,
        actor_id: UserId,
    ) -> Result<StockItemId, ServiceError> {
        let item = self.resolver.resolve(raw_code).await?;

        self.ledger
            .adjust(AdjustStock {
                item_id: item.item_id,
                direction: Direction::In,
                quantity: 1,
                actor_id,
                note: Some("scan intake".to_string()),
                occurred_at: Utc::now(),
            })
            .await?;

        Ok(item.item_id)
    }
}

#[cfg(test)]
mod tests {
    use moldtrack_core::{AggregateId, UniqueCode};
    use moldtrack_events::InMemoryEventBus;
    use moldtrack_stock::{ItemKind, RegisterItem, StockItem, Unit};

    use crate::command_dispatcher::CommandDispatcher;
    use crate::event_store::InMemoryEventStore;
    use crate::projections::StockLevelsProjection;
    use crate::read_model::InMemoryReadStore;

    use super::*;

    type TestDispatcher =
        CommandDispatcher<InMemoryEventStore, InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn dispatcher() -> Arc<TestDispatcher> {
        Arc::new(CommandDispatcher::new(
            InMemoryEventStore::new(),
            InMemoryEventBus::new(),
        ))
    }

    async fn setup(
        dispatcher: &Arc<TestDispatcher>,
        code: &str,
        initial: i64,
    ) -> (
        StockItemId,
        Arc<StockLevelsProjection<InMemoryReadStore<StockItemId, crate::projections::StockLevelReadModel>>>,
    ) {
        let item_id = StockItemId::new(AggregateId::new());
        let ledger = StockLedger::new(Arc::clone(dispatcher));
        ledger
            .register_item(RegisterItem {
                item_id,
                kind: ItemKind::Kit,
                code: Some(UniqueCode::parse(code).unwrap()),
                name: "Kit 01".to_string(),
                unit: Unit::Pieces,
                initial_quantity: initial,
                occurred_at: Utc::now(),
            })
            .await
            .unwrap();

        let projection = Arc::new(StockLevelsProjection::new(InMemoryReadStore::new()));
        let envelopes = dispatcher
            .store()
            .load_stream(item_id.0)
            .unwrap()
            .into_iter()
            .map(|e| e.to_envelope());
        projection.rebuild_from_scratch(envelopes).unwrap();

        (item_id, projection)
    }

    fn quantity(dispatcher: &Arc<TestDispatcher>, item_id: StockItemId) -> i64 {
        dispatcher
            .load_aggregate::<StockItem>(item_id.0, |id| StockItem::empty(StockItemId::new(id)))
            .unwrap()
            .quantity()
    }

    #[tokio::test]
    async fn material_intake_books_kilograms_in() {
        let dispatcher = dispatcher();
        let (item_id, projection) = setup(&dispatcher, "MAT-01", 100).await;
        let service = IntakeService::new(
            StockLedger::new(Arc::clone(&dispatcher)),
            IdentityResolver::new(projection),
        );

        service
            .material_intake(item_id, 50, UserId::new(), None)
            .await
            .unwrap();

        assert_eq!(quantity(&dispatcher, item_id), 150);
    }

    #[tokio::test]
    async fn scan_intake_resolves_then_books_one_unit() {
        let dispatcher = dispatcher();
        let (item_id, projection) = setup(&dispatcher, "KIT-01", 5).await;
        let service = IntakeService::new(
            StockLedger::new(Arc::clone(&dispatcher)),
            IdentityResolver::new(projection),
        );

        let resolved = service.scan_intake("kit-01", UserId::new()).await.unwrap();

        assert_eq!(resolved, item_id);
        assert_eq!(quantity(&dispatcher, item_id), 6);
    }

    #[tokio::test]
    async fn keystroke_buffer_feeds_the_scan_flow() {
        let dispatcher = dispatcher();
        let (item_id, projection) = setup(&dispatcher, "KIT-01", 5).await;
        let service = IntakeService::new(
            StockLedger::new(Arc::clone(&dispatcher)),
            IdentityResolver::new(projection),
        );

        let mut buffer = crate::scanner::ScanBuffer::new();
        let mut code = None;
        for key in "kit-01\n".chars() {
            code = buffer.push_key(key);
        }
        let code = code.unwrap();

        let resolved = service
            .scan_intake(code.as_str(), UserId::new())
            .await
            .unwrap();

        assert_eq!(resolved, item_id);
        assert_eq!(quantity(&dispatcher, item_id), 6);
    }

    #[tokio::test]
    async fn scan_of_an_unknown_code_books_nothing() {
        let dispatcher = dispatcher();
        let (item_id, projection) = setup(&dispatcher, "KIT-01", 5).await;
        let service = IntakeService::new(
            StockLedger::new(Arc::clone(&dispatcher)),
            IdentityResolver::new(projection),
        );

        let err = service
            .scan_intake("KIT-99", UserId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
        assert_eq!(quantity(&dispatcher, item_id), 5);
    }
}
