//! Infrastructure wiring for the HTTP app.
//!
//! One write stack (dispatcher + application services) over a swappable event
//! store, and one in-memory read side fed by background projection workers.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use sqlx::PgPool;

use moldtrack_core::UserId;
use moldtrack_events::{EventEnvelope, InMemoryEventBus};
use moldtrack_infra::{
    command_dispatcher::CommandDispatcher,
    event_store::{EventStore, InMemoryEventStore, PostgresEventStore},
    projections::{
        MachineReadModel, MachinesProjection, MovementRecord, MovementsProjection, OrderReadModel,
        OrdersProjection, ProductionLogEntry, ProductionLogProjection, StockLevelReadModel,
        StockLevelsProjection,
    },
    read_model::InMemoryReadStore,
    services::{
        DeliveryReport, DeliveryService, IdentityResolver, IntakeService, ProductionService,
        ReconciliationReport, ReconciliationService, ServiceError, StockLedger,
    },
    workers::{ProjectionWorker, WorkerHandle},
};
use moldtrack_orders::{OrderId, PlaceOrder};
use moldtrack_production::{
    DecommissionMachine, MachineId, ProductionRunId, RecordProduction, RegisterMachine,
};
use moldtrack_stock::{AdjustStock, LinkComponent, RegisterItem, RetireItem, StockItemId};

type SharedBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

type LevelStore = Arc<InMemoryReadStore<StockItemId, StockLevelReadModel>>;
type MovementStore = Arc<InMemoryReadStore<StockItemId, Vec<MovementRecord>>>;
type OrderStore = Arc<InMemoryReadStore<OrderId, OrderReadModel>>;
type MachineStore = Arc<InMemoryReadStore<MachineId, MachineReadModel>>;
type RunStore = Arc<InMemoryReadStore<ProductionRunId, ProductionLogEntry>>;

/// Query-side projections shared by both backends.
///
/// Projections are fed asynchronously by background workers, so reads are
/// eventually consistent with the ledger.
pub struct ReadSide {
    pub stock_levels: Arc<StockLevelsProjection<LevelStore>>,
    pub movements: Arc<MovementsProjection<MovementStore>>,
    pub orders: Arc<OrdersProjection<OrderStore>>,
    pub machines: Arc<MachinesProjection<MachineStore>>,
    pub production_log: Arc<ProductionLogProjection<RunStore>>,
    resolver: IdentityResolver<StockLevelsProjection<LevelStore>>,
}

/// Write stack over one event store implementation.
struct ServiceStack<E> {
    ledger: StockLedger<Arc<E>, SharedBus>,
    delivery: DeliveryService<Arc<E>, SharedBus>,
    production: ProductionService<Arc<E>, SharedBus>,
    intake: IntakeService<Arc<E>, SharedBus, StockLevelsProjection<LevelStore>>,
    reconciliation: Arc<ReconciliationService<E, LevelStore>>,
}

impl<E> ServiceStack<E>
where
    E: EventStore + 'static,
{
    fn new(
        store: Arc<E>,
        bus: SharedBus,
        stock_levels: Arc<StockLevelsProjection<LevelStore>>,
    ) -> Self {
        let dispatcher = Arc::new(CommandDispatcher::new(Arc::clone(&store), bus));

        let ledger = StockLedger::new(Arc::clone(&dispatcher));
        let delivery = DeliveryService::new(Arc::clone(&dispatcher));
        let production = ProductionService::new(Arc::clone(&dispatcher));
        let intake = IntakeService::new(
            StockLedger::new(Arc::clone(&dispatcher)),
            IdentityResolver::new(Arc::clone(&stock_levels)),
        );
        let reconciliation = Arc::new(ReconciliationService::new(store, stock_levels));

        Self {
            ledger,
            delivery,
            production,
            intake,
            reconciliation,
        }
    }
}

enum Backend {
    InMemory(ServiceStack<InMemoryEventStore>),
    Persistent(ServiceStack<PostgresEventStore>),
}

/// Application services shared across requests (via `Extension<Arc<AppServices>>`).
pub struct AppServices {
    pub read: ReadSide,
    backend: Backend,
    _workers: Vec<WorkerHandle>,
}

impl AppServices {
    pub async fn register_item(&self, command: RegisterItem) -> Result<(), ServiceError> {
        match &self.backend {
            Backend::InMemory(s) => s.ledger.register_item(command).await,
            Backend::Persistent(s) => s.ledger.register_item(command).await,
        }
    }

    pub async fn adjust_stock(&self, command: AdjustStock) -> Result<(), ServiceError> {
        match &self.backend {
            Backend::InMemory(s) => s.ledger.adjust(command).await,
            Backend::Persistent(s) => s.ledger.adjust(command).await,
        }
    }

    pub async fn link_component(&self, command: LinkComponent) -> Result<(), ServiceError> {
        match &self.backend {
            Backend::InMemory(s) => s.ledger.link_component(command).await,
            Backend::Persistent(s) => s.ledger.link_component(command).await,
        }
    }

    pub async fn retire_item(&self, command: RetireItem) -> Result<(), ServiceError> {
        match &self.backend {
            Backend::InMemory(s) => s.ledger.retire_item(command).await,
            Backend::Persistent(s) => s.ledger.retire_item(command).await,
        }
    }

    pub async fn place_order(&self, command: PlaceOrder) -> Result<(), ServiceError> {
        match &self.backend {
            Backend::InMemory(s) => s.delivery.place_order(command).await,
            Backend::Persistent(s) => s.delivery.place_order(command).await,
        }
    }

    pub async fn deliver(
        &self,
        order_id: OrderId,
        actor_id: UserId,
    ) -> Result<DeliveryReport, ServiceError> {
        match &self.backend {
            Backend::InMemory(s) => s.delivery.deliver(order_id, actor_id).await,
            Backend::Persistent(s) => s.delivery.deliver(order_id, actor_id).await,
        }
    }

    pub async fn register_machine(&self, command: RegisterMachine) -> Result<(), ServiceError> {
        match &self.backend {
            Backend::InMemory(s) => s.production.register_machine(command).await,
            Backend::Persistent(s) => s.production.register_machine(command).await,
        }
    }

    pub async fn decommission_machine(
        &self,
        command: DecommissionMachine,
    ) -> Result<(), ServiceError> {
        match &self.backend {
            Backend::InMemory(s) => s.production.decommission_machine(command).await,
            Backend::Persistent(s) => s.production.decommission_machine(command).await,
        }
    }

    pub async fn record_run(&self, command: RecordProduction) -> Result<(), ServiceError> {
        match &self.backend {
            Backend::InMemory(s) => s.production.record_run(command).await,
            Backend::Persistent(s) => s.production.record_run(command).await,
        }
    }

    pub async fn material_intake(
        &self,
        item_id: StockItemId,
        kilograms: i64,
        actor_id: UserId,
        note: Option<String>,
    ) -> Result<(), ServiceError> {
        match &self.backend {
            Backend::InMemory(s) => s.intake.material_intake(item_id, kilograms, actor_id, note).await,
            Backend::Persistent(s) => s.intake.material_intake(item_id, kilograms, actor_id, note).await,
        }
    }

    pub async fn scan_intake(
        &self,
        raw_code: &str,
        actor_id: UserId,
    ) -> Result<StockItemId, ServiceError> {
        match &self.backend {
            Backend::InMemory(s) => s.intake.scan_intake(raw_code, actor_id).await,
            Backend::Persistent(s) => s.intake.scan_intake(raw_code, actor_id).await,
        }
    }

    /// Audit the stock-levels projection against a replay of each ledger stream.
    pub async fn reconcile(&self) -> Result<ReconciliationReport, ServiceError> {
        match &self.backend {
            Backend::InMemory(s) => run_reconcile(&s.reconciliation).await,
            Backend::Persistent(s) => run_reconcile(&s.reconciliation).await,
        }
    }

    /// Resolve a scanned or typed code to its stock item.
    pub async fn resolve(&self, raw_code: &str) -> Result<StockLevelReadModel, ServiceError> {
        self.read.resolver.resolve(raw_code).await
    }
}

async fn run_reconcile<E>(
    service: &Arc<ReconciliationService<E, LevelStore>>,
) -> Result<ReconciliationReport, ServiceError>
where
    E: EventStore + 'static,
{
    let service = Arc::clone(service);
    // Reconciliation replays whole streams; keep it off the async executor.
    tokio::task::spawn_blocking(move || service.reconcile())
        .await
        .map_err(|e| ServiceError::Persistence(e.to_string()))?
}

/// Build the full service graph.
///
/// `USE_PERSISTENT_STORES=true` (plus `DATABASE_URL`) selects the Postgres
/// event store; anything else wires the in-memory store used for dev/test.
/// The read side is in-memory in both modes and only sees events published
/// after startup; the reconciliation audit surfaces any resulting drift.
pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    let bus: SharedBus = Arc::new(InMemoryEventBus::new());

    let levels_store: LevelStore = Arc::new(InMemoryReadStore::new());
    let stock_levels = Arc::new(StockLevelsProjection::new(levels_store));

    let movements_store: MovementStore = Arc::new(InMemoryReadStore::new());
    let movements = Arc::new(MovementsProjection::new(movements_store));

    let orders_store: OrderStore = Arc::new(InMemoryReadStore::new());
    let orders = Arc::new(OrdersProjection::new(orders_store));

    let machines_store: MachineStore = Arc::new(InMemoryReadStore::new());
    let machines = Arc::new(MachinesProjection::new(machines_store));

    let runs_store: RunStore = Arc::new(InMemoryReadStore::new());
    let production_log = Arc::new(ProductionLogProjection::new(runs_store));

    let workers = vec![
        ProjectionWorker::spawn("stock-levels", Arc::clone(&bus), Some("stock.item"), {
            let proj = Arc::clone(&stock_levels);
            move |envelope| proj.apply_envelope(&envelope)
        }),
        ProjectionWorker::spawn("movements", Arc::clone(&bus), Some("stock.item"), {
            let proj = Arc::clone(&movements);
            move |envelope| proj.apply_envelope(&envelope)
        }),
        ProjectionWorker::spawn("orders", Arc::clone(&bus), Some("orders.order"), {
            let proj = Arc::clone(&orders);
            move |envelope| proj.apply_envelope(&envelope)
        }),
        ProjectionWorker::spawn("machines", Arc::clone(&bus), Some("production.machine"), {
            let proj = Arc::clone(&machines);
            move |envelope| proj.apply_envelope(&envelope)
        }),
        ProjectionWorker::spawn("production-log", Arc::clone(&bus), Some("production.run"), {
            let proj = Arc::clone(&production_log);
            move |envelope| proj.apply_envelope(&envelope)
        }),
    ];

    let resolver = IdentityResolver::new(Arc::clone(&stock_levels));

    let read = ReadSide {
        stock_levels: Arc::clone(&stock_levels),
        movements,
        orders,
        machines,
        production_log,
        resolver,
    };

    let backend = if use_persistent {
        let database_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");
        let pool = PgPool::connect(&database_url)
            .await
            .expect("failed to connect to Postgres");
        let store = Arc::new(PostgresEventStore::new(pool));
        tracing::info!("event store: postgres");
        Backend::Persistent(ServiceStack::new(store, Arc::clone(&bus), stock_levels))
    } else {
        let store = Arc::new(InMemoryEventStore::new());
        tracing::info!("event store: in-memory");
        Backend::InMemory(ServiceStack::new(store, Arc::clone(&bus), stock_levels))
    };

    AppServices {
        read,
        backend,
        _workers: workers,
    }
}
