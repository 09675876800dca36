use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::Utc;
use moldtrack_core::{AggregateId, UniqueCode, UserId};
use moldtrack_events::EventEnvelope;
use moldtrack_events::InMemoryEventBus;
use moldtrack_infra::command_dispatcher::CommandDispatcher;
use moldtrack_infra::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
use moldtrack_infra::projections::{StockLevelReadModel, StockLevelsProjection};
use moldtrack_infra::read_model::InMemoryReadStore;
use moldtrack_stock::{
    AdjustStock, Direction, ItemKind, ItemRegistered, RegisterItem, StockAdjusted, StockCommand,
    StockEvent, StockItem, StockItemId, Unit,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Naive CRUD simulation: direct key-value updates (no events, no history).
#[derive(Debug, Clone)]
struct NaiveCrudStore {
    inner: Arc<RwLock<HashMap<AggregateId, CrudState>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CrudState {
    name: String,
    quantity: i64,
    version: u64, // For optimistic concurrency (not used in benchmarks)
}

impl NaiveCrudStore {
    fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn register(&self, item_id: AggregateId, name: String, initial: i64) {
        let mut map = self.inner.write().unwrap();
        map.insert(
            item_id,
            CrudState {
                name,
                quantity: initial,
                version: 1,
            },
        );
    }

    fn adjust_stock(&self, item_id: AggregateId, delta: i64) -> Result<(), ()> {
        let mut map = self.inner.write().unwrap();
        if let Some(state) = map.get_mut(&item_id) {
            let new_qty = state.quantity + delta;
            if new_qty < 0 {
                return Err(());
            }
            state.quantity = new_qty;
            state.version += 1;
            Ok(())
        } else {
            Err(())
        }
    }
}

fn setup_event_sourcing() -> (
    CommandDispatcher<InMemoryEventStore, Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>>,
    AggregateId,
) {
    let store = InMemoryEventStore::new();
    let bus: Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>> =
        Arc::new(InMemoryEventBus::new());
    let dispatcher = CommandDispatcher::new(store, bus);
    let item_id = AggregateId::new();
    (dispatcher, item_id)
}

fn register_cmd(item_id: StockItemId, initial: i64) -> RegisterItem {
    RegisterItem {
        item_id,
        kind: ItemKind::Material,
        code: None,
        name: "PP granulate".to_string(),
        unit: Unit::Kilograms,
        initial_quantity: initial,
        occurred_at: Utc::now(),
    }
}

fn adjust_cmd(item_id: StockItemId, quantity: i64) -> AdjustStock {
    AdjustStock {
        item_id,
        direction: Direction::In,
        quantity,
        actor_id: UserId::new(),
        note: None,
        occurred_at: Utc::now(),
    }
}

fn bench_command_execution_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_execution_latency");
    group.sample_size(1000);

    // Benchmark: RegisterItem command (first command, no history)
    group.bench_function("register_item_fresh", |b| {
        let (dispatcher, _) = setup_event_sourcing();
        b.iter(|| {
            let item_id = AggregateId::new();
            dispatcher
                .dispatch::<StockItem>(
                    item_id,
                    "stock.item",
                    StockCommand::RegisterItem(register_cmd(
                        StockItemId::new(item_id),
                        black_box(0),
                    )),
                    |id| StockItem::empty(StockItemId::new(id)),
                )
                .unwrap();
        });
    });

    // Benchmark: AdjustStock command after registration (with history)
    group.bench_function("adjust_stock_with_history", |b| {
        let (dispatcher, item_id) = setup_event_sourcing();
        let item_id_typed = StockItemId::new(item_id);

        dispatcher
            .dispatch::<StockItem>(
                item_id,
                "stock.item",
                StockCommand::RegisterItem(register_cmd(item_id_typed, 0)),
                |id| StockItem::empty(StockItemId::new(id)),
            )
            .unwrap();

        b.iter(|| {
            dispatcher
                .dispatch::<StockItem>(
                    item_id,
                    "stock.item",
                    StockCommand::AdjustStock(adjust_cmd(item_id_typed, black_box(5))),
                    |id| StockItem::empty(StockItemId::new(id)),
                )
                .unwrap();
        });
    });

    group.finish();
}

fn bench_event_append_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_append_throughput");
    group.throughput(Throughput::Elements(1));

    for batch_size in [1, 10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("batch_append", batch_size),
            batch_size,
            |b, &size| {
                let store = InMemoryEventStore::new();
                let item_id = AggregateId::new();

                b.iter(|| {
                    let events: Vec<UncommittedEvent> = (0..size)
                        .map(|i| {
                            let event = StockEvent::StockAdjusted(StockAdjusted {
                                item_id: StockItemId::new(item_id),
                                direction: Direction::In,
                                quantity: (i + 1) as i64,
                                actor_id: UserId::new(),
                                note: None,
                                occurred_at: Utc::now(),
                            });
                            UncommittedEvent::from_typed(
                                item_id,
                                "stock.item",
                                uuid::Uuid::now_v7(),
                                &event,
                            )
                            .unwrap()
                        })
                        .collect();

                    black_box(
                        store
                            .append(events, moldtrack_core::ExpectedVersion::Any)
                            .unwrap(),
                    );
                });
            },
        );
    }

    group.finish();
}

fn bench_projection_rebuild_speed(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection_rebuild_speed");

    for event_count in [10, 100, 1000, 10000].iter() {
        group.bench_with_input(
            BenchmarkId::new("rebuild_from_events", event_count),
            event_count,
            |b, &count| {
                let store = InMemoryEventStore::new();
                let item_id = AggregateId::new();
                let item_id_typed = StockItemId::new(item_id);

                // Pre-generate events
                let mut all_envelopes = Vec::new();
                {
                    let register_event = StockEvent::ItemRegistered(ItemRegistered {
                        item_id: item_id_typed,
                        kind: ItemKind::Material,
                        code: Some(UniqueCode::parse("MAT-01").unwrap()),
                        name: "PP granulate".to_string(),
                        unit: Unit::Kilograms,
                        initial_quantity: 0,
                        occurred_at: Utc::now(),
                    });
                    let uncommitted = UncommittedEvent::from_typed(
                        item_id,
                        "stock.item",
                        uuid::Uuid::now_v7(),
                        &register_event,
                    )
                    .unwrap();
                    let stored = store
                        .append(vec![uncommitted], moldtrack_core::ExpectedVersion::Any)
                        .unwrap();
                    all_envelopes.push(stored[0].to_envelope());

                    for i in 0..(count - 1) {
                        let adjust_event = StockEvent::StockAdjusted(StockAdjusted {
                            item_id: item_id_typed,
                            direction: Direction::In,
                            quantity: ((i % 10) + 1) as i64,
                            actor_id: UserId::new(),
                            note: None,
                            occurred_at: Utc::now(),
                        });
                        let uncommitted = UncommittedEvent::from_typed(
                            item_id,
                            "stock.item",
                            uuid::Uuid::now_v7(),
                            &adjust_event,
                        )
                        .unwrap();
                        let stored = store
                            .append(
                                vec![uncommitted],
                                moldtrack_core::ExpectedVersion::Exact((i + 1) as u64),
                            )
                            .unwrap();
                        all_envelopes.push(stored[0].to_envelope());
                    }
                }

                let read_model_store: Arc<InMemoryReadStore<StockItemId, StockLevelReadModel>> =
                    Arc::new(InMemoryReadStore::new());
                let projection = StockLevelsProjection::new(read_model_store);

                b.iter(|| {
                    projection
                        .rebuild_from_scratch(black_box(all_envelopes.clone()))
                        .unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_event_sourcing_vs_naive_crud(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_sourcing_vs_naive_crud");
    group.sample_size(1000);

    // Benchmark: Event sourcing (register + adjust)
    group.bench_function("event_sourcing_register_and_adjust", |b| {
        let (dispatcher, _) = setup_event_sourcing();

        b.iter(|| {
            let item_id = AggregateId::new();
            let item_id_typed = StockItemId::new(item_id);

            dispatcher
                .dispatch::<StockItem>(
                    item_id,
                    "stock.item",
                    StockCommand::RegisterItem(register_cmd(item_id_typed, 0)),
                    |id| StockItem::empty(StockItemId::new(id)),
                )
                .unwrap();

            dispatcher
                .dispatch::<StockItem>(
                    item_id,
                    "stock.item",
                    StockCommand::AdjustStock(adjust_cmd(item_id_typed, 10)),
                    |id| StockItem::empty(StockItemId::new(id)),
                )
                .unwrap();
        });
    });

    // Benchmark: Naive CRUD (register + adjust)
    group.bench_function("naive_crud_register_and_adjust", |b| {
        let store = NaiveCrudStore::new();
        let item_id = AggregateId::new();

        b.iter(|| {
            store.register(item_id, "PP granulate".to_string(), 0);
            store.adjust_stock(item_id, 10).unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_command_execution_latency,
    bench_event_append_throughput,
    bench_projection_rebuild_speed,
    bench_event_sourcing_vs_naive_crud
);
criterion_main!(benches);
