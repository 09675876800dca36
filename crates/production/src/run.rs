use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use moldtrack_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use moldtrack_events::Event;
use moldtrack_stock::StockItemId;

use crate::machine::MachineId;

/// Kilograms per bag of raw material.
pub const BAG_KILOGRAMS: i64 = 25;

/// Production run identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductionRunId(pub AggregateId);

impl ProductionRunId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductionRunId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: ProductionRun.
///
/// A run is recorded exactly once; the aggregate exists so the record
/// lands in the event store with the same versioning and audit trail as
/// everything else. The stock effects of the run (mold IN by good
/// quantity, material OUT by `bags_used * BAG_KILOGRAMS`) are applied by
/// the production service against the stock aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionRun {
    id: ProductionRunId,
    mold_item_id: Option<StockItemId>,
    material_item_id: Option<StockItemId>,
    machine_id: Option<MachineId>,
    good_quantity: i64,
    bags_used: i64,
    version: u64,
    recorded: bool,
}

impl ProductionRun {
    /// Create an empty, not-yet-recorded aggregate instance for rehydration.
    pub fn empty(id: ProductionRunId) -> Self {
        Self {
            id,
            mold_item_id: None,
            material_item_id: None,
            machine_id: None,
            good_quantity: 0,
            bags_used: 0,
            version: 0,
            recorded: false,
        }
    }

    pub fn id_typed(&self) -> ProductionRunId {
        self.id
    }

    pub fn mold_item_id(&self) -> Option<StockItemId> {
        self.mold_item_id
    }

    pub fn material_item_id(&self) -> Option<StockItemId> {
        self.material_item_id
    }

    pub fn machine_id(&self) -> Option<MachineId> {
        self.machine_id
    }

    pub fn good_quantity(&self) -> i64 {
        self.good_quantity
    }

    pub fn bags_used(&self) -> i64 {
        self.bags_used
    }

    pub fn is_recorded(&self) -> bool {
        self.recorded
    }

    /// Raw material consumed by this run, in kilograms.
    pub fn material_kilograms(&self) -> i64 {
        self.bags_used * BAG_KILOGRAMS
    }
}

impl AggregateRoot for ProductionRun {
    type Id = ProductionRunId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordProduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordProduction {
    pub run_id: ProductionRunId,
    pub mold_item_id: StockItemId,
    pub material_item_id: StockItemId,
    pub machine_id: MachineId,
    pub good_quantity: i64,
    pub bags_used: i64,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductionRunCommand {
    RecordProduction(RecordProduction),
}

/// Event: ProductionRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionRecorded {
    pub run_id: ProductionRunId,
    pub mold_item_id: StockItemId,
    pub material_item_id: StockItemId,
    pub machine_id: MachineId,
    pub good_quantity: i64,
    pub bags_used: i64,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductionRunEvent {
    ProductionRecorded(ProductionRecorded),
}

impl Event for ProductionRunEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductionRunEvent::ProductionRecorded(_) => "production.run.recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductionRunEvent::ProductionRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ProductionRun {
    type Command = ProductionRunCommand;
    type Event = ProductionRunEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductionRunEvent::ProductionRecorded(e) => {
                self.id = e.run_id;
                self.mold_item_id = Some(e.mold_item_id);
                self.material_item_id = Some(e.material_item_id);
                self.machine_id = Some(e.machine_id);
                self.good_quantity = e.good_quantity;
                self.bags_used = e.bags_used;
                self.recorded = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductionRunCommand::RecordProduction(cmd) => self.handle_record(cmd),
        }
    }
}

impl ProductionRun {
    fn handle_record(&self, cmd: &RecordProduction) -> Result<Vec<ProductionRunEvent>, DomainError> {
        if self.recorded {
            return Err(DomainError::conflict("production run already recorded"));
        }

        if cmd.good_quantity <= 0 {
            return Err(DomainError::validation("good_quantity must be positive"));
        }

        if cmd.bags_used <= 0 {
            return Err(DomainError::validation("bags_used must be positive"));
        }

        Ok(vec![ProductionRunEvent::ProductionRecorded(
            ProductionRecorded {
                run_id: cmd.run_id,
                mold_item_id: cmd.mold_item_id,
                material_item_id: cmd.material_item_id,
                machine_id: cmd.machine_id,
                good_quantity: cmd.good_quantity,
                bags_used: cmd.bags_used,
                actor_id: cmd.actor_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
