use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{error, info, instrument};

use moldtrack_core::Aggregate;
use moldtrack_events::{EventBus, EventEnvelope};
use moldtrack_production::{
    DecommissionMachine, Machine, MachineCommand, MachineId, ProductionRun, ProductionRunCommand,
    ProductionRunId, RecordProduction, RegisterMachine, BAG_KILOGRAMS,
};
use moldtrack_stock::{AdjustStock, Direction};

use crate::command_dispatcher::CommandDispatcher;
use crate::event_store::EventStore;

use super::ledger::StockLedger;
use super::{run_blocking, ServiceError};

/// Stream type for machine aggregates.
pub const MACHINE_AGGREGATE_TYPE: &str = "production.machine";

/// Stream type for production run aggregates.
pub const RUN_AGGREGATE_TYPE: &str = "production.run";

const DEFAULT_DEADLINE: Duration = Duration::from_secs(15);

/// Production run orchestrator.
///
/// Recording a run touches three streams: mold stock in by the good
/// quantity, material stock out by `bags_used * BAG_KILOGRAMS`, then the
/// run record itself. Stock movements come first; if the material deduction
/// fails after the mold intake committed, the intake is compensated with a
/// mirror deduction so the ledgers stay balanced.
pub struct ProductionService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    ledger: StockLedger<S, B>,
    deadline: Duration,
}

impl<S, B> ProductionService<S, B>
where
    S: EventStore + 'static,
    B: EventBus<EventEnvelope<JsonValue>> + 'static,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>) -> Self {
        let ledger = StockLedger::new(Arc::clone(&dispatcher));
        Self {
            dispatcher,
            ledger,
            deadline: DEFAULT_DEADLINE,
        }
    }

    #[instrument(skip(self, command), fields(machine_id = %command.machine_id), err)]
    pub async fn register_machine(&self, command: RegisterMachine) -> Result<(), ServiceError> {
        self.dispatch_machine(
            command.machine_id,
            MachineCommand::RegisterMachine(command),
        )
        .await
    }

    #[instrument(skip(self, command), fields(machine_id = %command.machine_id), err)]
    pub async fn decommission_machine(
        &self,
        command: DecommissionMachine,
    ) -> Result<(), ServiceError> {
        self.dispatch_machine(
            command.machine_id,
            MachineCommand::DecommissionMachine(command),
        )
        .await
    }

    /// Record a production run and apply its stock effects.
    #[instrument(
        skip(self, command),
        fields(
            run_id = %command.run_id,
            machine_id = %command.machine_id,
            good_quantity = command.good_quantity,
            bags_used = command.bags_used,
        ),
        err
    )]
    pub async fn record_run(&self, command: RecordProduction) -> Result<(), ServiceError> {
        let machine = self.load_machine(command.machine_id).await?;
        if !machine.is_registered() {
            return Err(ServiceError::NotFound);
        }
        if !machine.is_active() {
            return Err(ServiceError::InvariantViolation(
                "machine is decommissioned".to_string(),
            ));
        }

        // Reject bad runs before any stock effect is committed.
        ProductionRun::empty(command.run_id)
            .handle(&ProductionRunCommand::RecordProduction(command.clone()))?;

        let note = format!("production run {}", command.run_id);

        self.ledger
            .adjust(AdjustStock {
                item_id: command.mold_item_id,
                direction: Direction::In,
                quantity: command.good_quantity,
                actor_id: command.actor_id,
                note: Some(note.clone()),
                occurred_at: Utc::now(),
            })
            .await?;

        if let Err(err) = self
            .ledger
            .adjust(AdjustStock {
                item_id: command.material_item_id,
                direction: Direction::Out,
                quantity: command.bags_used * BAG_KILOGRAMS,
                actor_id: command.actor_id,
                note: Some(note.clone()),
                occurred_at: Utc::now(),
            })
            .await
        {
            return Err(self.compensate_mold_intake(&command, &note, err).await);
        }

        let run_id = command.run_id;
        let dispatcher = Arc::clone(&self.dispatcher);
        let record = run_blocking(self.deadline, move || {
            dispatcher
                .dispatch::<ProductionRun>(
                    run_id.0,
                    RUN_AGGREGATE_TYPE,
                    ProductionRunCommand::RecordProduction(command),
                    |id| ProductionRun::empty(ProductionRunId::new(id)),
                )
                .map(|_| ())
                .map_err(ServiceError::from)
        })
        .await;

        if let Err(err) = record {
            // Stock effects are committed; only the run record is missing.
            return Err(ServiceError::PartialFailure(format!(
                "stock movements committed but the run record failed: {err}"
            )));
        }

        info!(run_id = %run_id, "production run recorded");
        Ok(())
    }

    async fn compensate_mold_intake(
        &self,
        command: &RecordProduction,
        note: &str,
        original: ServiceError,
    ) -> ServiceError {
        let reversal = self
            .ledger
            .adjust(AdjustStock {
                item_id: command.mold_item_id,
                direction: Direction::Out,
                quantity: command.good_quantity,
                actor_id: command.actor_id,
                note: Some(format!("{note} reversal")),
                occurred_at: Utc::now(),
            })
            .await;

        match reversal {
            Ok(()) => original,
            Err(reversal_err) => {
                error!(
                    run_id = %command.run_id,
                    error = %reversal_err,
                    "mold intake reversal failed after material deduction failure"
                );
                ServiceError::PartialFailure(format!(
                    "material deduction failed ({original}) and the mold intake \
                     reversal also failed ({reversal_err})"
                ))
            }
        }
    }

    async fn load_machine(&self, machine_id: MachineId) -> Result<Machine, ServiceError> {
        let dispatcher = Arc::clone(&self.dispatcher);
        run_blocking(self.deadline, move || {
            dispatcher
                .load_aggregate::<Machine>(machine_id.0, |id| Machine::empty(MachineId::new(id)))
                .map_err(ServiceError::from)
        })
        .await
    }

    async fn dispatch_machine(
        &self,
        machine_id: MachineId,
        command: MachineCommand,
    ) -> Result<(), ServiceError> {
        let dispatcher = Arc::clone(&self.dispatcher);
        run_blocking(self.deadline, move || {
            dispatcher
                .dispatch::<Machine>(machine_id.0, MACHINE_AGGREGATE_TYPE, command, |id| {
                    Machine::empty(MachineId::new(id))
                })
                .map(|_| ())
                .map_err(ServiceError::from)
        })
        .await
    }
}
