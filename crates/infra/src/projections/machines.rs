use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use moldtrack_core::AggregateId;
use moldtrack_events::EventEnvelope;
use moldtrack_production::{MachineEvent, MachineId, MachineStatus};

use crate::read_model::ReadStore;

use super::ProjectionApplyError;

/// Queryable machine read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineReadModel {
    pub machine_id: MachineId,
    pub name: String,
    pub status: MachineStatus,
}

/// Machines projection.
#[derive(Debug)]
pub struct MachinesProjection<S>
where
    S: ReadStore<MachineId, MachineReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> MachinesProjection<S>
where
    S: ReadStore<MachineId, MachineReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, machine_id: &MachineId) -> Option<MachineReadModel> {
        self.store.get(machine_id)
    }

    pub fn list(&self) -> Vec<MachineReadModel> {
        self.store.list()
    }

    /// Machines available for production runs.
    pub fn list_active(&self) -> Vec<MachineReadModel> {
        self.store
            .list()
            .into_iter()
            .filter(|m| m.status == MachineStatus::Active)
            .collect()
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionApplyError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if let Ok(mut cursors) = self.cursors.write() {
            let last = *cursors.get(&aggregate_id).unwrap_or(&0);

            if seq == 0 {
                return Err(ProjectionApplyError::NonMonotonicSequence { last, found: seq });
            }

            if seq <= last {
                // Duplicate or replay; safe to ignore.
                return Ok(());
            }

            if seq != last + 1 && last != 0 {
                return Err(ProjectionApplyError::NonMonotonicSequence { last, found: seq });
            }

            let event: MachineEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| ProjectionApplyError::Deserialize(e.to_string()))?;

            let machine_id = match &event {
                MachineEvent::MachineRegistered(e) => e.machine_id,
                MachineEvent::MachineDecommissioned(e) => e.machine_id,
            };

            if machine_id.0 != aggregate_id {
                return Err(ProjectionApplyError::StreamMismatch(
                    "event machine_id does not match envelope aggregate_id".to_string(),
                ));
            }

            match event {
                MachineEvent::MachineRegistered(e) => {
                    self.store.upsert(
                        e.machine_id,
                        MachineReadModel {
                            machine_id: e.machine_id,
                            name: e.name,
                            status: MachineStatus::Active,
                        },
                    );
                }
                MachineEvent::MachineDecommissioned(e) => {
                    if let Some(mut rm) = self.store.get(&e.machine_id) {
                        rm.status = MachineStatus::Decommissioned;
                        self.store.upsert(e.machine_id, rm);
                    }
                }
            }

            cursors.insert(aggregate_id, seq);
        }

        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionApplyError> {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
        self.store.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
