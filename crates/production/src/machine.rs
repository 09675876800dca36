use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use moldtrack_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use moldtrack_events::Event;

/// Machine identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineId(pub AggregateId);

impl MachineId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for MachineId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Machine status lifecycle.
///
/// Decommissioning replaces hard deletion; a decommissioned machine
/// rejects further production references but its history stays intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    Active,
    Decommissioned,
}

/// Aggregate root: Machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    id: MachineId,
    name: String,
    status: MachineStatus,
    version: u64,
    registered: bool,
}

impl Machine {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: MachineId) -> Self {
        Self {
            id,
            name: String::new(),
            status: MachineStatus::Active,
            version: 0,
            registered: false,
        }
    }

    pub fn id_typed(&self) -> MachineId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> MachineStatus {
        self.status
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn is_active(&self) -> bool {
        self.registered && self.status == MachineStatus::Active
    }
}

impl AggregateRoot for Machine {
    type Id = MachineId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterMachine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterMachine {
    pub machine_id: MachineId,
    pub name: String,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DecommissionMachine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecommissionMachine {
    pub machine_id: MachineId,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineCommand {
    RegisterMachine(RegisterMachine),
    DecommissionMachine(DecommissionMachine),
}

/// Event: MachineRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRegistered {
    pub machine_id: MachineId,
    pub name: String,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MachineDecommissioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineDecommissioned {
    pub machine_id: MachineId,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineEvent {
    MachineRegistered(MachineRegistered),
    MachineDecommissioned(MachineDecommissioned),
}

impl Event for MachineEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MachineEvent::MachineRegistered(_) => "production.machine.registered",
            MachineEvent::MachineDecommissioned(_) => "production.machine.decommissioned",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            MachineEvent::MachineRegistered(e) => e.occurred_at,
            MachineEvent::MachineDecommissioned(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Machine {
    type Command = MachineCommand;
    type Event = MachineEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            MachineEvent::MachineRegistered(e) => {
                self.id = e.machine_id;
                self.name = e.name.clone();
                self.status = MachineStatus::Active;
                self.registered = true;
            }
            MachineEvent::MachineDecommissioned(_) => {
                self.status = MachineStatus::Decommissioned;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            MachineCommand::RegisterMachine(cmd) => self.handle_register(cmd),
            MachineCommand::DecommissionMachine(cmd) => self.handle_decommission(cmd),
        }
    }
}

impl Machine {
    fn handle_register(&self, cmd: &RegisterMachine) -> Result<Vec<MachineEvent>, DomainError> {
        if self.registered {
            return Err(DomainError::conflict("machine already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("machine name must not be empty"));
        }

        Ok(vec![MachineEvent::MachineRegistered(MachineRegistered {
            machine_id: cmd.machine_id,
            name: cmd.name.clone(),
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_decommission(
        &self,
        cmd: &DecommissionMachine,
    ) -> Result<Vec<MachineEvent>, DomainError> {
        if !self.registered {
            return Err(DomainError::not_found());
        }

        if self.status == MachineStatus::Decommissioned {
            return Err(DomainError::conflict("machine is already decommissioned"));
        }

        Ok(vec![MachineEvent::MachineDecommissioned(
            MachineDecommissioned {
                machine_id: cmd.machine_id,
                actor_id: cmd.actor_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
