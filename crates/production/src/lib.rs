//! Production domain module (event-sourced).
//!
//! Machines are long-lived aggregates with a register/decommission
//! lifecycle. A production run is an append-only fact: which mold ran on
//! which machine, how many good units came off, and how many bags of raw
//! material went in. The stock effects of a run (mold IN, material OUT)
//! are orchestrated outside this crate.

pub mod machine;
pub mod run;

pub use machine::{
    DecommissionMachine, Machine, MachineCommand, MachineDecommissioned, MachineEvent, MachineId,
    MachineRegistered, MachineStatus, RegisterMachine,
};
pub use run::{
    ProductionRecorded, ProductionRun, ProductionRunCommand, ProductionRunEvent, ProductionRunId,
    RecordProduction, BAG_KILOGRAMS,
};
