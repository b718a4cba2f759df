//! Building blocks for imaging atmospheric Cherenkov telescope data
//! processing: typed event records that can be flattened into table rows,
//! and a provenance log of the activities that produced them.

pub mod container;
pub mod containers;
pub mod json;
pub mod provenance;

pub use container::{Container, ContainerError, ContainerMap, ContainerSchema, Field, Value};
pub use provenance::{ActivityStatus, EntityRef, FinalStatus, Provenance, ProvenanceError};
