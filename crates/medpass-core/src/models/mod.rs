//! Domain models for the medication pass engine.

mod administration;
mod medicine;
mod prescription;
mod protocol_link;

pub use administration::*;
pub use medicine::*;
pub use prescription::*;
pub use protocol_link::*;
