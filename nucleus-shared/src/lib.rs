//! Types shared between the nucleus library and its front ends.

pub mod errors;

pub use errors::{ErrorKind, NucleusError, NucleusResult};
