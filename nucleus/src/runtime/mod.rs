//! Runtime: configuration, filesystem layout, and the public entry point.

mod core;
pub mod layout;
mod lock;
mod locks;
pub mod options;
pub(crate) mod rt_impl;
pub mod types;

pub use self::core::{NucleusRuntime, RuntimeParts};
