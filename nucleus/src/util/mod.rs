//! Small helpers shared across modules.

pub mod shell;

pub use shell::{quote, validate_hostname, validate_package_name, validate_package_version};
