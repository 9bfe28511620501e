//! Where the orchestrator finds hypervisors.

use async_trait::async_trait;
use nucleus_shared::{NucleusError, NucleusResult};

use super::HypervisorTarget;

/// Source of registered hypervisors.
///
/// Only the first entry is ever used; multi-hypervisor placement is not
/// supported.
#[async_trait]
pub trait HypervisorInventory: Send + Sync {
    async fn list(&self) -> NucleusResult<Vec<HypervisorTarget>>;

    /// The hypervisor operations run against.
    async fn current(&self) -> NucleusResult<HypervisorTarget> {
        self.list()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| NucleusError::Config("no hypervisor registered".into()))
    }
}

/// Fixed inventory, usually loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    targets: Vec<HypervisorTarget>,
}

impl StaticInventory {
    pub fn new(targets: Vec<HypervisorTarget>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl HypervisorInventory for StaticInventory {
    async fn list(&self) -> NucleusResult<Vec<HypervisorTarget>> {
        Ok(self.targets.clone())
    }
}
