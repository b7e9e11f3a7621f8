use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::network::NetworkType;

use super::aptos::AptosProbe;
use super::evm::EvmProbe;
use super::solana::SolanaProbe;
use super::starknet::StarknetProbe;
use super::types::ProbeOutcome;

/// One outbound call that reads the chain height of a node.
///
/// Implementations make exactly one round trip, honour `proxy` and `timeout`,
/// and return failures as a classified [`super::types::ProbeError`].
#[async_trait::async_trait]
pub trait HeightProbe: Send + Sync {
    async fn fetch_height(&self, url: &str, proxy: Option<&str>, timeout: Duration) -> ProbeOutcome;
}

/// Mapping from protocol family to its probe, built once at startup
#[derive(Clone, Default)]
pub struct ProbeRegistry {
    probes: HashMap<NetworkType, Arc<dyn HeightProbe>>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a probe for every supported protocol family
    pub fn standard() -> Self {
        Self::new()
            .with(NetworkType::Evm, Arc::new(EvmProbe))
            .with(NetworkType::Solana, Arc::new(SolanaProbe))
            .with(NetworkType::Aptos, Arc::new(AptosProbe))
            .with(NetworkType::Starknet, Arc::new(StarknetProbe))
    }

    pub fn with(mut self, network_type: NetworkType, probe: Arc<dyn HeightProbe>) -> Self {
        self.probes.insert(network_type, probe);
        self
    }

    /// Probe for `network_type`.
    ///
    /// # Panics
    /// When no probe was registered for the family. That is a wiring defect,
    /// not something a single node can cause at runtime.
    pub fn get(&self, network_type: NetworkType) -> Arc<dyn HeightProbe> {
        match self.probes.get(&network_type) {
            Some(probe) => Arc::clone(probe),
            None => panic!("no height probe registered for {:?}", network_type),
        }
    }
}
