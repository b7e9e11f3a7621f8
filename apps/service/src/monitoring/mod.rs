/// Monitoring module - everything that touches a node over the network
///
/// This module is responsible for:
/// - Fetching chain height per protocol family (EVM, Solana, Aptos, Starknet)
/// - Classifying probe failures into node statuses
/// - Maintaining the outbound proxy pool
/// - Running periodic tasks
pub mod aptos;
pub mod checker;
pub mod evm;
pub mod proxy;
pub mod scheduler;
pub mod solana;
pub mod starknet;
pub mod transport;
pub mod types;

#[cfg(test)]
pub mod test_server;

pub use checker::ProbeRegistry;
pub use proxy::ProxyPool;
pub use scheduler::Scheduler;
pub use types::ProbeOutcome;
