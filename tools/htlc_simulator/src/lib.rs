//! Simulated chains and a liquidity provider for running swap sessions
//! end to end without a node or a provider daemon.

pub mod chain;
pub mod claim;
pub mod ledger;
pub mod provider;

pub use chain::SimulatedChain;
pub use claim::{compute_hashlock_hex, verify_hashlock};
pub use ledger::{HtlcRecord, HtlcStatus, LedgerSnapshot, SimulatedLedger};
pub use provider::{ProviderBehavior, SimulatedProvider};
