pub mod engine;
pub mod resolver;
pub mod sweeper;

pub use engine::{SettlementEngine, SweepReport};
pub use sweeper::SettlementSweeper;
