pub mod arena;
pub mod reports;
pub mod seeds;
pub mod simulation;
pub mod tester;

pub use arena::{ArenaSummary, parse_archetypes, run_arena};
pub use seeds::resolve_seed_inputs;
pub use simulation::{SimulationSummary, archive_runs};
pub use tester::*;
