pub mod candidate;
pub mod scanner;
pub mod scoring;
pub mod universe;

pub use candidate::{build_candidate, Candidate, CandidateContext};
pub use scanner::{ScanDiagnostics, ScanResult, ScanStatus, Scanner};
pub use scoring::{exit_levels, rank, size_position, ScoredPick, ScoringEngine};
pub use universe::{atm_index, filter_universe, select_expiry, UnderlyingUniverse, UniverseResolver};
