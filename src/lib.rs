pub mod types;
pub mod error;
pub mod broker;
pub mod strategy;
pub mod pricing;
pub mod risk;
pub mod trading;
pub mod config;
pub mod utils;

pub use types::*;
pub use error::{CandidateSkip, Result, ScanError};
