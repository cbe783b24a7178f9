pub mod gate;

pub use gate::{resolve_trade_type, theta_pct, GateDecision};
