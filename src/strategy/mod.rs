pub mod indicators;
pub mod zones;
pub mod bias;

pub use indicators::*;
pub use zones::{detect_zones, assess_zone_status, Zone, ZoneSet, ZoneSide, ZoneLocation, ZoneSignal, Trend};
pub use bias::{BiasResolver, Bias, BiasDirection, BiasDiagnostics};
