pub mod clock;
pub mod telemetry;

pub use clock::{now_ms, now_secs};
