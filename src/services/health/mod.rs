pub mod monitor;
pub mod prober;

pub use monitor::{HealthMonitor, HealthState, ServiceStatus};
pub use prober::{DEFAULT_PROBE_TIMEOUT, HealthProber, ProbeResult};
