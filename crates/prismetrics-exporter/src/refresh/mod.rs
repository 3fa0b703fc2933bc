//! Background refresh loop and shutdown coordination.
//!
//! - `scheduler`: single-flight, re-arming timer driving any `RefreshTarget`
//! - `shutdown`: signal fan-out and the stop-on-signal hook for the exporter

pub mod scheduler;
pub mod shutdown;

pub use scheduler::{ErrorHook, RefreshOptions, RefreshScheduler, RefreshTarget};
pub use shutdown::{register_shutdown, Signal, SignalManager};
