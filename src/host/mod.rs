//! # Gate host: the component that owns gates and their workers.
//!
//! Gates are passive: somebody has to run their dispatch workers, withdraw
//! their HTTP endpoints and unlink them when the process stops. [`GateHost`]
//! does that for every gate it creates.
//!
//! - [`gate_host`]: gate creation, worker pool, ordered shutdown with grace;
//! - [`builder`]: host construction;
//! - [`shutdown`]: OS signal handling for [`GateHost::run_until_signal`].

mod builder;
mod gate_host;
mod shutdown;

pub use builder::GateHostBuilder;
pub use gate_host::GateHost;
pub use shutdown::wait_for_shutdown_signal;
