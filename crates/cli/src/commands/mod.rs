//! Command implementations.

mod devices;
mod info;
mod run;
mod validate;

pub use devices::run_devices;
pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;
