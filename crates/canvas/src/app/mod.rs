pub mod context;
pub mod runner;

pub use context::{GpuContext, InitError};
pub use runner::run;
