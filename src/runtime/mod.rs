mod context;
mod executor;

pub use context::Context;
pub use executor::{ExecutionReport, ExecutionResult, Executor};
