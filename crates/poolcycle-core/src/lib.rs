pub mod config;
pub mod controller;
pub mod error;
pub mod io;
pub mod operator;
pub mod paths;
pub mod report;
pub mod retry;
pub mod targets;
pub mod types;

pub use error::{PoolcycleError, Result};
