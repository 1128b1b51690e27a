pub mod catalog;
pub mod config;
pub mod error;
pub mod fetch;
pub mod job;
pub mod location;
pub mod outputs;
pub mod publish;
pub mod transform;

pub use error::{JobError, Result};
