pub mod config;
pub mod error;
pub mod program;
pub mod strings;

pub use config::Config;
pub use error::{McTestError, Result};
