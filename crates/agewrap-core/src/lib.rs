pub mod config;
pub mod error;

pub use config::AgewrapConfig;
pub use error::{AgewrapError, AgewrapResult};
