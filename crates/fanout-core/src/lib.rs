pub mod config;
pub mod error;
pub mod retry;
pub mod secret;
pub mod sign;
pub mod types;

pub use error::Error;
