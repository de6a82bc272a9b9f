pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod profile;
pub mod session;
pub mod store;
pub mod timeline;

#[cfg(test)]
mod test_support;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use error::{CoreError, StoreError};
