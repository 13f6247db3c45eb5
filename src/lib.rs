pub mod application;
pub mod archive;
pub mod config;
pub mod error;
pub mod http;
pub mod identifier;
pub mod manifest;
pub mod provider;
pub mod release;
pub mod runtime;

pub use error::{Error, Result};
