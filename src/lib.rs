pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod envelope;
pub mod error;
pub mod feed;
pub mod graph;
pub mod requests;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use envelope::Envelope;
pub use error::{Result, SixgraphError};
