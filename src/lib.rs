pub mod aggregate;
pub mod cli;
pub mod code;
pub mod config;
pub mod context;
pub mod dedup;
pub mod embed;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod index;
pub mod jobs;
pub mod model;
pub mod reader;
pub mod reconstruct;
pub mod search;
pub mod store;
pub mod text;

pub use config::Config;
pub use error::{GennieError, GennieResult};
