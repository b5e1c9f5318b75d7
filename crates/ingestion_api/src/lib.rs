pub mod config;
pub mod domain;
pub mod http;
pub mod ingestion_api;

pub use domain::*;
pub use http::*;
pub use ingestion_api::*;
