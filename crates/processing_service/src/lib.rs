pub mod config;
pub mod domain;
pub mod http;
pub mod processing_service;

pub use domain::*;
pub use http::*;
pub use processing_service::*;
