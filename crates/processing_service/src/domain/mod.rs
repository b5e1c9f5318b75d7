pub mod consumer_group;
pub mod query_service;
pub mod reading_indexer;
pub mod score;
pub mod stream_processor;

pub use consumer_group::*;
pub use query_service::*;
pub use reading_indexer::*;
pub use score::*;
pub use stream_processor::*;
