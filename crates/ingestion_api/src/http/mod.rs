pub mod handlers;
pub mod router;

pub use handlers::*;
pub use router::*;
