mod client;
mod event_log;
mod site_index;

pub use client::*;
pub use event_log::*;
pub use site_index::*;
