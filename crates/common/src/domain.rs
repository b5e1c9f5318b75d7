mod event_log;
mod reading;
mod result;
mod site_index;

pub use event_log::*;
pub use reading::*;
pub use result::*;
pub use site_index::*;
