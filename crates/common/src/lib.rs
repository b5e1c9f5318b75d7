pub mod domain;
pub mod http;
pub mod jsonschema;
pub mod redis;
pub mod retry;
pub mod telemetry;

#[cfg(any(test, feature = "testing"))]
pub mod memory;

pub use domain::*;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockEventLog;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockSiteIndex;
