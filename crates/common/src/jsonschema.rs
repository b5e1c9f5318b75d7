//! JSON Schema validation of inbound readings.

mod reading_validator;

pub use reading_validator::*;
