//! Audit event logging.

mod error;
mod logger;
mod schema;

pub use error::*;
pub use logger::*;
pub use schema::*;
