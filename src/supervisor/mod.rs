//! Worker process lifecycle and supervision.

mod registry;
mod worker;

pub use registry::*;
pub use worker::*;
