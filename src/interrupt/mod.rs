//! Emergency-stop signal and listener.

mod listener;
mod signal;

pub use listener::*;
pub use signal::*;
