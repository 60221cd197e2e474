//! Voice Dispatch - voice-driven dispatcher for assistive capability modules.

pub mod audit;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod interrupt;
pub mod supervisor;
pub mod voice;
