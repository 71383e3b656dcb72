//! Background Tasks Module
//!
//! Long-running maintenance work that happens off the caller's path.

mod sweeper;

pub use sweeper::TtlSweeper;
