//! JAM PVM library.
//!
//! Provides the deterministic register machine used to run untrusted service code, along with
//! the codec primitives and logging it relies on.

pub mod pvm;
pub mod types;
pub mod utils;
