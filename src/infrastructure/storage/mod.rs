//! Storage layer
//!
//! The authoritative store behind the booking core. All slot counter
//! mutations go through the conditional operations on [`Storage`]; the
//! in-memory implementation backs development and tests.

pub mod memory;
pub mod traits;

pub use memory::InMemoryStorage;
pub use traits::Storage;
