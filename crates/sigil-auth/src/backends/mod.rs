//! Backend implementations
//!
//! - `memory`: signature verification and lookups against a static
//!   credential table

pub mod memory;

pub use memory::InMemoryBackend;
