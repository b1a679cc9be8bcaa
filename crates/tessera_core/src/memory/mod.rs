//! # Memory Management
//!
//! Fixed-size memory blocks backing archetype chunks.
//!
//! ## Design Philosophy
//!
//! Each chunk acquires exactly one block when it is created. During gameplay:
//! - Blocks are never resized
//! - Rows are moved with plain byte copies
//! - Allocation failure is reported, never retried

mod block;

pub use block::MemoryBlock;
