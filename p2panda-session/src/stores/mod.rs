// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store implementations.
mod memory;

pub use memory::{InnerMemoryStore, MemoryStore, MemoryStoreError, TrustPolicy};
