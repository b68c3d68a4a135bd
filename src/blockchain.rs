// Thin re-export module: implementation is in `blockchain/core.rs`, split into
// block construction, validation and ledger state.

pub mod core;
pub use core::*;
