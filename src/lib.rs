//! HashLedger - a replicated, append-only ledger of opaque data blocks
//!
//! # Architecture
//!
//! ## Ledger Core
//! - [`blockchain`] - Block model, hashing, chain validation and ledger state
//! - [`sync`] - Reconciliation of block responses from peers
//!
//! ## Networking & Integration
//! - [`network`] - WebSocket peer transport
//! - `api` - HTTP control surface (feature `api`)
//! - [`node`] - Process wiring
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Ledger Core
// ============================================================================
pub mod blockchain;
pub mod sync;

// ============================================================================
// Networking
// ============================================================================
pub mod network;
pub mod node;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
