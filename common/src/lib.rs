//! Shared data model for the flow-lens TCP correlation engine
//!
//! This crate provides the data structures and constants shared between
//! the correlation engine and its external consumer: the canonical flow
//! key, the tagged address variant, and the fixed-layout event record
//! that crosses the engine boundary.

#![no_std]

pub mod types;
pub mod constants;

// Re-export commonly used types
pub use types::{Address, EventType, FlowKey, TcpEvent};
pub use constants::*;
