//! Pad Backend Library
//!
//! Core components for the pad collaborative workspace platform backend:
//! the Coder workspace provisioning client and the Postgres persistence layer.

pub mod coder;
pub mod db;
pub mod settings;
