//! API Module
//!
//! - commands.rs: serde DTOs and the functions every surface calls

pub mod commands;

pub use commands::*;
