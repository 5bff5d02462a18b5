//! Common types shared across Noughts Arena components.

#![warn(clippy::pedantic)]

/// Module for common data types
pub mod types;
