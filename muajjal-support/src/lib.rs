//! # Muajjal Support
//!
//! Shared utilities for the Muajjal DI crates.
//!
//! This crate provides:
//! - Text rendering for error messages
//! - Parsing of `std::any::type_name` output into generic parts

pub mod rendering;
pub mod type_name;
