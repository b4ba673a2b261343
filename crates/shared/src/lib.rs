//! Shared utilities for the Guardian bracelet core.
//!
//! This crate provides common functionality used across the other crates:
//! - Coordinate, battery and schedule validation logic

pub mod validation;
