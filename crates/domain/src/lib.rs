//! Domain layer for the Guardian bracelet core.
//!
//! This crate contains:
//! - Domain models (Bracelet, SafetyZone, BraceletEvent, BraceletCommand)
//! - Pure business logic services (geometry, zone evaluation, notification gating)
//! - Domain error types

pub mod models;
pub mod services;
