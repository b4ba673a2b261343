//! Core engine for the Guardian bracelet service.
//!
//! Keeps guardian-facing bracelet state correct and timely over an
//! unreliable transport, and decides whether, when, and to whom each raw
//! device event is delivered:
//!
//! - [`sync::PresenceSynchronizer`] reconciles the push channel with a
//!   polling fallback into one authoritative sample stream per bracelet.
//! - [`dispatcher::EventDispatcher`] turns accepted samples into zone,
//!   battery and status events, and fans them out per guardian through the
//!   notification gate.
//! - [`engine::GuardianEngine`] wires the two together and carries the
//!   acknowledgement (vibration command) path back toward the device.
//!
//! Transports (push stream, poll fetch, delivery sink, command channel) are
//! trait-shaped collaborators in [`transport`]; the engine never talks to a
//! network itself.

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod sync;
pub mod transport;

pub use engine::{EngineTransports, GuardianEngine};
pub use error::EngineError;
