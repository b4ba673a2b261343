//! Bracelet command domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Vibration pattern a guardian can request when acknowledging an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VibrationPattern {
    Short,
    Medium,
    Sos,
}

/// Commands understood by the bracelet firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    VibrateShort,
    VibrateMedium,
    VibrateSos,
}

impl CommandType {
    /// Converts to the wire string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::VibrateShort => "vibrate_short",
            CommandType::VibrateMedium => "vibrate_medium",
            CommandType::VibrateSos => "vibrate_sos",
        }
    }

    /// Parses from the wire string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "vibrate_short" => Some(CommandType::VibrateShort),
            "vibrate_medium" => Some(CommandType::VibrateMedium),
            "vibrate_sos" => Some(CommandType::VibrateSos),
            _ => None,
        }
    }
}

impl From<VibrationPattern> for CommandType {
    fn from(pattern: VibrationPattern) -> Self {
        match pattern {
            VibrationPattern::Short => CommandType::VibrateShort,
            VibrationPattern::Medium => CommandType::VibrateMedium,
            VibrationPattern::Sos => CommandType::VibrateSos,
        }
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Command delivery status. `Executed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,
    Executed,
    Failed,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Executed => "executed",
            CommandStatus::Failed => "failed",
        }
    }

    /// Whether this status accepts no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CommandStatus::Executed | CommandStatus::Failed)
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected command state transition.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("command {command_id} is already {status}, cannot transition")]
pub struct CommandStateError {
    pub command_id: Uuid,
    pub status: CommandStatus,
}

/// A guardian-issued command attached to a bracelet.
///
/// Lifecycle is strictly one-directional: pending, then exactly one of
/// executed or failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BraceletCommand {
    pub id: Uuid,
    pub bracelet_id: Uuid,
    pub command_type: CommandType,
    pub status: CommandStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl BraceletCommand {
    /// Create a pending command.
    pub fn new(bracelet_id: Uuid, command_type: CommandType, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bracelet_id,
            command_type,
            status: CommandStatus::Pending,
            created_at,
            executed_at: None,
            failure_reason: None,
        }
    }

    /// Record successful execution reported by the device transport.
    pub fn mark_executed(&mut self, at: DateTime<Utc>) -> Result<(), CommandStateError> {
        self.ensure_pending()?;
        self.status = CommandStatus::Executed;
        self.executed_at = Some(at);
        Ok(())
    }

    /// Record a transport-reported failure.
    pub fn mark_failed(
        &mut self,
        reason: impl Into<String>,
    ) -> Result<(), CommandStateError> {
        self.ensure_pending()?;
        self.status = CommandStatus::Failed;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), CommandStateError> {
        if self.status.is_terminal() {
            return Err(CommandStateError {
                command_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }
}
