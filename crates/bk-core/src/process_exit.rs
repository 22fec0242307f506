// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job outcome reported to the control plane exactly once per job.

use serde::{Deserialize, Serialize};

/// A short string tag accompanying a non-zero exit, drawn from a fixed set.
///
/// Typed as a closed enum (rather than a bare string, as the wire format
/// historically carried it) so a phase pipeline bug that invents a new
/// reason fails to compile instead of silently reaching the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalReason {
    /// The agent is shutting down gracefully.
    AgentStop,
    /// The control plane cancelled the job.
    Cancel,
    /// The subprocess tree could not be run or its I/O failed.
    ProcessRunError,
    /// A pre-bootstrap gate or signed-step consistency check refused the job.
    AgentRefused,
}

impl SignalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalReason::AgentStop => "agent_stop",
            SignalReason::Cancel => "cancel",
            SignalReason::ProcessRunError => "process_run_error",
            SignalReason::AgentRefused => "agent_refused",
        }
    }
}

impl std::fmt::Display for SignalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Produced exactly once per job and carried to `finishJob`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessExit {
    pub status: i32,
    pub signal: Option<String>,
    pub reason: Option<SignalReason>,
}

impl ProcessExit {
    /// A clean, successful exit: status 0, no signal, no reason.
    pub fn success() -> Self {
        Self { status: 0, signal: None, reason: None }
    }

    /// The command's own exit status, no signal/reason attached.
    pub fn from_status(status: i32) -> Self {
        Self { status, signal: None, reason: None }
    }

    /// A synthetic failure carrying a signal reason but no command status;
    /// refusal always reports status -1 since the command never ran.
    pub fn refused() -> Self {
        Self { status: -1, signal: None, reason: Some(SignalReason::AgentRefused) }
    }

    pub fn with_reason(mut self, reason: SignalReason) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn with_signal(mut self, signal: impl Into<String>) -> Self {
        self.signal = Some(signal.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == 0 && self.signal.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_zero_with_no_reason() {
        let exit = ProcessExit::success();
        assert!(exit.is_success());
        assert_eq!(exit.reason, None);
    }

    #[test]
    fn refused_carries_negative_status_and_reason() {
        let exit = ProcessExit::refused();
        assert_eq!(exit.status, -1);
        assert_eq!(exit.reason, Some(SignalReason::AgentRefused));
        assert!(!exit.is_success());
    }

    #[test]
    fn signal_reason_wire_strings_match_fixed_set() {
        assert_eq!(SignalReason::AgentStop.as_str(), "agent_stop");
        assert_eq!(SignalReason::Cancel.as_str(), "cancel");
        assert_eq!(SignalReason::ProcessRunError.as_str(), "process_run_error");
        assert_eq!(SignalReason::AgentRefused.as_str(), "agent_refused");
    }
}
