// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-container runner client state.

use std::time::Instant;

use crate::process_exit::ProcessExit;

/// A remote phase process's lifecycle state. Transitions are monotonic
/// except that either `NotYetConnected` or `Connected` may move to `Lost`.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientState {
    NotYetConnected,
    Connected,
    Exited(ProcessExit),
    Lost,
}

impl ClientState {
    /// Validate a transition per the state diagram Returns
    /// `false` (transition rejected) rather than panicking, since the
    /// runner must reject a client trying to go backwards without crashing
    /// the whole job.
    pub fn can_transition_to(&self, next: &ClientState) -> bool {
        use ClientState::*;
        matches!(
            (self, next),
            (NotYetConnected, Connected)
            | (NotYetConnected, Lost)
            | (Connected, Exited(_))
            | (Connected, Lost)
        )
    }
}

/// Ordinal-indexed client record tracked by the runner.
#[derive(Debug, Clone)]
pub struct RunnerClient {
    pub id: u32,
    pub state: ClientState,
    pub last_heard_from: Option<Instant>,
}

impl RunnerClient {
    pub fn new(id: u32) -> Self {
        Self { id, state: ClientState::NotYetConnected, last_heard_from: None }
    }

    /// Attempt a transition; returns `Err` with the rejected target state
    /// if the transition is invalid, matching the contract that
    /// `Register`/`Exit` RPCs on an out-of-order or duplicate client fail
    /// rather than silently overwriting state.
    pub fn transition(&mut self, next: ClientState) -> Result<(), ClientState> {
        if self.state.can_transition_to(&next) {
            self.state = next;
            Ok(())
        } else {
            Err(next)
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_heard_from = Some(now);
    }

    pub fn is_exited(&self) -> bool {
        matches!(self.state, ClientState::Exited(_))
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ClientState::Connected)
    }
}

/// What a client should do next, as returned by `Status` polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Wait,
    Start,
    Interrupt,
}
