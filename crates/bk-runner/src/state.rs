// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared runner state: the per-client table, the interrupt flag, and the
//! ordering/liveness decisions, all behind one lock so the RPC handlers and
//! the liveness scanner never race each other.

use std::time::Duration;

use bk_core::{Clock, ClientState, ProcessExit, RunState, RunnerClient};
use parking_lot::Mutex;

pub struct RunnerState<C: Clock> {
    clock: C,
    clients: Mutex<Vec<RunnerClient>>,
    interrupted: Mutex<bool>,
    job_started: Mutex<bool>,
}

impl<C: Clock> RunnerState<C> {
    pub fn new(client_count: u32, clock: C) -> Self {
        let clients = (0..client_count).map(RunnerClient::new).collect();
        Self { clock, clients: Mutex::new(clients), interrupted: Mutex::new(false), job_started: Mutex::new(false) }
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// `Register(id)`: the client must be `NotYetConnected` and in range.
    pub fn register(&self, id: u32) -> Result<(), &'static str> {
        let mut clients = self.clients.lock();
        let client = clients.get_mut(id as usize).ok_or("client id out of range")?;
        client.touch(self.clock.now());
        client.transition(ClientState::Connected).map_err(|_| "client already registered")
    }

    pub fn registered_count(&self) -> u32 {
        self.clients.lock().iter().filter(|c| !matches!(c.state, ClientState::NotYetConnected)).count() as u32
    }

    /// First `WriteLogs` call of the job signals job-started; later calls
    /// are no-ops for this purpose.
    pub fn note_log_write(&self) -> bool {
        let mut started = self.job_started.lock();
        if *started {
            false
        } else {
            *started = true;
            true
        }
    }

    pub fn set_interrupted(&self) {
        *self.interrupted.lock() = true;
    }

    /// `Status(id)`: `Interrupt` overrides everything; otherwise client 0
    /// starts immediately and client i>0 starts once i-1 has exited.
    pub fn status(&self, id: u32) -> RunState {
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get_mut(id as usize) {
            client.touch(self.clock.now());
        }
        if *self.interrupted.lock() {
            return RunState::Interrupt;
        }
        if id == 0 {
            return RunState::Start;
        }
        match clients.get((id - 1) as usize) {
            Some(previous) if previous.is_exited() => RunState::Start,
            _ => RunState::Wait,
        }
    }

    /// `Exit({id, status})`: marks the client exited. A non-zero status
    /// terminates the run immediately (interrupting every other client and
    /// returning that status as the overall exit); a zero status only
    /// yields an overall status once every client has exited.
    pub fn exit(&self, id: u32, exit: ProcessExit) -> Result<Option<i32>, &'static str> {
        let mut clients = self.clients.lock();
        let client = clients.get_mut(id as usize).ok_or("client id out of range")?;
        let status = exit.status;
        client.transition(ClientState::Exited(exit)).map_err(|_| "client cannot exit from its current state")?;

        if status != 0 {
            self.set_interrupted();
            return Ok(Some(status));
        }
        if clients.iter().all(|c| c.is_exited()) {
            Ok(Some(Self::overall_exit_status(&clients)))
        } else {
            Ok(None)
        }
    }

    fn overall_exit_status(clients: &[RunnerClient]) -> i32 {
        for client in clients {
            if let ClientState::Exited(exit) = &client.state {
                if exit.status != 0 {
                    return exit.status;
                }
            }
        }
        0
    }

    /// Mark any `Connected` client whose last-heard-from exceeds
    /// `liveness_threshold` as `Lost`, returning the IDs newly marked.
    pub fn scan_liveness(&self, liveness_threshold: Duration) -> Vec<u32> {
        let now = self.clock.now();
        let mut clients = self.clients.lock();
        let mut lost = Vec::new();
        for client in clients.iter_mut() {
            if client.is_connected() {
                let stale = match client.last_heard_from {
                    Some(last) => now.duration_since(last) > liveness_threshold,
                    None => false,
                };
                if stale && client.transition(ClientState::Lost).is_ok() {
                    lost.push(client.id);
                }
            }
        }
        lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bk_core::FakeClock;

    #[test]
    fn client_zero_starts_immediately() {
        let state = RunnerState::new(3, FakeClock::new());
        state.register(0).unwrap();
        assert_eq!(state.status(0), RunState::Start);
    }

    #[test]
    fn client_one_waits_until_client_zero_exits() {
        let state = RunnerState::new(3, FakeClock::new());
        state.register(0).unwrap();
        state.register(1).unwrap();
        assert_eq!(state.status(1), RunState::Wait);
        state.exit(0, ProcessExit::success()).unwrap();
        assert_eq!(state.status(1), RunState::Start);
    }

    #[test]
    fn registering_the_same_id_twice_fails() {
        let state = RunnerState::new(2, FakeClock::new());
        state.register(0).unwrap();
        assert!(state.register(0).is_err());
    }

    #[test]
    fn an_out_of_range_id_fails_to_register() {
        let state = RunnerState::new(2, FakeClock::new());
        assert!(state.register(2).is_err());
    }

    #[test]
    fn overall_exit_is_zero_only_when_every_client_exits_zero() {
        let state = RunnerState::new(2, FakeClock::new());
        state.register(0).unwrap();
        state.register(1).unwrap();
        assert_eq!(state.exit(0, ProcessExit::success()).unwrap(), None);
        assert_eq!(state.exit(1, ProcessExit::success()).unwrap(), Some(0));
    }

    #[test]
    fn a_non_zero_exit_terminates_overall_immediately() {
        let state = RunnerState::new(2, FakeClock::new());
        state.register(0).unwrap();
        state.register(1).unwrap();
        assert_eq!(state.exit(0, ProcessExit::from_status(9)).unwrap(), Some(9));
    }

    #[test]
    fn a_non_zero_exit_interrupts_the_other_clients() {
        let state = RunnerState::new(2, FakeClock::new());
        state.register(0).unwrap();
        state.register(1).unwrap();
        state.exit(0, ProcessExit::from_status(9)).unwrap();
        assert_eq!(state.status(1), RunState::Interrupt);
    }

    #[test]
    fn interrupt_overrides_ordering() {
        let state = RunnerState::new(2, FakeClock::new());
        state.register(0).unwrap();
        state.register(1).unwrap();
        state.set_interrupted();
        assert_eq!(state.status(0), RunState::Interrupt);
        assert_eq!(state.status(1), RunState::Interrupt);
    }

    #[test]
    fn a_stale_connected_client_is_marked_lost() {
        let clock = FakeClock::new();
        let state = RunnerState::new(1, clock.clone());
        state.register(0).unwrap();
        clock.advance(Duration::from_millis(500));
        let lost = state.scan_liveness(Duration::from_millis(200));
        assert_eq!(lost, vec![0]);
    }

    #[test]
    fn the_first_write_logs_call_signals_job_started_only_once() {
        let state = RunnerState::<FakeClock>::new(1, FakeClock::new());
        assert!(state.note_log_write());
        assert!(!state.note_log_write());
    }
}
