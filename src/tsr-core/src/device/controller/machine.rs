// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Connection state machine.
//!
//! The machine is pure: it consumes [`ConnectionEvent`]s and answers with the
//! [`ConnectionAction`]s the transport driver has to perform. Timers and
//! sockets live in the driver, which keeps every transition testable
//! without I/O.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Default delay before a reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Events that can trigger state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Initial connect requested by the owner.
    ConnectRequested,
    /// Connection attempt succeeded.
    Established,
    /// Socket error, close or end; also a failed attempt.
    Lost(String),
    /// Connection attempt exceeded its timeout.
    AttemptTimedOut,
    /// The scheduled reconnect delay elapsed.
    ReconnectTimerFired,
    /// Owner is shutting the connection down for good.
    DisposeRequested,
}

/// Side effects requested from the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Start a connection attempt (bounded by the driver's timeout).
    Connect,
    /// Arm the single reconnect timer.
    ScheduleReconnect(Duration),
    /// Forcibly drop the socket.
    TearDown,
    /// Close the socket gracefully, forcing destruction if that stalls.
    CloseGracefully,
    /// Report a connected/disconnected transition upward.
    Notify(bool),
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    phase: ConnectionPhase,
    disposed: bool,
    reconnect_pending: bool,
    reconnect_delay: Duration,
    transition_count: u64,
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY)
    }
}

impl ConnectionMachine {
    pub fn new(reconnect_delay: Duration) -> Self {
        Self {
            phase: ConnectionPhase::Disconnected,
            disposed: false,
            reconnect_pending: false,
            reconnect_delay,
            transition_count: 0,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn is_connected(&self) -> bool {
        self.phase == ConnectionPhase::Connected
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    /// Get the number of phase transitions that have occurred.
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Process an event and return the actions the driver must perform.
    pub fn process_event(&mut self, event: ConnectionEvent) -> Vec<ConnectionAction> {
        use ConnectionAction as A;
        use ConnectionEvent as E;
        use ConnectionPhase as P;

        if self.disposed && event != E::DisposeRequested {
            // Late socket callbacks after dispose only need cleanup.
            return match event {
                E::Established => vec![A::TearDown],
                _ => Vec::new(),
            };
        }

        match (self.phase, event) {
            (P::Disconnected, E::ConnectRequested) => {
                self.set_phase(P::Connecting);
                vec![A::Connect]
            }
            (_, E::ConnectRequested) => Vec::new(),

            (P::Connecting, E::Established) => {
                self.set_phase(P::Connected);
                vec![A::Notify(true)]
            }
            // Stray success while not connecting: drop that socket.
            (_, E::Established) => vec![A::TearDown],

            (P::Connected, E::Lost(_)) => {
                self.set_phase(P::Disconnected);
                let mut actions = vec![A::TearDown, A::Notify(false)];
                actions.extend(self.schedule_reconnect());
                actions
            }
            (P::Connecting, E::Lost(_)) => {
                self.set_phase(P::Disconnected);
                let mut actions = vec![A::TearDown];
                actions.extend(self.schedule_reconnect());
                actions
            }
            (P::Disconnected, E::Lost(_)) => self.schedule_reconnect().into_iter().collect(),

            (P::Connecting, E::AttemptTimedOut) => {
                self.set_phase(P::Disconnected);
                let mut actions = vec![A::TearDown];
                actions.extend(self.schedule_reconnect());
                actions
            }
            (_, E::AttemptTimedOut) => Vec::new(),

            (phase, E::ReconnectTimerFired) => {
                self.reconnect_pending = false;
                if phase == P::Disconnected {
                    self.set_phase(P::Connecting);
                    vec![A::Connect]
                } else {
                    Vec::new()
                }
            }

            (phase, E::DisposeRequested) => {
                if self.disposed {
                    return Vec::new();
                }
                self.disposed = true;
                self.reconnect_pending = false;
                self.set_phase(P::Disconnected);
                let mut actions = vec![A::CloseGracefully];
                if phase == P::Connected {
                    actions.push(A::Notify(false));
                }
                actions
            }
        }
    }

    fn schedule_reconnect(&mut self) -> Option<ConnectionAction> {
        if self.disposed || self.reconnect_pending {
            return None;
        }
        self.reconnect_pending = true;
        Some(ConnectionAction::ScheduleReconnect(self.reconnect_delay))
    }

    fn set_phase(&mut self, phase: ConnectionPhase) {
        if self.phase != phase {
            self.phase = phase;
            self.transition_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionAction as A;
    use ConnectionEvent as E;

    fn connected() -> ConnectionMachine {
        let mut machine = ConnectionMachine::new(Duration::from_secs(5));
        machine.process_event(E::ConnectRequested);
        machine.process_event(E::Established);
        machine
    }

    fn reconnects(actions: &[ConnectionAction]) -> usize {
        actions
            .iter()
            .filter(|a| matches!(a, A::ScheduleReconnect(_)))
            .count()
    }

    #[test]
    fn test_connect_flow() {
        let mut machine = ConnectionMachine::default();
        assert_eq!(machine.process_event(E::ConnectRequested), vec![A::Connect]);
        assert_eq!(machine.phase(), ConnectionPhase::Connecting);

        assert_eq!(machine.process_event(E::Established), vec![A::Notify(true)]);
        assert!(machine.is_connected());
        assert_eq!(machine.transition_count(), 2);
    }

    #[test]
    fn test_double_error_schedules_single_reconnect() {
        let mut machine = connected();

        let first = machine.process_event(E::Lost("ECONNRESET".into()));
        assert!(first.contains(&A::Notify(false)));
        assert_eq!(reconnects(&first), 1);
        assert_eq!(machine.phase(), ConnectionPhase::Disconnected);

        let second = machine.process_event(E::Lost("close".into()));
        assert_eq!(reconnects(&second), 0);
        assert!(!second.contains(&A::Notify(false)));
        assert!(machine.reconnect_pending());
    }

    #[test]
    fn test_timer_fires_new_attempt() {
        let mut machine = connected();
        machine.process_event(E::Lost("reset".into()));

        assert_eq!(machine.process_event(E::ReconnectTimerFired), vec![A::Connect]);
        assert!(!machine.reconnect_pending());
        assert_eq!(machine.phase(), ConnectionPhase::Connecting);
    }

    #[test]
    fn test_attempt_timeout_tears_down_and_reschedules() {
        let mut machine = ConnectionMachine::new(Duration::from_millis(5_000));
        machine.process_event(E::ConnectRequested);

        let actions = machine.process_event(E::AttemptTimedOut);
        assert_eq!(
            actions,
            vec![A::TearDown, A::ScheduleReconnect(Duration::from_millis(5_000))]
        );
    }

    #[test]
    fn test_dispose_suppresses_reconnect() {
        let mut machine = connected();

        let actions = machine.process_event(E::DisposeRequested);
        assert_eq!(actions, vec![A::CloseGracefully, A::Notify(false)]);
        assert!(machine.is_disposed());

        assert!(machine.process_event(E::Lost("close".into())).is_empty());
        assert!(machine.process_event(E::ReconnectTimerFired).is_empty());
        assert!(machine.process_event(E::ConnectRequested).is_empty());
        assert!(machine.process_event(E::DisposeRequested).is_empty());
    }
}
