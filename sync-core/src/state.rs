//! Connection state machine for Bastion.
//!
//! This module provides a pure, side-effect-free state machine for tracking
//! backend reachability. The state machine takes events as input and produces
//! a new state plus a list of actions to execute.
//!
//! The actual I/O (probing the backend, running timers, notifying listeners,
//! draining the operation queue) is performed by sync-client, not by this
//! module. This enables instant unit testing without timers or mocks.

use std::time::Duration;

/// Delay before the first reconnection attempt.
pub const BASE_DELAY: Duration = Duration::from_millis(2000);

/// Consecutive failed reconnection attempts before automatic retries stop.
pub const MAX_RETRIES: u32 = 3;

/// Bounded exponential backoff for reconnection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before attempt 1; each later attempt doubles it.
    pub base_delay: Duration,
    /// Attempts allowed before giving up until an external trigger.
    pub max_retries: u32,
}

impl RetryPolicy {
    /// Create a policy.
    pub fn new(base_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            max_retries,
        }
    }

    /// Delay before the given (1-based) attempt.
    ///
    /// Formula: base_delay * 2^(attempt - 1). With the defaults this is
    /// 2s, 4s, 8s.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(BASE_DELAY, MAX_RETRIES)
    }
}

/// Connectivity state - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    connected: bool,
    retry_count: u32,
    policy: RetryPolicy,
}

impl ConnectionState {
    /// Create a state machine in the disconnected state with no retry pending.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            connected: false,
            retry_count: 0,
            policy,
        }
    }

    /// Create a state machine that starts out believing the backend is reachable.
    pub fn connected(policy: RetryPolicy) -> Self {
        Self {
            connected: true,
            retry_count: 0,
            policy,
        }
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (sync-client)
    /// is responsible for executing the returned actions in order.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match event {
            Event::ConnectivityChanged { connected: true } | Event::ProbeSucceeded => {
                self.become_connected()
            }
            Event::ConnectivityChanged { connected: false } => self.become_disconnected(),
            Event::ProbeFailed if !self.connected => self.schedule_retry(),
            Event::RetryRequested if !self.connected => {
                let reset = Self {
                    retry_count: 0,
                    ..self
                };
                let (state, mut actions) = reset.schedule_retry();
                actions.insert(0, Action::CancelRetryTimer);
                (state, actions)
            }
            // Probe results and retry requests are stale once connected.
            Event::ProbeFailed | Event::RetryRequested => (self, vec![]),
        }
    }

    fn become_connected(self) -> (Self, Vec<Action>) {
        if self.connected {
            return (self, vec![]);
        }
        (
            Self {
                connected: true,
                retry_count: 0,
                ..self
            },
            vec![
                Action::CancelRetryTimer,
                Action::Notify { connected: true },
                Action::DrainQueue,
            ],
        )
    }

    fn become_disconnected(self) -> (Self, Vec<Action>) {
        if !self.connected {
            return (self, vec![]);
        }
        let (state, mut actions) = Self {
            connected: false,
            ..self
        }
        .schedule_retry();
        actions.insert(0, Action::Notify { connected: false });
        (state, actions)
    }

    fn schedule_retry(self) -> (Self, Vec<Action>) {
        if self.retry_count >= self.policy.max_retries {
            return (
                self,
                vec![Action::RetriesExhausted {
                    attempts: self.retry_count,
                }],
            );
        }
        let attempt = self.retry_count + 1;
        (
            Self {
                retry_count: attempt,
                ..self
            },
            vec![Action::StartRetryTimer {
                attempt,
                delay: self.policy.delay_for(attempt),
            }],
        )
    }

    /// Check if the backend is believed reachable.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Consecutive failed reconnection attempts since the last success.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// The backoff policy in effect.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

/// Events that can occur in the connectivity lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Someone asserted the backend is (un)reachable. Edge-triggered:
    /// repeating the current value does nothing.
    ConnectivityChanged {
        /// The asserted state.
        connected: bool,
    },
    /// A reconnection probe reached the backend.
    ProbeSucceeded,
    /// A reconnection probe failed.
    ProbeFailed,
    /// External request to restart the retry cycle from attempt 1.
    RetryRequested,
}

/// Actions to be executed by the sync-client.
///
/// These are instructions, not side effects. The sync-client interprets
/// these and performs the actual I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Invoke every listener with the new state, in registration order.
    Notify {
        /// The state to report.
        connected: bool,
    },
    /// Cancel any outstanding reconnection timer.
    CancelRetryTimer,
    /// Replace any outstanding timer with one that probes after `delay`.
    StartRetryTimer {
        /// Which attempt this is (1-based).
        attempt: u32,
        /// Delay before probing.
        delay: Duration,
    },
    /// Run queued operations until empty or disconnected.
    DrainQueue,
    /// The retry budget is spent; nothing further is scheduled.
    RetriesExhausted {
        /// How many attempts were made.
        attempts: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> ConnectionState {
        ConnectionState::connected(RetryPolicy::default())
    }

    fn disconnected() -> ConnectionState {
        ConnectionState::new(RetryPolicy::default())
    }

    fn timer_delays(actions: &[Action]) -> Vec<Duration> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::StartRetryTimer { delay, .. } => Some(*delay),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn starts_disconnected() {
        let state = ConnectionState::default();
        assert!(!state.is_connected());
        assert_eq!(state.retry_count(), 0);
    }

    #[test]
    fn connect_resets_retries_then_notifies_then_drains() {
        let (state, _) = connected().on_event(Event::ConnectivityChanged { connected: false });
        let (state, _) = state.on_event(Event::ProbeFailed);
        assert_eq!(state.retry_count(), 2);

        let (state, actions) = state.on_event(Event::ProbeSucceeded);

        assert!(state.is_connected());
        assert_eq!(state.retry_count(), 0);
        assert_eq!(
            actions,
            vec![
                Action::CancelRetryTimer,
                Action::Notify { connected: true },
                Action::DrainQueue,
            ]
        );
    }

    #[test]
    fn same_state_is_a_no_op() {
        let (state, actions) = connected().on_event(Event::ConnectivityChanged { connected: true });
        assert!(state.is_connected());
        assert!(actions.is_empty());

        let (state, actions) =
            disconnected().on_event(Event::ConnectivityChanged { connected: false });
        assert!(!state.is_connected());
        assert!(actions.is_empty());
    }

    #[test]
    fn same_state_does_not_reset_retry_count() {
        let (state, _) = connected().on_event(Event::ConnectivityChanged { connected: false });
        assert_eq!(state.retry_count(), 1);

        let (state, actions) = state.on_event(Event::ConnectivityChanged { connected: false });
        assert_eq!(state.retry_count(), 1);
        assert!(actions.is_empty());
    }

    #[test]
    fn disconnect_notifies_then_schedules_first_retry() {
        let (state, actions) = connected().on_event(Event::ConnectivityChanged { connected: false });

        assert!(!state.is_connected());
        assert_eq!(state.retry_count(), 1);
        assert_eq!(
            actions,
            vec![
                Action::Notify { connected: false },
                Action::StartRetryTimer {
                    attempt: 1,
                    delay: Duration::from_millis(2000),
                },
            ]
        );
    }

    #[test]
    fn backoff_sequence_is_2_4_8_seconds_then_stops() {
        let (state, first) = connected().on_event(Event::ConnectivityChanged { connected: false });
        let (state, second) = state.on_event(Event::ProbeFailed);
        let (state, third) = state.on_event(Event::ProbeFailed);
        let (state, fourth) = state.on_event(Event::ProbeFailed);

        assert_eq!(timer_delays(&first), vec![Duration::from_millis(2000)]);
        assert_eq!(timer_delays(&second), vec![Duration::from_millis(4000)]);
        assert_eq!(timer_delays(&third), vec![Duration::from_millis(8000)]);
        assert!(timer_delays(&fourth).is_empty());
        assert_eq!(fourth, vec![Action::RetriesExhausted { attempts: 3 }]);
        assert_eq!(state.retry_count(), 3);
    }

    #[test]
    fn probe_failure_while_connected_is_ignored() {
        let (state, actions) = connected().on_event(Event::ProbeFailed);
        assert!(state.is_connected());
        assert!(actions.is_empty());
    }

    #[test]
    fn retry_request_restarts_cycle_after_exhaustion() {
        let mut state = connected();
        for event in [
            Event::ConnectivityChanged { connected: false },
            Event::ProbeFailed,
            Event::ProbeFailed,
            Event::ProbeFailed,
        ] {
            state = state.on_event(event).0;
        }
        assert_eq!(state.retry_count(), 3);

        let (state, actions) = state.on_event(Event::RetryRequested);

        assert_eq!(state.retry_count(), 1);
        assert_eq!(
            actions,
            vec![
                Action::CancelRetryTimer,
                Action::StartRetryTimer {
                    attempt: 1,
                    delay: Duration::from_millis(2000),
                },
            ]
        );
    }

    #[test]
    fn retry_request_while_connected_is_ignored() {
        let (state, actions) = connected().on_event(Event::RetryRequested);
        assert!(state.is_connected());
        assert!(actions.is_empty());
    }

    #[test]
    fn initial_disconnected_state_can_retry() {
        // Never connected: the first probe failure still has a full budget.
        let (state, actions) = disconnected().on_event(Event::ProbeFailed);
        assert_eq!(state.retry_count(), 1);
        assert_eq!(timer_delays(&actions), vec![Duration::from_millis(2000)]);
    }

    #[test]
    fn custom_policy_is_respected() {
        let policy = RetryPolicy::new(Duration::from_millis(100), 1);
        let (state, actions) = ConnectionState::connected(policy)
            .on_event(Event::ConnectivityChanged { connected: false });
        assert_eq!(timer_delays(&actions), vec![Duration::from_millis(100)]);

        let (_, actions) = state.on_event(Event::ProbeFailed);
        assert_eq!(actions, vec![Action::RetriesExhausted { attempts: 1 }]);
    }

    #[test]
    fn delay_for_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(8000));
        // Large attempt numbers must not panic.
        let _ = policy.delay_for(200);
    }
}
