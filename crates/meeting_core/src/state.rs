use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the embedded conference currently stands, as far as the widget has
/// told us. Purely in-memory; a remount starts over from `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    Left,
    Closed,
    Error,
    Failed,
}

impl ConnectionState {
    /// Whether the lifecycle may move from `self` to `next` on its own.
    /// Self-transitions are permitted no-ops. An explicit restart or stop
    /// does not consult this table.
    pub fn can_transition(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        if self == next {
            return true;
        }
        match (self, next) {
            (Connecting, Connected | Reconnecting | Left | Closed | Error) => true,
            (Connected, Reconnecting | Left | Closed | Error) => true,
            (Reconnecting, Connected | Failed | Left | Closed | Error) => true,
            (Left, Closed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Left => "left",
            ConnectionState::Closed => "closed",
            ConnectionState::Error => "error",
            ConnectionState::Failed => "failed",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionState::*;

    #[test]
    fn initial_connection_can_fail_or_succeed() {
        assert!(Connecting.can_transition(Connected));
        assert!(Connecting.can_transition(Reconnecting));
        assert!(Connecting.can_transition(Error));
    }

    #[test]
    fn reconnecting_resolves_to_connected_or_failed() {
        assert!(Reconnecting.can_transition(Connected));
        assert!(Reconnecting.can_transition(Failed));
        assert!(!Connected.can_transition(Failed));
        assert!(!Connecting.can_transition(Failed));
    }

    #[test]
    fn failed_and_closed_are_terminal() {
        for next in [Connecting, Connected, Reconnecting, Left, Error] {
            assert!(!Failed.can_transition(next));
            assert!(!Closed.can_transition(next));
        }
        assert!(!Failed.can_transition(Closed));
    }

    #[test]
    fn error_state_waits_for_explicit_restart() {
        for next in [Connecting, Connected, Reconnecting, Left, Closed, Failed] {
            assert!(!Error.can_transition(next));
        }
    }

    #[test]
    fn leaving_only_progresses_to_closed() {
        assert!(Left.can_transition(Closed));
        assert!(!Left.can_transition(Reconnecting));
        assert!(!Left.can_transition(Connected));
    }

    #[test]
    fn self_transitions_are_tolerated() {
        for state in [Connecting, Connected, Reconnecting, Left, Closed, Error, Failed] {
            assert!(state.can_transition(state));
        }
    }

    #[test]
    fn states_display_lowercase() {
        assert_eq!(Reconnecting.to_string(), "reconnecting");
        assert_eq!(Failed.to_string(), "failed");
    }
}
