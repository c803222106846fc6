//! User-facing status text for each lifecycle state.

use crate::state::ConnectionState;

/// One line describing `state` to the person in the room, or `None` when
/// the conference is up and the widget speaks for itself.
pub fn status_line(state: ConnectionState) -> Option<&'static str> {
    match state {
        ConnectionState::Connecting => Some("Connecting to the meeting..."),
        ConnectionState::Connected => None,
        ConnectionState::Reconnecting => Some("Connection lost, trying to reconnect..."),
        ConnectionState::Left => Some("You have left the meeting."),
        ConnectionState::Closed => Some("The meeting is over. You can close this page."),
        ConnectionState::Error => Some("The meeting could not be loaded."),
        ConnectionState::Failed => {
            Some("Reconnecting did not work. Refresh the page to try again.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_needs_no_status_line() {
        assert_eq!(status_line(ConnectionState::Connected), None);
    }

    #[test]
    fn every_other_state_has_a_line() {
        for state in [
            ConnectionState::Connecting,
            ConnectionState::Reconnecting,
            ConnectionState::Left,
            ConnectionState::Closed,
            ConnectionState::Error,
            ConnectionState::Failed,
        ] {
            assert!(status_line(state).is_some(), "missing line for {state}");
        }
    }

    #[test]
    fn failed_line_suggests_a_manual_retry() {
        let line = status_line(ConnectionState::Failed).expect("line");
        assert!(line.contains("Refresh"));
    }
}
