use std::fmt;

use thiserror::Error;

pub const ROOM_NAME_MAX_CHARS: usize = 64;
pub const DISPLAY_NAME_MAX_CHARS: usize = 48;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    #[error("room name must not be empty")]
    EmptyRoomName,
    #[error("room name must be at most {max} characters, got {actual}")]
    RoomNameTooLong { max: usize, actual: usize },
    #[error("room name may only contain letters, digits, '-', '_' and '.'")]
    RoomNameInvalidCharacter,
    #[error("display name must not be empty")]
    EmptyDisplayName,
    #[error("display name must be at most {max} characters, got {actual}")]
    DisplayNameTooLong { max: usize, actual: usize },
    #[error("display name must not contain control characters")]
    DisplayNameInvalidCharacter,
}

/// Room identifier as typed by the user; trimmed and restricted to
/// characters the conferencing provider accepts in a room URL segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomName(String);

impl RoomName {
    pub fn parse(input: &str) -> Result<Self, ParameterError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ParameterError::EmptyRoomName);
        }
        let actual = trimmed.chars().count();
        if actual > ROOM_NAME_MAX_CHARS {
            return Err(ParameterError::RoomNameTooLong {
                max: ROOM_NAME_MAX_CHARS,
                actual,
            });
        }
        let permitted = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
        if !trimmed.chars().all(permitted) {
            return Err(ParameterError::RoomNameInvalidCharacter);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name shown to other participants. Unicode is fine; control characters
/// and blank values are not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayName(String);

impl DisplayName {
    pub fn parse(input: &str) -> Result<Self, ParameterError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ParameterError::EmptyDisplayName);
        }
        let actual = trimmed.chars().count();
        if actual > DISPLAY_NAME_MAX_CHARS {
            return Err(ParameterError::DisplayNameTooLong {
                max: DISPLAY_NAME_MAX_CHARS,
                actual,
            });
        }
        if trimmed.chars().any(char::is_control) {
            return Err(ParameterError::DisplayNameInvalidCharacter);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartMuted {
    pub audio: bool,
    pub video: bool,
}

/// Everything needed to instantiate the embedded widget once. Changing any
/// field means tearing the current widget down and creating a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingParameters {
    pub room: RoomName,
    pub display_name: DisplayName,
    pub domain: String,
    pub start_muted: StartMuted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_name_trims_surrounding_whitespace() {
        let room = RoomName::parse("  weekly-sync  ").expect("valid room");
        assert_eq!(room.as_str(), "weekly-sync");
    }

    #[test]
    fn room_name_rejects_empty_and_whitespace_only() {
        assert_eq!(RoomName::parse(""), Err(ParameterError::EmptyRoomName));
        assert_eq!(RoomName::parse("   "), Err(ParameterError::EmptyRoomName));
    }

    #[test]
    fn room_name_rejects_disallowed_characters() {
        assert_eq!(
            RoomName::parse("team room"),
            Err(ParameterError::RoomNameInvalidCharacter)
        );
        assert_eq!(
            RoomName::parse("room/42"),
            Err(ParameterError::RoomNameInvalidCharacter)
        );
    }

    #[test]
    fn room_name_enforces_length_cap() {
        let long = "r".repeat(ROOM_NAME_MAX_CHARS + 1);
        assert_eq!(
            RoomName::parse(&long),
            Err(ParameterError::RoomNameTooLong {
                max: ROOM_NAME_MAX_CHARS,
                actual: ROOM_NAME_MAX_CHARS + 1,
            })
        );
        assert!(RoomName::parse(&"r".repeat(ROOM_NAME_MAX_CHARS)).is_ok());
    }

    #[test]
    fn display_name_accepts_unicode() {
        let name = DisplayName::parse("Åsa Lindqvist").expect("valid name");
        assert_eq!(name.as_str(), "Åsa Lindqvist");
    }

    #[test]
    fn display_name_rejects_control_characters() {
        assert_eq!(
            DisplayName::parse("line\nbreak"),
            Err(ParameterError::DisplayNameInvalidCharacter)
        );
    }

    #[test]
    fn display_name_counts_chars_not_bytes() {
        let name = "ö".repeat(DISPLAY_NAME_MAX_CHARS);
        assert!(DisplayName::parse(&name).is_ok());
    }
}
