use std::fmt::{self, Display};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Classification tag of a notification.
///
/// The tag is free-form on the wire (`"type"` field); the known values get
/// their own variants so downstream code matches on the enum instead of
/// re-comparing strings. An absent tag means [`Kind::Normal`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Kind {
    Normal,
    Small,
    World,
    Other(String),
}

impl Kind {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            None | Some("") => Self::Normal,
            Some(tag) => Self::from(tag.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Normal => "normal",
            Self::Small => "small",
            Self::World => "world",
            Self::Other(tag) => tag,
        }
    }

    pub fn is_world(&self) -> bool {
        matches!(self, Self::World)
    }
}

impl From<String> for Kind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "normal" => Self::Normal,
            "small" => Self::Small,
            "world" => Self::World,
            _ => Self::Other(tag),
        }
    }
}

impl From<Kind> for String {
    fn from(kind: Kind) -> Self {
        kind.as_str().to_string()
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the at-most-two action buttons a notification may carry.
///
/// The colours are raw colour strings straight off the wire; interpreting
/// them is the presentation sink's business.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ActionButton {
    pub label: String,
    pub command: Option<String>,
    pub colour: Option<String>,
    pub hover_colour: Option<String>,
}

/// A single alert to present, fully resolved by the parser.
///
/// Immutable after construction: the queue owns it until it has been shown
/// and dismissed, then it is dropped. `raw_payload` keeps the original wire
/// line for side-channel use by the sink.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub byline: String,
    pub kind: Kind,
    pub image: Option<PathBuf>,
    pub sound: Option<PathBuf>,
    pub command: Option<String>,
    pub buttons: Vec<ActionButton>,
    pub raw_payload: String,
}

impl Notification {
    /// The fixed registration nag injected when the queue drains while the
    /// user is online but not registered.
    ///
    /// Kept out of the `world` kind on purpose: reminders bypass the world
    /// filter at injection, and a world-kinded one could still be displayed
    /// with world notifications disallowed.
    pub fn registration_reminder(image_dir: &Path) -> Self {
        Self {
            title: "Join the World!".to_string(),
            byline: "Register your account to save your progress".to_string(),
            kind: Kind::Other("register-reminder".to_string()),
            image: Some(image_dir.join("world-register.png")),
            sound: None,
            command: Some("world-registration".to_string()),
            buttons: Vec::new(),
            raw_payload: "register-reminder".to_string(),
        }
    }
}

/// A directive that alters scheduler or preference state instead of
/// requesting a display. Carries no payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlCommand {
    Enable,
    Disable,
    AllowWorldNotifications,
    DisallowWorldNotifications,
    Pause,
    Resume,
}

impl ControlCommand {
    /// Exact, case-sensitive match against the six wire literals.
    pub fn from_literal(line: &str) -> Option<Self> {
        match line {
            "enable" => Some(Self::Enable),
            "disable" => Some(Self::Disable),
            "allow_world_notifications" => Some(Self::AllowWorldNotifications),
            "disallow_world_notifications" => Some(Self::DisallowWorldNotifications),
            "pause" => Some(Self::Pause),
            "resume" => Some(Self::Resume),
            _ => None,
        }
    }

    pub fn as_literal(self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::AllowWorldNotifications => "allow_world_notifications",
            Self::DisallowWorldNotifications => "disallow_world_notifications",
            Self::Pause => "pause",
            Self::Resume => "resume",
        }
    }
}

impl Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_literal())
    }
}

/// What one wire line parses into: either a control directive or a fully
/// populated notification. Decided once by the parser; nothing downstream
/// re-inspects the raw line.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Control(ControlCommand),
    Notify(Box<Notification>),
}

#[cfg(test)]
mod tests {
    use super::{ControlCommand, Kind};
    use std::path::Path;

    #[test]
    fn kind_maps_known_tags() {
        assert_eq!(Kind::from_tag(Some("small")), Kind::Small);
        assert_eq!(Kind::from_tag(Some("world")), Kind::World);
        assert_eq!(Kind::from_tag(None), Kind::Normal);
        assert_eq!(Kind::from_tag(Some("")), Kind::Normal);
        assert_eq!(
            Kind::from_tag(Some("register-reminder")),
            Kind::Other("register-reminder".to_string())
        );
    }

    #[test]
    fn kind_round_trips_through_string() {
        for tag in ["normal", "small", "world", "anything-else"] {
            let kind = Kind::from(tag.to_string());
            assert_eq!(String::from(kind), tag);
        }
    }

    #[test]
    fn control_literals_are_case_sensitive() {
        assert_eq!(
            ControlCommand::from_literal("pause"),
            Some(ControlCommand::Pause)
        );
        assert_eq!(ControlCommand::from_literal("Pause"), None);
        assert_eq!(ControlCommand::from_literal(" pause"), None);
    }

    #[test]
    fn control_literals_round_trip() {
        for cmd in [
            ControlCommand::Enable,
            ControlCommand::Disable,
            ControlCommand::AllowWorldNotifications,
            ControlCommand::DisallowWorldNotifications,
            ControlCommand::Pause,
            ControlCommand::Resume,
        ] {
            assert_eq!(ControlCommand::from_literal(cmd.as_literal()), Some(cmd));
        }
    }

    #[test]
    fn reminder_is_never_world_kinded() {
        let reminder = super::Notification::registration_reminder(Path::new("/usr/share/img"));
        assert!(!reminder.kind.is_world());
        assert_eq!(reminder.raw_payload, "register-reminder");
    }
}
