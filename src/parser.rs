use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tracing::trace;

use crate::error::ParseError;
use crate::rules::AwardRules;
use crate::types::{ActionButton, Command, ControlCommand, Kind, Notification};

/// Turns one raw pipe line into a typed [`Command`].
///
/// Interpretation order is fixed: the six control literals (exact,
/// case-sensitive), then a JSON notification object, then the legacy
/// colon-delimited identifier grammar. Anything else is
/// [`ParseError::Unrecognized`] and gets dropped by the caller; the pipe
/// is one-way, so producers never see parse feedback.
pub struct Parser {
    rules: Arc<dyn AwardRules>,
    image_dir: PathBuf,
    award_sound: PathBuf,
}

impl Parser {
    pub fn new(
        rules: Arc<dyn AwardRules>,
        image_dir: impl Into<PathBuf>,
        award_sound: impl Into<PathBuf>,
    ) -> Self {
        Self {
            rules,
            image_dir: image_dir.into(),
            award_sound: award_sound.into(),
        }
    }

    pub fn parse(&self, line: &str) -> Result<Command, ParseError> {
        if let Some(ctrl) = ControlCommand::from_literal(line) {
            trace!(command = %ctrl, "parsed control literal");
            return Ok(Command::Control(ctrl));
        }
        if let Some(notification) = self.parse_json(line) {
            return Ok(Command::Notify(Box::new(notification)));
        }
        if let Some(notification) = self.parse_legacy(line) {
            return Ok(Command::Notify(Box::new(notification)));
        }
        Err(ParseError::Unrecognized)
    }

    fn parse_json(&self, line: &str) -> Option<Notification> {
        let raw: RawNotification = serde_json::from_str(line).ok()?;
        // Required fields must resolve to real text; everything optional
        // collapses empty strings to "absent".
        if raw.title.is_empty() || raw.byline.is_empty() {
            return None;
        }

        let mut buttons = Vec::new();
        buttons.extend(button_from(
            raw.button1_label,
            raw.button1_command,
            raw.button1_colour,
            raw.button1_hover,
        ));
        buttons.extend(button_from(
            raw.button2_label,
            raw.button2_command,
            raw.button2_colour,
            raw.button2_hover,
        ));

        Some(Notification {
            title: raw.title,
            byline: raw.byline,
            kind: Kind::from_tag(raw.kind.as_deref()),
            image: non_empty(raw.image).map(PathBuf::from),
            sound: non_empty(raw.sound).map(PathBuf::from),
            command: non_empty(raw.command),
            buttons,
            raw_payload: line.to_string(),
        })
    }

    fn parse_legacy(&self, line: &str) -> Option<Notification> {
        let segments: Vec<&str> = line.split(':').collect();
        match *segments.first()? {
            "level" if segments.len() >= 2 => {
                let level = segments[1];
                Some(Notification {
                    title: "New level!".to_string(),
                    byline: format!("You're now Level {level}"),
                    kind: Kind::Normal,
                    image: Some(self.image_dir.join("levels").join(format!("level-{level}.png"))),
                    sound: None,
                    command: None,
                    buttons: Vec::new(),
                    raw_payload: line.to_string(),
                })
            }
            first @ ("badges" | "environments" | "avatars") if segments.len() >= 3 => {
                let collection = segments[1];
                let key = segments[2];
                // A byline the rules cannot resolve makes the whole message
                // unrecognized.
                let byline = self.rules.award_title(collection, key)?;

                let title = match first {
                    "badges" => "New badge!",
                    "environments" => "New environment!",
                    _ => "New avatar!",
                };
                // Avatars keep an irregular on-disk layout where the file
                // name repeats the collection prefix.
                let image = if first == "avatars" {
                    self.image_dir
                        .join("avatars")
                        .join(collection)
                        .join(format!("{collection}_{key}.png"))
                } else {
                    self.image_dir.join(first).join(collection).join(format!("{key}.png"))
                };

                Some(Notification {
                    title: title.to_string(),
                    byline,
                    kind: Kind::Normal,
                    image: Some(image),
                    sound: Some(self.award_sound.clone()),
                    command: None,
                    buttons: Vec::new(),
                    raw_payload: line.to_string(),
                })
            }
            _ => None,
        }
    }
}

/// Wire shape of a JSON notification. Unknown fields are ignored for
/// forward compatibility.
#[derive(Debug, Deserialize)]
struct RawNotification {
    title: String,
    byline: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    sound: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    button1_label: Option<String>,
    #[serde(default)]
    button1_command: Option<String>,
    #[serde(default)]
    button1_colour: Option<String>,
    #[serde(default)]
    button1_hover: Option<String>,
    #[serde(default)]
    button2_label: Option<String>,
    #[serde(default)]
    button2_command: Option<String>,
    #[serde(default)]
    button2_colour: Option<String>,
    #[serde(default)]
    button2_hover: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// A button exists iff its label is present and non-empty.
fn button_from(
    label: Option<String>,
    command: Option<String>,
    colour: Option<String>,
    hover: Option<String>,
) -> Option<ActionButton> {
    non_empty(label).map(|label| ActionButton {
        label,
        command: non_empty(command),
        colour: non_empty(colour),
        hover_colour: non_empty(hover),
    })
}

#[cfg(test)]
mod tests {
    use super::Parser;
    use crate::error::ParseError;
    use crate::rules::AwardRules;
    use crate::types::{Command, ControlCommand, Kind};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Arc;

    struct StubRules(HashMap<(String, String), String>);

    impl StubRules {
        fn with(entries: &[(&str, &str, &str)]) -> Arc<Self> {
            Arc::new(Self(
                entries
                    .iter()
                    .map(|(c, k, t)| ((c.to_string(), k.to_string()), t.to_string()))
                    .collect(),
            ))
        }
    }

    impl AwardRules for StubRules {
        fn award_title(&self, collection: &str, key: &str) -> Option<String> {
            self.0
                .get(&(collection.to_string(), key.to_string()))
                .cloned()
        }
    }

    fn parser() -> Parser {
        Parser::new(
            StubRules::with(&[("armour", "samurai", "Way of the warrior")]),
            "/usr/share/notiq/images",
            "/usr/share/notiq/sounds/award.wav",
        )
    }

    fn parse_notification(parser: &Parser, line: &str) -> crate::types::Notification {
        match parser.parse(line) {
            Ok(Command::Notify(n)) => *n,
            other => panic!("expected a notification, got {other:?}"),
        }
    }

    #[test]
    fn recognizes_all_control_literals() {
        let parser = parser();
        for (line, expected) in [
            ("enable", ControlCommand::Enable),
            ("disable", ControlCommand::Disable),
            (
                "allow_world_notifications",
                ControlCommand::AllowWorldNotifications,
            ),
            (
                "disallow_world_notifications",
                ControlCommand::DisallowWorldNotifications,
            ),
            ("pause", ControlCommand::Pause),
            ("resume", ControlCommand::Resume),
        ] {
            assert_eq!(parser.parse(line), Ok(Command::Control(expected)));
        }
    }

    #[test]
    fn control_matching_is_exact() {
        let parser = parser();
        assert_eq!(parser.parse("Enable"), Err(ParseError::Unrecognized));
        assert_eq!(parser.parse("enable "), Err(ParseError::Unrecognized));
        assert_eq!(parser.parse(""), Err(ParseError::Unrecognized));
    }

    #[test]
    fn minimal_json_notification() {
        let parser = parser();
        let line = r#"{"title": "Hello", "byline": "world"}"#;
        let n = parse_notification(&parser, line);

        assert_eq!(n.title, "Hello");
        assert_eq!(n.byline, "world");
        assert_eq!(n.kind, Kind::Normal);
        assert_eq!(n.image, None);
        assert_eq!(n.sound, None);
        assert_eq!(n.command, None);
        assert!(n.buttons.is_empty());
        assert_eq!(n.raw_payload, line);
    }

    #[test]
    fn full_json_notification() {
        let parser = parser();
        let line = concat!(
            r#"{"title": "Update ready", "byline": "Click to install", "type": "small","#,
            r#" "image": "/tmp/u.png", "sound": "/tmp/u.wav", "command": "updater","#,
            r#" "button1_label": "Install", "button1_command": "updater --now","#,
            r##" "button1_colour": "#84cf44", "button1_hover": "#99de5d","##,
            r#" "button2_label": "Later"}"#
        );
        let n = parse_notification(&parser, line);

        assert_eq!(n.kind, Kind::Small);
        assert_eq!(n.image, Some(PathBuf::from("/tmp/u.png")));
        assert_eq!(n.sound, Some(PathBuf::from("/tmp/u.wav")));
        assert_eq!(n.command.as_deref(), Some("updater"));
        assert_eq!(n.buttons.len(), 2);
        assert_eq!(n.buttons[0].label, "Install");
        assert_eq!(n.buttons[0].command.as_deref(), Some("updater --now"));
        assert_eq!(n.buttons[0].colour.as_deref(), Some("#84cf44"));
        assert_eq!(n.buttons[0].hover_colour.as_deref(), Some("#99de5d"));
        assert_eq!(n.buttons[1].label, "Later");
        assert_eq!(n.buttons[1].command, None);
    }

    #[test]
    fn unknown_json_fields_are_ignored() {
        let parser = parser();
        let line = r#"{"title": "T", "byline": "B", "urgency": 2, "future_field": [1, 2]}"#;
        let n = parse_notification(&parser, line);
        assert_eq!(n.title, "T");
    }

    #[test]
    fn empty_optional_strings_mean_absent() {
        let parser = parser();
        let line = r#"{"title": "T", "byline": "B", "image": "", "command": "", "sound": ""}"#;
        let n = parse_notification(&parser, line);
        assert_eq!(n.image, None);
        assert_eq!(n.command, None);
        assert_eq!(n.sound, None);
    }

    #[test]
    fn button_fields_without_a_label_are_dropped() {
        let parser = parser();
        let line = r#"{"title": "T", "byline": "B", "button1_command": "x", "button2_label": ""}"#;
        let n = parse_notification(&parser, line);
        assert!(n.buttons.is_empty());
    }

    #[test]
    fn json_missing_required_fields_is_unrecognized() {
        let parser = parser();
        assert_eq!(
            parser.parse(r#"{"title": "only a title"}"#),
            Err(ParseError::Unrecognized)
        );
        assert_eq!(
            parser.parse(r#"{"title": "", "byline": "B"}"#),
            Err(ParseError::Unrecognized)
        );
        assert_eq!(parser.parse(r#"[1, 2, 3]"#), Err(ParseError::Unrecognized));
    }

    #[test]
    fn legacy_level_identifier() {
        let parser = parser();
        let n = parse_notification(&parser, "level:5");

        assert_eq!(n.title, "New level!");
        assert_eq!(n.byline, "You're now Level 5");
        assert_eq!(
            n.image,
            Some(PathBuf::from("/usr/share/notiq/images/levels/level-5.png"))
        );
        assert_eq!(n.sound, None);
        assert_eq!(n.raw_payload, "level:5");
    }

    #[test]
    fn legacy_level_needs_a_second_segment() {
        let parser = parser();
        assert_eq!(parser.parse("level"), Err(ParseError::Unrecognized));
    }

    #[test]
    fn legacy_badge_resolves_byline_from_rules() {
        let parser = parser();
        let n = parse_notification(&parser, "badges:armour:samurai");

        assert_eq!(n.title, "New badge!");
        assert_eq!(n.byline, "Way of the warrior");
        assert_eq!(
            n.image,
            Some(PathBuf::from(
                "/usr/share/notiq/images/badges/armour/samurai.png"
            ))
        );
        assert_eq!(
            n.sound,
            Some(PathBuf::from("/usr/share/notiq/sounds/award.wav"))
        );
    }

    #[test]
    fn legacy_environment_title() {
        let parser = Parser::new(
            StubRules::with(&[("spaces", "dojo", "The dojo")]),
            "/img",
            "/award.wav",
        );
        let n = parse_notification(&parser, "environments:spaces:dojo");
        assert_eq!(n.title, "New environment!");
        assert_eq!(n.image, Some(PathBuf::from("/img/environments/spaces/dojo.png")));
    }

    #[test]
    fn legacy_avatar_uses_irregular_image_path() {
        let parser = Parser::new(
            StubRules::with(&[("outfits", "pilot", "Sky pilot")]),
            "/img",
            "/award.wav",
        );
        let n = parse_notification(&parser, "avatars:outfits:pilot");
        assert_eq!(n.title, "New avatar!");
        assert_eq!(
            n.image,
            Some(PathBuf::from("/img/avatars/outfits/outfits_pilot.png"))
        );
    }

    #[test]
    fn legacy_award_lookup_miss_is_unrecognized() {
        let parser = parser();
        assert_eq!(
            parser.parse("badges:armour:unknown"),
            Err(ParseError::Unrecognized)
        );
        assert_eq!(
            parser.parse("badges:armour"),
            Err(ParseError::Unrecognized)
        );
    }

    #[test]
    fn arbitrary_text_is_unrecognized() {
        let parser = parser();
        assert_eq!(
            parser.parse("hello there"),
            Err(ParseError::Unrecognized)
        );
        assert_eq!(parser.parse("levels:5"), Err(ParseError::Unrecognized));
    }
}
