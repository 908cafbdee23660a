use std::fs;
use std::path::PathBuf;

use serde_json::Value;
use tracing::debug;

/// Resolves the display title of an awarded item from a rules resource.
///
/// Legacy identifier messages only carry `(collection, key)`; the human
/// byline lives in rules files maintained by the profile service. A miss is
/// a normal outcome and turns the whole message into a parse failure.
pub trait AwardRules: Send + Sync {
    fn award_title(&self, collection: &str, key: &str) -> Option<String>;
}

/// File-backed rules: `<dir>/<collection>.json` holding an object keyed by
/// item, each item an object with a `title` string.
#[derive(Clone, Debug)]
pub struct FileAwardRules {
    dir: PathBuf,
}

impl FileAwardRules {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl AwardRules for FileAwardRules {
    fn award_title(&self, collection: &str, key: &str) -> Option<String> {
        // Both values come straight off the wire; never let them walk out
        // of the rules directory.
        if !is_plain_name(collection) || !is_plain_name(key) {
            debug!(collection, key, "rejecting unsafe award lookup");
            return None;
        }

        let path = self.dir.join(format!("{collection}.json"));
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "award rules not readable");
                return None;
            }
        };
        let root: Value = serde_json::from_str(&raw).ok()?;
        root.get(key)?
            .get("title")?
            .as_str()
            .map(str::to_string)
    }
}

fn is_plain_name(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('.')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::{AwardRules, FileAwardRules, is_plain_name};

    fn rules_with(collection: &str, body: &str) -> (tempfile::TempDir, FileAwardRules) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(format!("{collection}.json")), body).unwrap();
        let rules = FileAwardRules::new(dir.path());
        (dir, rules)
    }

    #[test]
    fn resolves_title_for_known_item() {
        let (_dir, rules) = rules_with(
            "armour",
            r#"{"samurai": {"title": "Way of the warrior", "desc": "ignored"}}"#,
        );
        assert_eq!(
            rules.award_title("armour", "samurai"),
            Some("Way of the warrior".to_string())
        );
    }

    #[test]
    fn missing_collection_or_key_is_a_miss() {
        let (_dir, rules) = rules_with("armour", r#"{"samurai": {"title": "x"}}"#);
        assert_eq!(rules.award_title("weapons", "samurai"), None);
        assert_eq!(rules.award_title("armour", "ninja"), None);
    }

    #[test]
    fn malformed_rules_file_is_a_miss() {
        let (_dir, rules) = rules_with("armour", "not json at all");
        assert_eq!(rules.award_title("armour", "samurai"), None);
    }

    #[test]
    fn path_escapes_are_rejected() {
        let (_dir, rules) = rules_with("armour", r#"{"samurai": {"title": "x"}}"#);
        assert_eq!(rules.award_title("../armour", "samurai"), None);
        assert_eq!(rules.award_title("armour", "a/b"), None);
        assert_eq!(rules.award_title(".hidden", "samurai"), None);
    }

    #[test]
    fn plain_name_filter() {
        assert!(is_plain_name("level-up_2"));
        assert!(!is_plain_name(""));
        assert!(!is_plain_name("a b"));
        assert!(!is_plain_name("a:b"));
    }
}
