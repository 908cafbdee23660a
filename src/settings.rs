use std::path::{Path, PathBuf};
use std::time::Duration;

use humantime::{format_duration, parse_duration};
use serde::Deserialize;
use serde_with::{DeserializeAs, SerializeAs, serde_as};

use crate::Result;
use crate::error::SettingsError;
use crate::scheduler::DEFAULT_QUEUE_CAP;

const QUEUE_CAPACITY_BOUNDS: std::ops::RangeInclusive<usize> = 1..=500;

/// Validated runtime settings, layered from an optional TOML file and
/// `NOTIQ__*` environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub pipe_path: PathBuf,
    pub intake_capacity: usize,
    pub queue_capacity: usize,
    pub prefs_path: PathBuf,
    pub display: DisplaySettings,
    pub media: MediaSettings,
    pub world: WorldSettings,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub appname: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MediaSettings {
    pub image_dir: PathBuf,
    pub award_sound: PathBuf,
    pub rules_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct WorldSettings {
    pub probe_addr: String,
    pub probe_timeout: Duration,
    pub profile_path: PathBuf,
}

impl Settings {
    pub fn from_env_and_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        let path = path.as_ref();
        builder = builder.add_source(::config::File::from(path).required(false));
        builder = builder.add_source(
            ::config::Environment::with_prefix("NOTIQ")
                .separator("__")
                .try_parsing(true),
        );

        let raw: RawConfig = builder
            .build()
            .map_err(|err| SettingsError::Read(err.to_string()))?
            .try_deserialize()
            .map_err(|err| SettingsError::Parse(err.to_string()))?;

        raw.validate_and_build()
    }

    /// Default config file location, `~/.config/notiq/config.toml` on most
    /// systems.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("notiq").join("config.toml"))
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    channel: RawChannel,
    #[serde(default)]
    display: RawDisplay,
    #[serde(default)]
    media: RawMedia,
    #[serde(default)]
    world: RawWorld,
    #[serde(default)]
    prefs: RawPrefs,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct RawChannel {
    pipe: Option<PathBuf>,
    #[serde(default = "default_intake_capacity")]
    capacity: usize,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct RawDisplay {
    #[serde(default = "default_appname")]
    appname: String,
    #[serde(default = "default_display_timeout")]
    #[serde_as(as = "HumantimeDuration")]
    timeout: Duration,
    #[serde(default = "default_queue_capacity")]
    queue_capacity: usize,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct RawMedia {
    #[serde(default = "default_image_dir")]
    image_dir: PathBuf,
    #[serde(default = "default_award_sound")]
    award_sound: PathBuf,
    #[serde(default = "default_rules_dir")]
    rules_dir: PathBuf,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct RawWorld {
    #[serde(default = "default_probe_addr")]
    probe_addr: String,
    #[serde(default = "default_probe_timeout")]
    #[serde_as(as = "HumantimeDuration")]
    probe_timeout: Duration,
    profile: Option<PathBuf>,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
struct RawPrefs {
    path: Option<PathBuf>,
}

impl Default for RawChannel {
    fn default() -> Self {
        Self {
            pipe: None,
            capacity: default_intake_capacity(),
        }
    }
}

impl Default for RawDisplay {
    fn default() -> Self {
        Self {
            appname: default_appname(),
            timeout: default_display_timeout(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for RawMedia {
    fn default() -> Self {
        Self {
            image_dir: default_image_dir(),
            award_sound: default_award_sound(),
            rules_dir: default_rules_dir(),
        }
    }
}

impl Default for RawWorld {
    fn default() -> Self {
        Self {
            probe_addr: default_probe_addr(),
            probe_timeout: default_probe_timeout(),
            profile: None,
        }
    }
}

impl RawConfig {
    fn validate_and_build(self) -> Result<Settings> {
        if self.display.appname.trim().is_empty() {
            return Err(SettingsError::InvalidField {
                field: "display.appname",
                message: "application name cannot be empty".to_string(),
            }
            .into());
        }
        if self.display.timeout.is_zero() {
            return Err(SettingsError::InvalidField {
                field: "display.timeout",
                message: "display timeout must be greater than zero".to_string(),
            }
            .into());
        }
        if !QUEUE_CAPACITY_BOUNDS.contains(&self.display.queue_capacity) {
            return Err(SettingsError::InvalidField {
                field: "display.queue_capacity",
                message: format!(
                    "expected between {} and {}, got {}",
                    QUEUE_CAPACITY_BOUNDS.start(),
                    QUEUE_CAPACITY_BOUNDS.end(),
                    self.display.queue_capacity
                ),
            }
            .into());
        }
        if self.channel.capacity == 0 {
            return Err(SettingsError::InvalidField {
                field: "channel.capacity",
                message: "intake capacity must be greater than zero".to_string(),
            }
            .into());
        }
        if self.world.probe_addr.trim().is_empty() {
            return Err(SettingsError::InvalidField {
                field: "world.probe_addr",
                message: "probe address cannot be empty".to_string(),
            }
            .into());
        }
        if self.world.probe_timeout.is_zero() {
            return Err(SettingsError::InvalidField {
                field: "world.probe_timeout",
                message: "probe timeout must be greater than zero".to_string(),
            }
            .into());
        }

        let pipe_path = match self.channel.pipe {
            Some(path) => path,
            None => home()?.join(".notiq.fifo"),
        };
        let prefs_path = match self.prefs.path {
            Some(path) => path,
            None => home()?.join(".notiq.conf"),
        };
        let profile_path = match self.world.profile {
            Some(path) => path,
            None => home()?.join(".notiq").join("profile.json"),
        };

        Ok(Settings {
            pipe_path,
            intake_capacity: self.channel.capacity,
            queue_capacity: self.display.queue_capacity,
            prefs_path,
            display: DisplaySettings {
                appname: self.display.appname,
                timeout: self.display.timeout,
            },
            media: MediaSettings {
                image_dir: self.media.image_dir,
                award_sound: self.media.award_sound,
                rules_dir: self.media.rules_dir,
            },
            world: WorldSettings {
                probe_addr: self.world.probe_addr,
                probe_timeout: self.world.probe_timeout,
                profile_path,
            },
        })
    }
}

fn home() -> std::result::Result<PathBuf, SettingsError> {
    dirs::home_dir().ok_or(SettingsError::NoHomeDir)
}

struct HumantimeDuration;

impl<'de> DeserializeAs<'de, Duration> for HumantimeDuration {
    fn deserialize_as<D>(deserializer: D) -> std::result::Result<Duration, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

impl SerializeAs<Duration> for HumantimeDuration {
    fn serialize_as<S>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&format_duration(*value).to_string())
    }
}

const fn default_intake_capacity() -> usize {
    64
}

fn default_appname() -> String {
    "notiq".to_string()
}

const fn default_display_timeout() -> Duration {
    Duration::from_millis(6000)
}

const fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAP
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("/usr/share/notiq/images")
}

fn default_award_sound() -> PathBuf {
    PathBuf::from("/usr/share/notiq/sounds/award.wav")
}

fn default_rules_dir() -> PathBuf {
    PathBuf::from("/usr/share/notiq/rules")
}

fn default_probe_addr() -> String {
    "1.1.1.1:53".to_string()
}

const fn default_probe_timeout() -> Duration {
    Duration::from_secs(3)
}
