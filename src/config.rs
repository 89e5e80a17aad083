//! Configuration: audio rate, playback defaults and the nap schedule.
//! Loaded from JSON; every section is optional and falls back to defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audio::{MAX_BUFFER_SECONDS, MAX_SAMPLE_RATE};
use crate::error::ErrorKind;
use crate::sleep::wake_window::{compute_wake_windows, NapConfig, ScheduleError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Buffer length override; `None` uses each sound's own default.
    pub buffer_seconds: Option<f32>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            buffer_seconds: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub gain: f32,
    /// 0 disables auto-stop.
    pub auto_stop_minutes: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            gain: 0.7,
            auto_stop_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub audio: AudioConfig,
    pub playback: PlaybackConfig,
    pub naps: NapConfig,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
    Schedule(ScheduleError),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::Io(_) => ErrorKind::Io,
            ConfigError::Parse(_) | ConfigError::Invalid(_) => ErrorKind::InputValidation,
            ConfigError::Schedule(e) => e.kind(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config IO error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
            ConfigError::Schedule(e) => write!(f, "invalid nap schedule: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<ScheduleError> for ConfigError {
    fn from(e: ScheduleError) -> Self {
        ConfigError::Schedule(e)
    }
}

impl CoreConfig {
    /// Load and validate a JSON config file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: CoreConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audio.sample_rate == 0 || self.audio.sample_rate > MAX_SAMPLE_RATE {
            return Err(ConfigError::Invalid(format!(
                "audio.sample_rate must be within 1..={MAX_SAMPLE_RATE}, got {}",
                self.audio.sample_rate
            )));
        }
        if let Some(secs) = self.audio.buffer_seconds {
            if !secs.is_finite() || secs <= 0.0 || secs > MAX_BUFFER_SECONDS {
                return Err(ConfigError::Invalid(format!(
                    "audio.buffer_seconds must be within (0, {MAX_BUFFER_SECONDS}], got {secs}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.playback.gain) {
            return Err(ConfigError::Invalid(format!(
                "playback.gain must be within [0, 1], got {}",
                self.playback.gain
            )));
        }
        compute_wake_windows(&self.naps)?;
        Ok(())
    }
}

/// Serde adapter for `"HH:MM"` times of day (seconds accepted on input).
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(|e| serde::de::Error::custom(format!("invalid time of day {raw:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use std::io::Write;

    #[test]
    fn empty_object_gives_defaults() {
        let config = CoreConfig::from_json("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.naps.wake_time, NaiveTime::from_hms_opt(7, 0, 0).unwrap());
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = CoreConfig::from_json(
            r#"{
                "playback": { "auto_stop_minutes": 30 },
                "naps": {
                    "naps_per_day": 3,
                    "wake_time": "06:30",
                    "target_bedtime": "19:15:00",
                    "avg_nap_duration_minutes": 45
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.playback.auto_stop_minutes, 30);
        assert_eq!(config.playback.gain, 0.7);
        assert_eq!(config.naps.naps_per_day, 3);
        assert_eq!(config.naps.target_bedtime, NaiveTime::from_hms_opt(19, 15, 0).unwrap());
    }

    #[test]
    fn times_serialize_as_hhmm() {
        let json = serde_json::to_value(NapConfig::default()).unwrap();
        assert_eq!(json["wake_time"], "07:00");
        assert_eq!(json["target_bedtime"], "20:00");
    }

    #[test]
    fn rejects_bad_values() {
        let err = CoreConfig::from_json(r#"{"audio": {"sample_rate": 0}}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputValidation);

        let err = CoreConfig::from_json(r#"{"audio": {"buffer_seconds": 86400}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = CoreConfig::from_json(r#"{"playback": {"gain": 1.5}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = CoreConfig::from_json(
            r#"{"naps": {"naps_per_day": 4, "wake_time": "07:00",
                "target_bedtime": "19:00", "avg_nap_duration_minutes": 180}}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);

        let err = CoreConfig::from_json(r#"{"naps": {"wake_time": "7am"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"audio": {{"sample_rate": 22050, "buffer_seconds": 1.5}}}}"#).unwrap();
        let config = CoreConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.audio.sample_rate, 22050);
        assert_eq!(config.audio.buffer_seconds, Some(1.5));

        let missing = CoreConfig::load_from_file(Path::new("/nonexistent/babydream.json"));
        assert_eq!(missing.unwrap_err().kind(), ErrorKind::Io);
    }
}
