//! Process-wide configuration.
//!
//! Loaded once from a TOML file into immutable values that are passed
//! explicitly to the adapters and the notifier, so both stay testable with
//! fake configs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::meeting::Room;

/// The calendar vendor a deployment syncs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Google,
    Outlook,
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Vendor::Google => write!(f, "google"),
            Vendor::Outlook => write!(f, "outlook"),
        }
    }
}

/// Configuration for the active calendar provider.
///
/// Immutable after load; shared read-only by every adapter call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub vendor: Vendor,
    /// Path to the saved access-token file for this vendor.
    /// Acquiring the token (OAuth, service account) happens out of band.
    pub credentials_ref: PathBuf,
    /// Calendar id per room display name (e.g., "Robotics Room").
    #[serde(default)]
    pub calendar_ids: HashMap<String, String>,
    /// Fallback calendar for rooms without their own mapping.
    #[serde(default)]
    pub default_calendar_id: Option<String>,
    /// Graph only: the mailbox whose calendars are used.
    #[serde(default)]
    pub mailbox_user: Option<String>,
    /// IANA timezone name applied to all created events.
    pub timezone: String,
}

impl ProviderConfig {
    /// The configured timezone, parsed. A wrong timezone is a correctness
    /// bug, so this is checked at load rather than silently defaulted.
    pub fn tz(&self) -> SyncResult<Tz> {
        self.timezone.parse::<Tz>().map_err(|e| {
            SyncError::InvalidCalendarConfig(format!(
                "invalid timezone '{}': {}",
                self.timezone, e
            ))
        })
    }

    /// Resolve the calendar id a room's events go to.
    pub fn calendar_id_for(&self, room: &Room) -> SyncResult<&str> {
        let key = room.to_string();
        if let Some(id) = self.calendar_ids.get(&key) {
            return Ok(id);
        }
        if let Some(id) = &self.default_calendar_id {
            return Ok(id);
        }
        Err(SyncError::InvalidCalendarConfig(format!(
            "no calendar id configured for room '{key}'"
        )))
    }

    /// Fail-fast validation, run at load and again by adapter constructors.
    pub fn validate(&self) -> SyncResult<()> {
        self.tz()?;

        if self.calendar_ids.is_empty() && self.default_calendar_id.is_none() {
            return Err(SyncError::InvalidCalendarConfig(
                "no calendar ids configured (set [provider.calendar_ids] or default_calendar_id)"
                    .to_string(),
            ));
        }

        if self.vendor == Vendor::Outlook && self.mailbox_user.is_none() {
            return Err(SyncError::InvalidCalendarConfig(
                "outlook requires mailbox_user (the account whose calendars are booked)"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Rooms this deployment knows about: the built-in two plus any room
    /// with an explicit calendar mapping.
    pub fn configured_rooms(&self) -> Vec<Room> {
        let mut rooms = vec![Room::Robotics, Room::Fluids];
        for name in self.calendar_ids.keys() {
            let room = Room::from_name(name);
            if !rooms.contains(&room) {
                rooms.push(room);
            }
        }
        rooms
    }
}

/// SMTP settings for the cancellation-approval email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    /// From address on outgoing mail.
    pub from: String,
    /// Admin mailbox that receives confirmation links.
    pub admin_to: String,
    /// Public base URL confirmation links are built against.
    pub base_url: String,
}

fn default_smtp_port() -> u16 {
    587
}

/// Top-level config stored in roombook's config.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub provider: ProviderConfig,
    pub smtp: SmtpConfig,
    /// Where the local meeting store snapshot lives.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

impl Config {
    /// Load and validate config from a TOML file.
    pub fn load(path: &Path) -> SyncResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| SyncError::Config(e.to_string()))?;
        config.provider.validate()?;
        Ok(config)
    }

    /// Default config file location (overridable via ROOMBOOK_CONFIG).
    pub fn default_path() -> SyncResult<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| SyncError::Config("could not determine config directory".into()))?;
        Ok(dir.join("roombook").join("config.toml"))
    }

    /// Store snapshot location, defaulting to the platform data dir.
    pub fn store_path(&self) -> SyncResult<PathBuf> {
        if let Some(path) = &self.store_path {
            return Ok(path.clone());
        }
        let dir = dirs::data_dir()
            .ok_or_else(|| SyncError::Config("could not determine data directory".into()))?;
        Ok(dir.join("roombook").join("meetings.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [provider]
        vendor = "google"
        credentials_ref = "/etc/roombook/google-token.toml"
        timezone = "America/Chicago"
        default_calendar_id = "asme@example.edu"

        [provider.calendar_ids]
        "Robotics Room" = "robotics-cal@group.calendar.google.com"
        "Fluids Lab" = "fluids-cal@group.calendar.google.com"

        [smtp]
        host = "smtp.example.edu"
        username = "asme"
        password = "hunter2"
        from = "roombook@example.edu"
        admin_to = "admin@example.edu"
        base_url = "https://rooms.example.edu"
    "#;

    #[test]
    fn sample_config_parses_and_validates() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        config.provider.validate().unwrap();

        assert_eq!(config.provider.vendor, Vendor::Google);
        assert_eq!(config.smtp.port, 587);
        assert_eq!(
            config.provider.calendar_id_for(&Room::Robotics).unwrap(),
            "robotics-cal@group.calendar.google.com"
        );
        // Unmapped room falls back to the default calendar.
        assert_eq!(
            config
                .provider
                .calendar_id_for(&Room::Other("Design Studio".into()))
                .unwrap(),
            "asme@example.edu"
        );
    }

    #[test]
    fn bad_timezone_fails_fast() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.provider.timezone = "Central Time".to_string();

        let err = config.provider.validate().unwrap_err();
        assert!(matches!(err, SyncError::InvalidCalendarConfig(_)));
    }

    #[test]
    fn outlook_requires_mailbox_user() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.provider.vendor = Vendor::Outlook;

        assert!(matches!(
            config.provider.validate(),
            Err(SyncError::InvalidCalendarConfig(_))
        ));

        config.provider.mailbox_user = Some("asme-rooms@example.edu".into());
        config.provider.validate().unwrap();
    }

    #[test]
    fn unmapped_room_without_default_is_a_config_error() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.provider.default_calendar_id = None;

        assert!(matches!(
            config
                .provider
                .calendar_id_for(&Room::Other("Attic".into())),
            Err(SyncError::InvalidCalendarConfig(_))
        ));
    }
}
