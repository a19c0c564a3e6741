//! Connection settings and the validation rules for user-supplied fan-mode
//! and preset lists.

use crate::client::{self, HttpClient};
use crate::planner::Session;
use crate::registers::Mode;

pub const DEFAULT_FAN_MODES: &str = "12,20,30,40,50,60,70,80,90,100";

#[derive(clap::Parser, Clone)]
#[group(id = "config::Args")]
pub struct Args {
    /// Host name or IP address of the unit's web module.
    #[arg(long, short = 'H')]
    pub host: String,

    /// Password for the unit's web interface.
    #[arg(long, short = 'p', default_value = "")]
    pub password: String,

    /// Give up on an HTTP request if no response arrives in this time.
    #[arg(long, default_value = "5s")]
    pub read_timeout: humantime::Duration,

    /// The unit applies committed writes with some lag; wait this long
    /// between a commit and the confirmatory state read-back.
    #[arg(long, default_value = "2s")]
    pub settle_delay: humantime::Duration,

    /// Comma-separated fan percentages offered as discrete fan modes.
    ///
    /// Each entry may carry a trailing `%` and must lie in 12..=100.
    #[arg(long, default_value = DEFAULT_FAN_MODES)]
    pub fan_modes: String,

    /// Comma-separated preset labels to offer. All presets when omitted.
    #[arg(long)]
    pub presets: Option<String>,
}

impl Args {
    pub fn client(&self) -> Result<HttpClient, client::Error> {
        HttpClient::new(&self.host, &self.password, *self.read_timeout)
    }

    pub async fn session(&self) -> Result<Session<HttpClient>, client::Error> {
        let client = self.client()?;
        if !client.is_atrea_unit().await {
            tracing::warn!(host = self.host, "the host does not look like an Atrea unit");
        }
        Session::connect(client, *self.settle_delay).await
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FanModesError {
    #[error("fan mode `{0}` is not a number")]
    NotNumeric(String),
    #[error("fan mode `{0}` is outside the supported range of 12 to 100")]
    OutOfRange(u32),
}

/// Validate and normalize a comma-separated fan-mode list.
///
/// Entries are trimmed and may carry a trailing `%`; every entry must be
/// numeric and within 12..=100, otherwise the whole list is rejected. The
/// result is sorted ascending and rendered back as `N%` labels.
pub fn process_fan_modes(list: &str) -> Result<Vec<String>, FanModesError> {
    let mut percentages = Vec::new();
    for entry in list.split(',') {
        let entry = entry.trim().trim_end_matches('%');
        let percent: u32 = entry
            .parse()
            .map_err(|_| FanModesError::NotNumeric(entry.to_string()))?;
        if !(12..=100).contains(&percent) {
            return Err(FanModesError::OutOfRange(percent));
        }
        percentages.push(percent);
    }
    percentages.sort_unstable();
    Ok(percentages
        .into_iter()
        .map(|percent| format!("{percent}%"))
        .collect())
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PresetsError {
    #[error("`{0}` is not a known preset")]
    Unknown(String),
}

/// Validate a comma-separated list of enabled preset labels, keeping the
/// caller's order. `None` means all presets are enabled.
pub fn process_presets(list: Option<&str>) -> Result<Vec<&'static str>, PresetsError> {
    let Some(list) = list else {
        return Ok(Mode::preset_labels().to_vec());
    };
    list.split(',')
        .map(|entry| {
            let entry = entry.trim();
            Mode::from_preset_label(entry)
                .map(|mode| mode.label())
                .ok_or_else(|| PresetsError::Unknown(entry.to_string()))
        })
        .collect()
}
