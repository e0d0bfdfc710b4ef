//! Inbound booking request validation.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Invalid or missing 'meeting' (YYYY-MM-DD)")]
    InvalidMeeting,
    #[error("Invalid or missing 'languages' (comma-separated string)")]
    InvalidLanguages,
}

/// A validated meeting date plus language list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentRequest {
    meeting: String,
    languages: String,
}

impl AppointmentRequest {
    /// Validate raw inputs. `meeting` must be a real `YYYY-MM-DD` date and
    /// `languages` must not be blank; both are kept verbatim.
    pub fn new(
        meeting: impl Into<String>,
        languages: impl Into<String>,
    ) -> Result<Self, RequestError> {
        let meeting = meeting.into();
        let languages = languages.into();
        parse_iso_date(&meeting).ok_or(RequestError::InvalidMeeting)?;
        if languages.trim().is_empty() {
            return Err(RequestError::InvalidLanguages);
        }
        Ok(Self { meeting, languages })
    }

    pub fn meeting(&self) -> &str {
        &self.meeting
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }
}

/// Parse an exact `YYYY-MM-DD` calendar date.
///
/// Stricter than chrono's `%Y-%m-%d`, which also takes unpadded or signed
/// components.
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let bytes = s.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shape_ok {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
