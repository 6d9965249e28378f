pub mod google;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

pub const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeetingRequest {
    pub summary: String,
    pub description: String,
    /// Local wall-clock start in `timezone`, `YYYY-MM-DD HH:MM`.
    pub start_time: String,
    pub attendee_email: String,
    pub duration_minutes: i64,
    pub timezone: String,
}

impl MeetingRequest {
    pub fn start(&self) -> Result<NaiveDateTime, SchedulingError> {
        NaiveDateTime::parse_from_str(&self.start_time, START_TIME_FORMAT)
            .map_err(|_| SchedulingError::InvalidStartTime(self.start_time.clone()))
    }

    pub fn end(&self) -> Result<NaiveDateTime, SchedulingError> {
        Ok(self.start()? + Duration::minutes(self.duration_minutes))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeetingConfirmation {
    pub event_id: String,
    pub meet_link: Option<String>,
    pub email_sent: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("invalid start time '{0}'")]
    InvalidStartTime(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("calendar error: {0}")]
    Calendar(String),
}

/// Books a meeting with the external calendar and notifies the attendee.
///
/// Implementations make a single attempt. Retrying is the caller's decision.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn schedule(&self, request: &MeetingRequest)
        -> Result<MeetingConfirmation, SchedulingError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(start_time: &str) -> MeetingRequest {
        MeetingRequest {
            summary: "s".to_string(),
            description: "d".to_string(),
            start_time: start_time.to_string(),
            attendee_email: "a@b.co".to_string(),
            duration_minutes: 30,
            timezone: "Asia/Kolkata".to_string(),
        }
    }

    #[test]
    fn test_end_adds_duration() {
        let req = request("2025-10-20 23:45");
        assert_eq!(
            req.end().unwrap().format(START_TIME_FORMAT).to_string(),
            "2025-10-21 00:15"
        );
    }

    #[test]
    fn test_invalid_start_time() {
        assert!(matches!(
            request("20/10/2025 2pm").start(),
            Err(SchedulingError::InvalidStartTime(_))
        ));
    }
}
