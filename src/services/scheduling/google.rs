use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use super::{MeetingConfirmation, MeetingRequest, Scheduler, SchedulingError};
use crate::config::{ConfigError, ConfigResolver};
use crate::services::calendar;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const CALENDAR_URL: &str = "https://www.googleapis.com/calendar/v3";
const GMAIL_SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

/// Google Calendar + Gmail, authorized with a long-lived OAuth refresh token
/// that is exchanged for an access token on each booking.
pub struct GoogleScheduler {
    client_id: String,
    client_secret: SecretString,
    refresh_token: SecretString,
    calendar_id: String,
    client: reqwest::Client,
}

impl GoogleScheduler {
    pub fn new(
        client_id: String,
        client_secret: SecretString,
        refresh_token: SecretString,
        calendar_id: String,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            refresh_token,
            calendar_id,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &ConfigResolver) -> Result<Self, ConfigError> {
        let secret = |key: &str| {
            config
                .credential(key)
                .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
        };

        Ok(Self::new(
            config.require("GOOGLE_CLIENT_ID")?,
            secret("GOOGLE_CLIENT_SECRET")?,
            secret("GOOGLE_REFRESH_TOKEN")?,
            config
                .get("GOOGLE_CALENDAR_ID", Some("primary"), false)?
                .unwrap_or_else(|| "primary".to_string()),
        ))
    }

    async fn access_token(&self) -> Result<String, SchedulingError> {
        let resp = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("refresh_token", self.refresh_token.expose_secret()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| SchedulingError::Auth(e.to_string()))?;

        let status = resp.status();
        let data: Value = resp
            .json()
            .await
            .map_err(|e| SchedulingError::Auth(format!("failed to parse token response: {e}")))?;

        if !status.is_success() {
            return Err(SchedulingError::Auth(format!("token endpoint ({status}): {data}")));
        }

        data["access_token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SchedulingError::Auth("missing access_token in response".to_string()))
    }

    async fn insert_event(&self, token: &str, body: &Value) -> Result<Value, SchedulingError> {
        let url = format!("{CALENDAR_URL}/calendars/{}/events", self.calendar_id);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .query(&[("conferenceDataVersion", "1"), ("sendUpdates", "all")])
            .json(body)
            .send()
            .await
            .map_err(|e| SchedulingError::Calendar(e.to_string()))?;

        let status = resp.status();
        let data: Value = resp
            .json()
            .await
            .map_err(|e| SchedulingError::Calendar(format!("failed to parse event response: {e}")))?;

        if !status.is_success() {
            return Err(SchedulingError::Calendar(format!("Calendar API error ({status}): {data}")));
        }
        Ok(data)
    }

    async fn send_email(&self, token: &str, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let raw = calendar::raw_message(to, subject, body);
        self.client
            .post(GMAIL_SEND_URL)
            .bearer_auth(token)
            .json(&json!({ "raw": raw }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Scheduler for GoogleScheduler {
    async fn schedule(
        &self,
        request: &MeetingRequest,
    ) -> Result<MeetingConfirmation, SchedulingError> {
        let body = calendar::event_body(
            request,
            &calendar::conference_request_id(request.start()?),
        )?;
        let token = self.access_token().await?;

        let event = self.insert_event(&token, &body).await?;

        let event_id = event["id"].as_str().unwrap_or_default().to_string();
        let meet_link = calendar::meet_link(&event);
        tracing::info!(event = %event_id, attendee = %request.attendee_email, "calendar event created");

        // The event already exists at this point, so a failed email is logged
        // rather than reported as a failed booking.
        let (subject, text) = calendar::confirmation_email(request, meet_link.as_deref());
        let email_sent = match self
            .send_email(&token, &request.attendee_email, &subject, &text)
            .await
        {
            Ok(()) => {
                tracing::info!(attendee = %request.attendee_email, "meeting confirmation email sent");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, attendee = %request.attendee_email, "failed to send confirmation email");
                false
            }
        };

        Ok(MeetingConfirmation {
            event_id,
            meet_link,
            email_sent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_config_requires_oauth_keys() {
        let config = ConfigResolver::from_map(
            "dev",
            HashMap::from([("GOOGLE_CLIENT_ID".to_string(), "id".to_string())]),
        );
        assert!(matches!(
            GoogleScheduler::from_config(&config),
            Err(ConfigError::MissingKey(k)) if k == "GOOGLE_CLIENT_SECRET"
        ));
    }

    #[test]
    fn test_from_config_defaults_calendar() {
        let config = ConfigResolver::from_map(
            "dev",
            HashMap::from([
                ("GOOGLE_CLIENT_ID".to_string(), "id".to_string()),
                ("GOOGLE_CLIENT_SECRET".to_string(), "secret".to_string()),
                ("GOOGLE_REFRESH_TOKEN".to_string(), "refresh".to_string()),
            ]),
        );
        let scheduler = GoogleScheduler::from_config(&config).unwrap();
        assert_eq!(scheduler.calendar_id, "primary");
    }
}
