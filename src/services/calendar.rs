use base64::Engine;
use chrono::NaiveDateTime;
use serde_json::{json, Value};

use crate::services::scheduling::{MeetingRequest, SchedulingError};

/// Calendar v3 event body with a Meet conference request attached.
pub fn event_body(request: &MeetingRequest, request_id: &str) -> Result<Value, SchedulingError> {
    let start = request.start()?;
    let end = request.end()?;

    Ok(json!({
        "summary": request.summary,
        "description": request.description,
        "start": {
            "dateTime": start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "timeZone": request.timezone,
        },
        "end": {
            "dateTime": end.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "timeZone": request.timezone,
        },
        "attendees": [{ "email": request.attendee_email }],
        "conferenceData": {
            "createRequest": {
                "requestId": request_id,
                "conferenceSolutionKey": { "type": "hangoutsMeet" },
            },
        },
    }))
}

pub fn conference_request_id(start: NaiveDateTime) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("meet-{}-{}", start.format("%Y%m%d%H%M"), &suffix[..8])
}

/// Picks the video entry point out of a created event, if Meet attached one.
pub fn meet_link(event: &Value) -> Option<String> {
    let entry_points = event["conferenceData"]["entryPoints"].as_array()?;
    entry_points
        .iter()
        .find(|ep| ep["entryPointType"] == "video")
        .or_else(|| entry_points.first())
        .and_then(|ep| ep["uri"].as_str())
        .map(str::to_string)
}

pub fn confirmation_email(request: &MeetingRequest, meet_link: Option<&str>) -> (String, String) {
    let subject = format!("Appointment Scheduled: {}", request.summary);
    let body = format!(
        "Hello,\r\n\
         \r\n\
         Your appointment has been scheduled.\r\n\
         \r\n\
         Title: {}\r\n\
         Description: {}\r\n\
         Date & Time: {} ({})\r\n\
         Duration: {} minutes\r\n\
         Google Meet link: {}\r\n\
         \r\n\
         See you then!\r\n",
        request.summary,
        request.description,
        request.start_time,
        request.timezone,
        request.duration_minutes,
        meet_link.unwrap_or("will follow in the calendar invite"),
    );
    (subject, body)
}

/// RFC 2822 message, base64url-encoded the way the Gmail send API wants it.
pub fn raw_message(to: &str, subject: &str, body: &str) -> String {
    let message = format!(
        "To: {to}\r\n\
         Subject: {subject}\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: text/plain; charset=\"utf-8\"\r\n\
         \r\n\
         {body}"
    );
    base64::engine::general_purpose::URL_SAFE.encode(message.as_bytes())
}
