use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::db::prospects::save_prospect;
use crate::db::KeyValueStore;
use crate::models::{AgentVariant, FieldUpdate, ProspectField, ProspectRecord, ProspectStatus};
use crate::services::scheduling::{MeetingConfirmation, MeetingRequest, Scheduler};

pub const MEETING_DURATION_MINUTES: i64 = 30;

const APOLOGY: &str =
    "I apologize, there was an error scheduling your appointment. Let me try that again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingState {
    Collecting,
    PendingConfirmation,
    Committed,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("this appointment has already been booked")]
    AlreadyCommitted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FieldOutcome {
    Recorded { field: ProspectField },
    /// Every required field is now collected. `message` is the read-back the
    /// agent speaks before asking for a yes.
    ConfirmationRequested { field: ProspectField, message: String },
    /// The value did not parse. Nothing was recorded.
    Rejected {
        field: ProspectField,
        reason: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ConfirmOutcome {
    MissingInformation { missing: Vec<ProspectField> },
    Booked {
        message: String,
        confirmation: MeetingConfirmation,
    },
    /// Scheduling or persistence failed. The session stays pending so the
    /// agent can try again.
    Failed { message: String, reason: String },
}

/// Field collection and confirmation for one call.
///
/// `collected` only tracks values supplied during this call. Values already on
/// a loaded record are read back but still have to be collected again.
#[derive(Debug, Clone)]
pub struct BookingSession {
    variant: AgentVariant,
    record: ProspectRecord,
    collected: BTreeSet<ProspectField>,
    state: BookingState,
}

impl BookingSession {
    pub fn new(variant: AgentVariant, record: ProspectRecord) -> Self {
        Self {
            variant,
            record,
            collected: BTreeSet::new(),
            state: BookingState::Collecting,
        }
    }

    pub fn state(&self) -> BookingState {
        self.state
    }

    pub fn record(&self) -> &ProspectRecord {
        &self.record
    }

    pub fn variant(&self) -> AgentVariant {
        self.variant
    }

    pub fn collected(&self) -> Vec<ProspectField> {
        self.collected.iter().copied().collect()
    }

    pub fn missing(&self) -> Vec<ProspectField> {
        self.variant
            .required_fields()
            .iter()
            .copied()
            .filter(|f| !self.collected.contains(f))
            .collect()
    }

    pub fn set_field(
        &mut self,
        field: ProspectField,
        raw: &str,
        today: NaiveDate,
    ) -> Result<FieldOutcome, SessionError> {
        if !self.variant.offers(field) {
            return Err(SessionError::UnknownTool(field.tool_name().to_string()));
        }
        if self.state == BookingState::Committed {
            return Err(SessionError::AlreadyCommitted);
        }

        let update = match FieldUpdate::parse(field, raw, today) {
            Ok(update) => update,
            Err(e) => {
                tracing::info!(prospect = %self.record.id, field = field.as_str(), error = %e, "rejected field value");
                return Ok(FieldOutcome::Rejected {
                    field,
                    reason: e.to_string(),
                    message: format!(
                        "Sorry, I couldn't quite catch that. Could you repeat your {}?",
                        field.label().to_lowercase()
                    ),
                });
            }
        };

        self.record.apply(update);
        self.record.updated_at = Utc::now().naive_utc();
        if self.record.status == ProspectStatus::New {
            self.record.status = ProspectStatus::InProgress;
        }
        self.collected.insert(field);
        tracing::info!(prospect = %self.record.id, field = field.as_str(), "collected field");

        if self.state == BookingState::Collecting && self.missing().is_empty() {
            self.state = BookingState::PendingConfirmation;
            tracing::info!(prospect = %self.record.id, "all required fields collected");
            return Ok(FieldOutcome::ConfirmationRequested {
                field,
                message: self.confirmation_message(),
            });
        }

        Ok(FieldOutcome::Recorded { field })
    }

    pub fn record_objection(&mut self, objection: &str) -> Result<(), SessionError> {
        if self.state == BookingState::Committed {
            return Err(SessionError::AlreadyCommitted);
        }
        let objection = objection.trim();
        if !objection.is_empty() {
            self.record.objections.push(objection.to_string());
            self.record.updated_at = Utc::now().naive_utc();
        }
        Ok(())
    }

    /// Persists the record and books the meeting. Only valid once every
    /// required field has been collected; otherwise reports what is missing
    /// without touching the store or the calendar.
    pub async fn confirm(
        &mut self,
        store: &dyn KeyValueStore,
        scheduler: &dyn Scheduler,
    ) -> Result<ConfirmOutcome, SessionError> {
        match self.state {
            BookingState::Committed => return Err(SessionError::AlreadyCommitted),
            BookingState::Collecting => {
                return Ok(ConfirmOutcome::MissingInformation {
                    missing: self.missing(),
                })
            }
            BookingState::PendingConfirmation => {}
        }

        let request = match self.meeting_request() {
            Some(request) => request,
            None => {
                return Ok(ConfirmOutcome::MissingInformation {
                    missing: self.missing(),
                })
            }
        };

        self.record.updated_at = Utc::now().naive_utc();
        if let Err(e) = save_prospect(store, &self.record).await {
            tracing::error!(prospect = %self.record.id, error = %e, "failed to save prospect before scheduling");
            return Ok(failed(e.to_string()));
        }

        let confirmation = match scheduler.schedule(&request).await {
            Ok(confirmation) => confirmation,
            Err(e) => {
                tracing::error!(prospect = %self.record.id, error = %e, "failed to schedule appointment");
                return Ok(failed(e.to_string()));
            }
        };

        self.state = BookingState::Committed;
        self.record.status = ProspectStatus::Booked;
        self.record.updated_at = Utc::now().naive_utc();
        // The meeting exists now; a failed status write does not undo it.
        if let Err(e) = save_prospect(store, &self.record).await {
            tracing::warn!(prospect = %self.record.id, error = %e, "failed to save booked status");
        }

        tracing::info!(
            prospect = %self.record.id,
            event = %confirmation.event_id,
            email_sent = confirmation.email_sent,
            "appointment booked"
        );

        Ok(ConfirmOutcome::Booked {
            message: self.booked_message(),
            confirmation,
        })
    }

    fn meeting_request(&self) -> Option<MeetingRequest> {
        let date = self.record.appointment_date?;
        let time = self.record.appointment_time.as_deref()?;
        Some(MeetingRequest {
            summary: self.variant.meeting_summary(&self.record),
            description: self.variant.meeting_description().to_string(),
            start_time: format!("{} {time}", date.format("%Y-%m-%d")),
            attendee_email: self.record.email.clone()?,
            duration_minutes: MEETING_DURATION_MINUTES,
            timezone: self.record.timezone.clone()?,
        })
    }

    pub fn confirmation_message(&self) -> String {
        let required = self.variant.required_fields();
        let lines: Vec<String> = self
            .variant
            .offered_fields()
            .iter()
            .filter(|&&f| required.contains(&f) || self.record.has(f))
            .map(|&f| {
                let value = self.record.spoken_value(f).unwrap_or_default();
                format!("- {}: {value}", f.label())
            })
            .collect();

        format!(
            "Great! Here's what I have:\n{}\n\nCan you confirm these details are correct?",
            lines.join("\n")
        )
    }

    fn booked_message(&self) -> String {
        let date = self
            .record
            .spoken_value(ProspectField::AppointmentDate)
            .unwrap_or_default();
        let time = self
            .record
            .spoken_value(ProspectField::AppointmentTime)
            .unwrap_or_default();
        let email = self.record.email.as_deref().unwrap_or_default();

        format!(
            "Perfect! Your appointment has been scheduled for {date} at {time} in your timezone. \
             You'll receive a confirmation email at {email}. \
             Is there anything that would prevent you from attending this meeting?"
        )
    }
}

fn failed(reason: String) -> ConfirmOutcome {
    ConfirmOutcome::Failed {
        message: APOLOGY.to_string(),
        reason,
    }
}

/// Canned slots after a short pause, standing in for a real availability
/// lookup.
pub async fn look_up_availability(date: &str, delay: Duration) -> Vec<String> {
    tracing::info!(date, "looking up availability");
    tokio::time::sleep(delay).await;
    ["1pm", "2pm", "3pm"].iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::prospects::get_prospect;
    use crate::services::scheduling::SchedulingError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingScheduler {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl Scheduler for CountingScheduler {
        async fn schedule(
            &self,
            request: &MeetingRequest,
        ) -> Result<MeetingConfirmation, SchedulingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(SchedulingError::Calendar("503 backend error".to_string()));
            }
            Ok(MeetingConfirmation {
                event_id: format!("evt-{}", request.start_time),
                meet_link: Some("https://meet.google.com/abc-defg-hij".to_string()),
                email_sent: true,
            })
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 17).unwrap()
    }

    fn session() -> BookingSession {
        let mut record = ProspectRecord::with_id("p-1", "+919800000000");
        record.first_name = Some("Asha".to_string());
        BookingSession::new(AgentVariant::Screening, record)
    }

    fn fill_first_three(s: &mut BookingSession) {
        s.set_field(ProspectField::AppointmentDate, "20/10/2025", today()).unwrap();
        s.set_field(ProspectField::AppointmentTime, "2:30 pm", today()).unwrap();
        s.set_field(ProspectField::Timezone, "Asia/Kolkata", today()).unwrap();
    }

    #[test]
    fn test_partial_fields_do_not_request_confirmation() {
        let mut s = session();
        fill_first_three(&mut s);
        assert_eq!(s.state(), BookingState::Collecting);
        assert_eq!(s.missing(), vec![ProspectField::Email]);
        assert_eq!(s.record().status, ProspectStatus::InProgress);
    }

    #[test]
    fn test_last_field_requests_confirmation_once() {
        let mut s = session();
        fill_first_three(&mut s);

        let outcome = s
            .set_field(ProspectField::Email, "asha at example dot com", today())
            .unwrap();
        let message = match outcome {
            FieldOutcome::ConfirmationRequested { message, .. } => message,
            other => panic!("expected confirmation request, got {other:?}"),
        };
        assert!(message.contains("- Date: Monday, October 20, 2025"));
        assert!(message.contains("- Time: 2:30PM"));
        assert!(message.contains("- Email: asha@example.com"));
        assert_eq!(s.state(), BookingState::PendingConfirmation);

        // correcting a value while pending does not ask again
        let again = s
            .set_field(ProspectField::Timezone, "Asia/Dubai", today())
            .unwrap();
        assert_eq!(
            again,
            FieldOutcome::Recorded {
                field: ProspectField::Timezone
            }
        );
    }

    #[test]
    fn test_unparseable_value_is_rejected() {
        let mut s = session();
        let outcome = s
            .set_field(ProspectField::AppointmentDate, "someday soon", today())
            .unwrap();
        assert!(matches!(outcome, FieldOutcome::Rejected { .. }));
        assert!(s.collected().is_empty());
        assert!(s.record().appointment_date.is_none());
    }

    #[test]
    fn test_field_outside_variant_is_unknown() {
        let mut s = session();
        let err = s
            .set_field(ProspectField::Address, "Civil Lines, Nagpur", today())
            .unwrap_err();
        assert!(matches!(err, SessionError::UnknownTool(ref name) if name == "set_address"));
        assert!(s.record().address.is_none());
        assert!(s.collected().is_empty());
    }

    #[test]
    fn test_property_reads_back_optional_address() {
        let mut record = ProspectRecord::with_id("p-2", "+919800000000");
        record.first_name = Some("Asha".to_string());
        let mut s = BookingSession::new(AgentVariant::Property, record);

        let outcome = s
            .set_field(ProspectField::Address, "Civil Lines, Nagpur", today())
            .unwrap();
        assert_eq!(
            outcome,
            FieldOutcome::Recorded {
                field: ProspectField::Address
            }
        );
        assert!(!s.missing().contains(&ProspectField::Address));

        fill_first_three(&mut s);
        s.set_field(ProspectField::Email, "asha@example.com", today()).unwrap();
        let outcome = s
            .set_field(ProspectField::WhatsappPhone, "+919800000001", today())
            .unwrap();
        let message = match outcome {
            FieldOutcome::ConfirmationRequested { message, .. } => message,
            other => panic!("expected confirmation request, got {other:?}"),
        };
        assert!(message.contains("Civil Lines, Nagpur"));
    }

    #[tokio::test]
    async fn test_confirm_before_all_fields_does_not_schedule() {
        let store = MemoryStore::new();
        let scheduler = CountingScheduler::default();
        let mut s = session();
        fill_first_three(&mut s);

        let outcome = s.confirm(&store, &scheduler).await.unwrap();
        assert_eq!(
            outcome,
            ConfirmOutcome::MissingInformation {
                missing: vec![ProspectField::Email]
            }
        );
        assert_eq!(scheduler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.hash_count().await, 0);
    }

    #[tokio::test]
    async fn test_confirm_books_and_persists() {
        let store = MemoryStore::new();
        let scheduler = CountingScheduler::default();
        let mut s = session();
        fill_first_three(&mut s);
        s.set_field(ProspectField::Email, "asha@example.com", today()).unwrap();

        let outcome = s.confirm(&store, &scheduler).await.unwrap();
        let (message, confirmation) = match outcome {
            ConfirmOutcome::Booked { message, confirmation } => (message, confirmation),
            other => panic!("expected booking, got {other:?}"),
        };
        assert_eq!(confirmation.event_id, "evt-2025-10-20 14:30");
        assert!(message.contains("scheduled for Monday, October 20, 2025 at 2:30PM"));
        assert_eq!(s.state(), BookingState::Committed);

        let stored = get_prospect(&store, "p-1").await.unwrap().unwrap();
        assert_eq!(stored.status, ProspectStatus::Booked);
        assert_eq!(stored.email.as_deref(), Some("asha@example.com"));

        assert!(matches!(
            s.confirm(&store, &scheduler).await,
            Err(SessionError::AlreadyCommitted)
        ));
        assert!(matches!(
            s.set_field(ProspectField::Email, "x@example.com", today()),
            Err(SessionError::AlreadyCommitted)
        ));
        assert_eq!(scheduler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scheduler_failure_stays_pending_and_retry_succeeds() {
        let store = MemoryStore::new();
        let scheduler = CountingScheduler::default();
        scheduler.fail.store(true, Ordering::SeqCst);
        let mut s = session();
        fill_first_three(&mut s);
        s.set_field(ProspectField::Email, "asha@example.com", today()).unwrap();

        let outcome = s.confirm(&store, &scheduler).await.unwrap();
        assert!(matches!(&outcome, ConfirmOutcome::Failed { message, .. } if message == APOLOGY));
        assert_eq!(s.state(), BookingState::PendingConfirmation);

        scheduler.fail.store(false, Ordering::SeqCst);
        let retry = s.confirm(&store, &scheduler).await.unwrap();
        assert!(matches!(retry, ConfirmOutcome::Booked { .. }));
        assert_eq!(scheduler.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_record_objection() {
        let mut s = session();
        s.record_objection("too expensive").unwrap();
        s.record_objection("  ").unwrap();
        assert_eq!(s.record().objections, vec!["too expensive".to_string()]);
    }

    #[tokio::test]
    async fn test_look_up_availability() {
        let slots = look_up_availability("tomorrow", Duration::from_millis(0)).await;
        assert_eq!(slots, vec!["1pm", "2pm", "3pm"]);
    }
}
