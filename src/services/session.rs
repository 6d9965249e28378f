use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::db::prospects::get_prospect;
use crate::db::StoreError;
use crate::errors::AppError;
use crate::models::{AgentVariant, ProspectField, ProspectRecord, ToolSpec};
use crate::services::booking::{
    look_up_availability, BookingSession, BookingState, ConfirmOutcome, FieldOutcome, SessionError,
};
use crate::services::providers::ProviderSet;
use crate::state::AppState;

/// One live call: the providers it was started with and its booking progress.
pub struct CallSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub providers: ProviderSet,
    pub booking: BookingSession,
}

/// Everything the conversation model can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    SetField(ProspectField),
    ConfirmAppointmentDetails,
    LookUpAvailability,
    RecordObjection,
}

impl Tool {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "confirm_appointment_details" => Some(Tool::ConfirmAppointmentDetails),
            "look_up_availability" => Some(Tool::LookUpAvailability),
            "record_objection" => Some(Tool::RecordObjection),
            other => ProspectField::from_tool_name(other).map(Tool::SetField),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StartSession {
    pub prospect_id: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionStarted {
    pub session_id: String,
    pub prospect_id: String,
    pub variant: AgentVariant,
    pub instructions: String,
    pub tools: Vec<ToolSpec>,
    pub providers: ProviderSet,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub variant: AgentVariant,
    pub state: BookingState,
    pub started_at: DateTime<Utc>,
    pub collected: Vec<ProspectField>,
    pub missing: Vec<ProspectField>,
    pub record: ProspectRecord,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ToolReply {
    Field(FieldOutcome),
    Confirm(ConfirmOutcome),
    Availability {
        result: &'static str,
        date: String,
        slots: Vec<String>,
    },
    Objection {
        result: &'static str,
    },
}

pub async fn start_session(
    state: &Arc<AppState>,
    req: StartSession,
) -> Result<SessionStarted, AppError> {
    let max_jobs = state.config.max_jobs;
    if state.active_sessions().await >= max_jobs {
        return Err(AppError::AtCapacity(max_jobs));
    }

    let providers = ProviderSet::select(&state.config.env_tag, &state.resolver)?;
    let phone = req.phone.unwrap_or_default();
    let record = match req.prospect_id.as_deref().filter(|id| !id.trim().is_empty()) {
        Some(id) => load_or_create(state, id, &phone).await?,
        None => ProspectRecord::new(&phone),
    };

    let variant = state.config.agent_variant;
    let today = Utc::now().date_naive();
    let started = SessionStarted {
        session_id: uuid::Uuid::new_v4().to_string(),
        prospect_id: record.id.clone(),
        variant,
        instructions: variant.instructions(&record, today),
        tools: variant.tools(),
        providers: providers.clone(),
    };

    let session = CallSession {
        id: started.session_id.clone(),
        started_at: Utc::now(),
        providers,
        booking: BookingSession::new(variant, record),
    };

    {
        let mut sessions = state.sessions.lock().await;
        // Re-checked under the lock; another call may have started meanwhile.
        if sessions.len() >= max_jobs {
            return Err(AppError::AtCapacity(max_jobs));
        }
        sessions.insert(session.id.clone(), Arc::new(Mutex::new(session)));
    }

    tracing::info!(
        session = %started.session_id,
        prospect = %started.prospect_id,
        variant = variant.as_str(),
        llm = started.providers.llm.name,
        stt = started.providers.stt.name,
        tts = started.providers.tts.name,
        "session started"
    );
    Ok(started)
}

async fn load_or_create(
    state: &Arc<AppState>,
    id: &str,
    phone: &str,
) -> Result<ProspectRecord, AppError> {
    match get_prospect(state.store.as_ref(), id).await {
        Ok(Some(mut record)) => {
            if record.phone.is_empty() && !phone.is_empty() {
                record.phone = phone.to_string();
            }
            tracing::info!(prospect = id, status = record.status.as_str(), "loaded prospect");
            Ok(record)
        }
        Ok(None) => {
            tracing::info!(prospect = id, "no stored prospect, starting a new record");
            Ok(ProspectRecord::with_id(id, phone))
        }
        Err(StoreError::Corrupt { id, reason }) => {
            tracing::warn!(prospect = %id, %reason, "stored prospect is corrupt, starting a new record");
            Ok(ProspectRecord::with_id(&id, phone))
        }
        Err(e) => Err(e.into()),
    }
}

async fn find(state: &Arc<AppState>, session_id: &str) -> Result<Arc<Mutex<CallSession>>, AppError> {
    state
        .sessions
        .lock()
        .await
        .get(session_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("session {session_id}")))
}

pub async fn view_session(state: &Arc<AppState>, session_id: &str) -> Result<SessionView, AppError> {
    let session = find(state, session_id).await?;
    let session = session.lock().await;
    let booking = &session.booking;

    Ok(SessionView {
        session_id: session.id.clone(),
        variant: booking.variant(),
        state: booking.state(),
        started_at: session.started_at,
        collected: booking.collected(),
        missing: booking.missing(),
        record: booking.record().clone(),
    })
}

pub async fn invoke_tool(
    state: &Arc<AppState>,
    session_id: &str,
    tool_name: &str,
    value: Option<String>,
) -> Result<ToolReply, AppError> {
    let tool =
        Tool::parse(tool_name).ok_or_else(|| SessionError::UnknownTool(tool_name.to_string()))?;
    let session = find(state, session_id).await?;
    let mut session = session.lock().await;

    tracing::info!(session = session_id, tool = tool_name, "tool invoked");

    let reply = match tool {
        Tool::SetField(field) => {
            if !session.booking.variant().offers(field) {
                return Err(SessionError::UnknownTool(tool_name.to_string()).into());
            }
            let value = require_value(tool_name, value)?;
            let today = Utc::now().date_naive();
            ToolReply::Field(session.booking.set_field(field, &value, today)?)
        }
        Tool::ConfirmAppointmentDetails => ToolReply::Confirm(
            session
                .booking
                .confirm(state.store.as_ref(), state.scheduler.as_ref())
                .await?,
        ),
        Tool::LookUpAvailability => {
            let date = value.unwrap_or_default();
            let delay = Duration::from_millis(state.config.availability_delay_ms);
            let slots = look_up_availability(&date, delay).await;
            ToolReply::Availability {
                result: "availability",
                date,
                slots,
            }
        }
        Tool::RecordObjection => {
            let value = require_value(tool_name, value)?;
            session.booking.record_objection(&value)?;
            ToolReply::Objection {
                result: "objection_recorded",
            }
        }
    };

    Ok(reply)
}

fn require_value(tool_name: &str, value: Option<String>) -> Result<String, AppError> {
    value.ok_or_else(|| AppError::BadRequest(format!("{tool_name} requires a value")))
}

pub async fn end_session(state: &Arc<AppState>, session_id: &str) -> Result<(), AppError> {
    let removed = state.sessions.lock().await.remove(session_id);
    match removed {
        Some(session) => {
            let session = session.lock().await;
            tracing::info!(
                session = session_id,
                prospect = %session.booking.record().id,
                state = ?session.booking.state(),
                "session ended"
            );
            Ok(())
        }
        None => Err(AppError::NotFound(format!("session {session_id}"))),
    }
}
