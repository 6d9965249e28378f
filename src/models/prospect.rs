use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProspectRecord {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: String,
    pub timezone: Option<String>,
    pub status: ProspectStatus,
    pub objections: Vec<String>,
    pub responses: Vec<String>,
    pub appointment_date: Option<NaiveDate>,
    /// 24-hour `HH:MM`.
    pub appointment_time: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub whatsapp_phone: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ProspectRecord {
    pub fn new(phone: &str) -> Self {
        Self::with_id(&uuid::Uuid::new_v4().to_string(), phone)
    }

    pub fn with_id(id: &str, phone: &str) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id: id.to_string(),
            first_name: None,
            last_name: None,
            phone: phone.to_string(),
            timezone: None,
            status: ProspectStatus::New,
            objections: vec![],
            responses: vec![],
            appointment_date: None,
            appointment_time: None,
            email: None,
            address: None,
            whatsapp_phone: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: FieldUpdate) {
        match update {
            FieldUpdate::FirstName(v) => self.first_name = Some(v),
            FieldUpdate::LastName(v) => self.last_name = Some(v),
            FieldUpdate::AppointmentDate(d) => self.appointment_date = Some(d),
            FieldUpdate::AppointmentTime(t) => self.appointment_time = Some(t),
            FieldUpdate::Email(v) => self.email = Some(v),
            FieldUpdate::Timezone(v) => self.timezone = Some(v),
            FieldUpdate::Address(v) => self.address = Some(v),
            FieldUpdate::WhatsappPhone(v) => self.whatsapp_phone = Some(v),
        }
    }

    pub fn has(&self, field: ProspectField) -> bool {
        match field {
            ProspectField::FirstName => self.first_name.is_some(),
            ProspectField::LastName => self.last_name.is_some(),
            ProspectField::AppointmentDate => self.appointment_date.is_some(),
            ProspectField::AppointmentTime => self.appointment_time.is_some(),
            ProspectField::Email => self.email.is_some(),
            ProspectField::Timezone => self.timezone.is_some(),
            ProspectField::Address => self.address.is_some(),
            ProspectField::WhatsappPhone => self.whatsapp_phone.is_some(),
        }
    }

    /// How a collected value reads back to the caller.
    pub fn spoken_value(&self, field: ProspectField) -> Option<String> {
        match field {
            ProspectField::FirstName => self.first_name.clone(),
            ProspectField::LastName => self.last_name.clone(),
            ProspectField::AppointmentDate => self.appointment_date.map(datetime::spoken_date),
            ProspectField::AppointmentTime => self
                .appointment_time
                .as_deref()
                .and_then(datetime::human_time),
            ProspectField::Email => self.email.clone(),
            ProspectField::Timezone => self.timezone.clone(),
            ProspectField::Address => self.address.clone(),
            ProspectField::WhatsappPhone => self.whatsapp_phone.clone(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.first_name.as_deref().unwrap_or("Unknown")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProspectStatus {
    New,
    InProgress,
    Booked,
    Lost,
}

impl ProspectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProspectStatus::New => "new",
            ProspectStatus::InProgress => "in_progress",
            ProspectStatus::Booked => "booked",
            ProspectStatus::Lost => "lost",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(ProspectStatus::New),
            "in_progress" => Some(ProspectStatus::InProgress),
            "booked" => Some(ProspectStatus::Booked),
            "lost" => Some(ProspectStatus::Lost),
            _ => None,
        }
    }
}

/// The closed set of fields a conversation tool may set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ProspectField {
    AppointmentDate,
    AppointmentTime,
    Email,
    Timezone,
    Address,
    WhatsappPhone,
    FirstName,
    LastName,
}

const FIELD_TOOLS: &[(&str, ProspectField)] = &[
    ("set_appointment_date", ProspectField::AppointmentDate),
    ("set_appointment_time", ProspectField::AppointmentTime),
    ("set_email", ProspectField::Email),
    ("set_timezone", ProspectField::Timezone),
    ("set_address", ProspectField::Address),
    ("set_whatsapp_phone", ProspectField::WhatsappPhone),
    ("set_first_name", ProspectField::FirstName),
    ("set_last_name", ProspectField::LastName),
];

impl ProspectField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProspectField::AppointmentDate => "appointment_date",
            ProspectField::AppointmentTime => "appointment_time",
            ProspectField::Email => "email",
            ProspectField::Timezone => "timezone",
            ProspectField::Address => "address",
            ProspectField::WhatsappPhone => "whatsapp_phone",
            ProspectField::FirstName => "first_name",
            ProspectField::LastName => "last_name",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProspectField::AppointmentDate => "Date",
            ProspectField::AppointmentTime => "Time",
            ProspectField::Email => "Email",
            ProspectField::Timezone => "Timezone",
            ProspectField::Address => "Address",
            ProspectField::WhatsappPhone => "WhatsApp number",
            ProspectField::FirstName => "First name",
            ProspectField::LastName => "Last name",
        }
    }

    pub fn tool_name(&self) -> &'static str {
        FIELD_TOOLS
            .iter()
            .find(|(_, f)| f == self)
            .map(|(name, _)| *name)
            .unwrap_or("")
    }

    pub fn from_tool_name(name: &str) -> Option<Self> {
        FIELD_TOOLS
            .iter()
            .find(|(tool, _)| *tool == name)
            .map(|(_, field)| *field)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    #[error("no value given for {0}")]
    Empty(&'static str),

    #[error("could not understand the date '{0}'")]
    InvalidDate(String),

    #[error("could not understand the time '{0}'")]
    InvalidTime(String),

    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
}

/// A validated, typed value for exactly one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    AppointmentDate(NaiveDate),
    AppointmentTime(String),
    Email(String),
    Timezone(String),
    Address(String),
    WhatsappPhone(String),
    FirstName(String),
    LastName(String),
}

impl FieldUpdate {
    pub fn parse(field: ProspectField, raw: &str, today: NaiveDate) -> Result<Self, FieldError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(FieldError::Empty(field.as_str()));
        }

        let update = match field {
            ProspectField::AppointmentDate => datetime::parse_date_on(value, today)
                .map(FieldUpdate::AppointmentDate)
                .ok_or_else(|| FieldError::InvalidDate(value.to_string()))?,
            ProspectField::AppointmentTime => datetime::parse_time(value)
                .map(FieldUpdate::AppointmentTime)
                .ok_or_else(|| FieldError::InvalidTime(value.to_string()))?,
            ProspectField::Email => FieldUpdate::Email(normalize_email(value)?),
            ProspectField::Timezone => FieldUpdate::Timezone(value.to_string()),
            ProspectField::Address => FieldUpdate::Address(value.to_string()),
            ProspectField::WhatsappPhone => FieldUpdate::WhatsappPhone(value.to_string()),
            ProspectField::FirstName => FieldUpdate::FirstName(value.to_string()),
            ProspectField::LastName => FieldUpdate::LastName(value.to_string()),
        };
        Ok(update)
    }
}

/// Lowercases, joins spoken " at " / " dot ", and drops spaces.
fn normalize_email(raw: &str) -> Result<String, FieldError> {
    let spoken = format!(" {} ", raw.to_lowercase());
    let email: String = spoken
        .replace(" at ", "@")
        .replace(" dot ", ".")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };

    if valid {
        Ok(email)
    } else {
        Err(FieldError::InvalidEmail(raw.to_string()))
    }
}
