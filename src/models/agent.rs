use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::datetime;
use crate::models::{ProspectField, ProspectRecord};

/// The agent scripts that are deployed. They differ in what must be
/// collected before a booking can be confirmed and in how the meeting is
/// described.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentVariant {
    Screening,
    Phone,
    Property,
}

const SCREENING_FIELDS: &[ProspectField] = &[
    ProspectField::AppointmentDate,
    ProspectField::AppointmentTime,
    ProspectField::Timezone,
    ProspectField::Email,
];

const PHONE_FIELDS: &[ProspectField] = &[
    ProspectField::AppointmentDate,
    ProspectField::AppointmentTime,
    ProspectField::Timezone,
    ProspectField::Email,
    ProspectField::Address,
];

const PROPERTY_FIELDS: &[ProspectField] = &[
    ProspectField::AppointmentDate,
    ProspectField::AppointmentTime,
    ProspectField::Timezone,
    ProspectField::Email,
    ProspectField::WhatsappPhone,
];

/// Property calls also take the site address, but can book without it.
const PROPERTY_OFFERED: &[ProspectField] = &[
    ProspectField::AppointmentDate,
    ProspectField::AppointmentTime,
    ProspectField::Timezone,
    ProspectField::Email,
    ProspectField::Address,
    ProspectField::WhatsappPhone,
];

#[derive(Debug, thiserror::Error)]
#[error("unknown agent variant '{0}' (expected screening|phone|property)")]
pub struct UnknownVariant(String);

impl FromStr for AgentVariant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "screening" => Ok(AgentVariant::Screening),
            "phone" => Ok(AgentVariant::Phone),
            "property" => Ok(AgentVariant::Property),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: String,
}

impl AgentVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentVariant::Screening => "screening",
            AgentVariant::Phone => "phone",
            AgentVariant::Property => "property",
        }
    }

    pub fn required_fields(&self) -> &'static [ProspectField] {
        match self {
            AgentVariant::Screening => SCREENING_FIELDS,
            AgentVariant::Phone => PHONE_FIELDS,
            AgentVariant::Property => PROPERTY_FIELDS,
        }
    }

    /// Every field this variant has a `set_*` tool for, in read-back order.
    /// Always a superset of [`Self::required_fields`].
    pub fn offered_fields(&self) -> &'static [ProspectField] {
        match self {
            AgentVariant::Property => PROPERTY_OFFERED,
            other => other.required_fields(),
        }
    }

    pub fn offers(&self, field: ProspectField) -> bool {
        self.offered_fields().contains(&field)
    }

    pub fn meeting_summary(&self, record: &ProspectRecord) -> String {
        let name = record.display_name();
        match self {
            AgentVariant::Screening => format!(
                "Bootcoding Pvt Limited Frontend Developer Recruitment: Screening Round Call for - {name}"
            ),
            AgentVariant::Phone => format!("Hedoo Developers Discovery Call - {name}"),
            AgentVariant::Property => format!("Hedoo Developers Appointment Call for - {name}"),
        }
    }

    pub fn meeting_description(&self) -> &'static str {
        match self {
            AgentVariant::Screening => {
                "10 minutes Screening Round conducted by a Senior Developer so we can assess you \
                 and make sure you are the right fit for this role."
            }
            AgentVariant::Phone => {
                "Discovery call to discuss affordable flat options at Magnolia Building, Civil Lines, Nagpur."
            }
            AgentVariant::Property => {
                "Appointment call to discuss affordable flats options at Magnolia Building, Civil Lines, Nagpur."
            }
        }
    }

    /// Tools the host runtime should expose to the model for this variant.
    pub fn tools(&self) -> Vec<ToolSpec> {
        let mut tools: Vec<ToolSpec> = self
            .offered_fields()
            .iter()
            .map(|field| ToolSpec {
                name: field.tool_name(),
                description: format!(
                    "Call this function when the user has provided their {}.",
                    field.label().to_lowercase()
                ),
            })
            .collect();

        tools.push(ToolSpec {
            name: "confirm_appointment_details",
            description: "Call this function when the user confirms the appointment details are \
                          correct. This will schedule the actual appointment."
                .to_string(),
        });
        tools.push(ToolSpec {
            name: "look_up_availability",
            description: "Called when the user asks about alternative appointment availability \
                          for a date."
                .to_string(),
        });
        tools.push(ToolSpec {
            name: "record_objection",
            description: "Call this function when the user raises an objection.".to_string(),
        });
        tools
    }

    pub fn instructions(&self, record: &ProspectRecord, today: NaiveDate) -> String {
        let (d1, d2) = datetime::next_two_dates(today);
        let d1 = datetime::spoken_date(d1);
        let d2 = datetime::spoken_date(d2);
        let name = record.display_name();

        let (persona, goal, greeting) = match self {
            AgentVariant::Screening => (
                "You are Adarsh Rai, a Senior Frontend Developer at Bootcoding Pvt Limited.",
                "schedule the 10-minute screening round for the Frontend Developer role",
                format!(
                    "Hello, my name is Adarsh Rai, Senior Frontend Developer from Bootcoding Pvt \
                     Limited. Am I speaking with {name}?"
                ),
            ),
            AgentVariant::Phone => (
                "You are Adarsh, a sales agent working for Hedoo Developers.",
                "book the prospect into a discovery call",
                format!("Hey, this is Adarsh from Hedoo Developers, am I speaking with {name}?"),
            ),
            AgentVariant::Property => (
                "You are Adarsh, a sales agent working for Hedoo Developers.",
                "book the prospect into a meeting and schedule a site visit",
                format!("Hey, this is Adarsh from Hedoo Developers, am I speaking with {name}?"),
            ),
        };
        let collect: Vec<String> = self
            .offered_fields()
            .iter()
            .map(|f| f.label().to_lowercase())
            .collect();

        format!(
            "{persona}\n\
             Your #1 job is to {goal}.\n\
             Start the call with: '{greeting}' and wait for their answer.\n\
             Never book same-day. Offer exactly two slots: '{d1} at 10am' OR '{d2} at 2pm'.\n\
             Always ask for the timezone as an IANA zone name; if unknown, ask for their city and deduce it.\n\
             Collect: {fields}. Call the matching tool as soon as each one is given.\n\
             When all details are read back and the user agrees, call confirm_appointment_details.",
            fields = collect.join(", "),
        )
    }
}
