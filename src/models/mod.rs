pub mod agent;
pub mod prospect;

pub use agent::{AgentVariant, ToolSpec};
pub use prospect::{FieldError, FieldUpdate, ProspectField, ProspectRecord, ProspectStatus};
