//! Data models for the valet server

pub mod agent;
pub mod record;
pub mod report;

// Re-export commonly used types
pub use agent::{Agent, AgentClaims, AgentProfile};
pub use record::{RecordStatus, ValetRecord};
pub use report::{DailyReport, DailySummary};
