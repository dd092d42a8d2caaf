// Clinic API - Query Layer
// Parameterized read-only SQL behind the HTTP handlers.

pub mod analytics;
pub mod patients;
pub mod providers;
