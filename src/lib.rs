// Clinic API - Core Library
// Patient-management read API: keyset pagination and analytics aggregation
// over a small relational schema.

pub mod cursor;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod queries;
pub mod server;

// Re-export commonly used types
pub use db::Db;
pub use error::ApiError;
pub use models::{
    Appointment, AppointmentService, AppointmentStatus, Gender, Patient, Payment, PaymentMethod,
    PaymentStatus, Provider, Service, Source,
};
pub use pagination::{Page, SortOrder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
