// Clinic API - Domain Entities
// Closed enums and row types for the clinic schema

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a stored or submitted enum value is outside the closed set.
#[derive(Debug, Error)]
#[error("unrecognized {kind} value: {value}")]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a closed wire enum: lowercase snake_case strings on the wire and
/// in the store, parse-don't-validate everywhere else.
macro_rules! wire_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                $name::parse(text).ok_or_else(|| {
                    FromSqlError::Other(Box::new(EnumParseError {
                        kind: $kind,
                        value: text.to_string(),
                    }))
                })
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(self.as_str().into())
            }
        }
    };
}

wire_enum!(Gender, "gender", {
    Male => "male",
    Female => "female",
    Other => "other",
});

wire_enum!(Source, "source", {
    InPerson => "in_person",
    Phone => "phone",
    Instagram => "instagram",
    Tiktok => "tiktok",
    Google => "google",
    Website => "website",
});

wire_enum!(AppointmentStatus, "appointment status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
});

wire_enum!(PaymentMethod, "payment method", {
    Cash => "cash",
    CreditCard => "credit_card",
    DebitCard => "debit_card",
    Check => "check",
});

wire_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
});

// ============================================================================
// Entities (read-only for the API core; created by seeding)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// Nullable: patients without a recorded birth date are counted in totals
    /// but excluded from age buckets.
    pub date_of_birth: Option<DateTime<Utc>>,
    pub gender: Gender,
    pub source: Source,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub created_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub created_date: DateTime<Utc>,
}

/// Billable unit. `price` is in minor currency units (cents), `duration` in
/// minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub duration: i64,
    pub created_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub status: AppointmentStatus,
    pub created_date: DateTime<Utc>,
}

/// Join row: one billable service performed by one provider within an
/// appointment, with its scheduled slot. Composite key (appointment, service).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentService {
    pub appointment_id: String,
    pub service_id: String,
    pub provider_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// `amount` is in minor currency units (cents). Only `paid` rows count toward
/// revenue anywhere in the analytics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub patient_id: String,
    pub appointment_id: String,
    pub provider_id: String,
    pub service_id: String,
    pub amount: i64,
    pub date: DateTime<Utc>,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub created_date: DateTime<Utc>,
}
