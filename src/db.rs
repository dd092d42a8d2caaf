// Clinic API - Storage Layer
// Connection setup, schema DDL, and insert helpers used by the seeder and
// tests. The API core itself only ever reads.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::models::{Appointment, AppointmentService, Patient, Payment, Provider, Service};

/// Shared store handle, passed explicitly into every request-handling call.
pub type Db = Arc<Mutex<Connection>>;

/// Canonical timestamp text: RFC 3339 UTC, second precision, `Z` suffix.
/// Fixed-width, so SQLite text comparison order equals temporal order, which
/// the keyset predicates rely on.
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_ts(text: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(text)
        .with_context(|| format!("invalid timestamp in store: {text}"))?;
    Ok(parsed.with_timezone(&Utc))
}

/// Read a required timestamp column inside a rusqlite row mapper.
pub fn ts_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    parse_ts(&text).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, err.into())
    })
}

/// Read a nullable timestamp column inside a rusqlite row mapper.
pub fn opt_ts_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    match text {
        None => Ok(None),
        Some(text) => parse_ts(&text).map(Some).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, err.into())
        }),
    }
}

/// Open (or create) the database file and ensure the schema exists.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    setup_schema(&conn)?;
    Ok(conn)
}

pub fn setup_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS patient (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            date_of_birth TEXT,
            gender TEXT NOT NULL,
            source TEXT NOT NULL,
            address TEXT NOT NULL,
            phone TEXT NOT NULL,
            email TEXT NOT NULL,
            created_date TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS provider (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT NOT NULL,
            created_date TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS service (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            price INTEGER NOT NULL CHECK (price >= 0),
            duration INTEGER NOT NULL,
            created_date TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS appointment (
            id TEXT PRIMARY KEY,
            patient_id TEXT NOT NULL REFERENCES patient(id),
            status TEXT NOT NULL,
            created_date TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS appointment_service (
            appointment_id TEXT NOT NULL REFERENCES appointment(id),
            service_id TEXT NOT NULL REFERENCES service(id),
            provider_id TEXT NOT NULL REFERENCES provider(id),
            start TEXT NOT NULL,
            \"end\" TEXT NOT NULL,
            PRIMARY KEY (appointment_id, service_id),
            CHECK (start <= \"end\")
        );

        CREATE TABLE IF NOT EXISTS payment (
            id TEXT PRIMARY KEY,
            patient_id TEXT NOT NULL REFERENCES patient(id),
            appointment_id TEXT NOT NULL REFERENCES appointment(id),
            provider_id TEXT NOT NULL REFERENCES provider(id),
            service_id TEXT NOT NULL REFERENCES service(id),
            amount INTEGER NOT NULL CHECK (amount >= 0),
            date TEXT NOT NULL,
            method TEXT NOT NULL,
            status TEXT NOT NULL,
            created_date TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_patient_created_date ON patient(created_date);
        CREATE INDEX IF NOT EXISTS idx_appointment_patient ON appointment(patient_id);
        CREATE INDEX IF NOT EXISTS idx_appointment_status ON appointment(status);
        CREATE INDEX IF NOT EXISTS idx_appt_service_provider ON appointment_service(provider_id);
        CREATE INDEX IF NOT EXISTS idx_appt_service_service ON appointment_service(service_id);
        CREATE INDEX IF NOT EXISTS idx_payment_appointment ON payment(appointment_id);
        CREATE INDEX IF NOT EXISTS idx_payment_provider_status ON payment(provider_id, status);
        CREATE INDEX IF NOT EXISTS idx_payment_service_status ON payment(service_id, status);
        ",
    )?;

    Ok(())
}

// ============================================================================
// Insert helpers (seeding / tests only)
// ============================================================================

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<()> {
    conn.execute(
        "INSERT INTO patient (
            id, first_name, last_name, date_of_birth, gender, source,
            address, phone, email, created_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            patient.id,
            patient.first_name,
            patient.last_name,
            patient.date_of_birth.map(fmt_ts),
            patient.gender,
            patient.source,
            patient.address,
            patient.phone,
            patient.email,
            fmt_ts(patient.created_date),
        ],
    )?;
    Ok(())
}

pub fn insert_provider(conn: &Connection, provider: &Provider) -> Result<()> {
    conn.execute(
        "INSERT INTO provider (id, first_name, last_name, email, phone, created_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            provider.id,
            provider.first_name,
            provider.last_name,
            provider.email,
            provider.phone,
            fmt_ts(provider.created_date),
        ],
    )?;
    Ok(())
}

pub fn insert_service(conn: &Connection, service: &Service) -> Result<()> {
    conn.execute(
        "INSERT INTO service (id, name, description, price, duration, created_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            service.id,
            service.name,
            service.description,
            service.price,
            service.duration,
            fmt_ts(service.created_date),
        ],
    )?;
    Ok(())
}

pub fn insert_appointment(conn: &Connection, appointment: &Appointment) -> Result<()> {
    conn.execute(
        "INSERT INTO appointment (id, patient_id, status, created_date)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            appointment.id,
            appointment.patient_id,
            appointment.status,
            fmt_ts(appointment.created_date),
        ],
    )?;
    Ok(())
}

pub fn insert_appointment_service(conn: &Connection, entry: &AppointmentService) -> Result<()> {
    conn.execute(
        "INSERT INTO appointment_service (appointment_id, service_id, provider_id, start, \"end\")
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.appointment_id,
            entry.service_id,
            entry.provider_id,
            fmt_ts(entry.start),
            fmt_ts(entry.end),
        ],
    )?;
    Ok(())
}

pub fn insert_payment(conn: &Connection, payment: &Payment) -> Result<()> {
    conn.execute(
        "INSERT INTO payment (
            id, patient_id, appointment_id, provider_id, service_id,
            amount, date, method, status, created_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            payment.id,
            payment.patient_id,
            payment.appointment_id,
            payment.provider_id,
            payment.service_id,
            payment.amount,
            fmt_ts(payment.date),
            payment.method,
            payment.status,
            fmt_ts(payment.created_date),
        ],
    )?;
    Ok(())
}
