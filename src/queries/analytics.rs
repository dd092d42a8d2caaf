// Clinic API - Aggregation Engine
// Fixed-shape analytics snapshots over the full entity set (no pagination).
// Monetary values stay i64 minor units throughout; the only float is the
// non-monetary services-per-appointment ratio.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::parse_ts;
use crate::error::ApiError;
use crate::models::{AppointmentStatus, Gender, Source};

/// Fixed age buckets; every key always appears in the output.
pub const AGE_BUCKETS: [&str; 7] = [
    "0-17", "18-24", "25-34", "35-44", "45-54", "55-64", "65+",
];

/// Fixed appointment-count buckets for patient behavior.
pub const APPOINTMENT_BUCKETS: [&str; 7] = ["0", "1", "2", "3", "4", "5", "6+"];

const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Whole years of age at the reference date; `None` for birth dates in the
/// future. A patient born exactly N years ago is N years old today.
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    today.years_since(date_of_birth)
}

pub fn age_bucket(age: u32) -> &'static str {
    match age {
        0..=17 => "0-17",
        18..=24 => "18-24",
        25..=34 => "25-34",
        35..=44 => "35-44",
        45..=54 => "45-54",
        55..=64 => "55-64",
        _ => "65+",
    }
}

// ============================================================================
// Response shapes
// ============================================================================

#[derive(Debug, Serialize)]
pub struct Demographics {
    #[serde(rename = "totalPatients")]
    pub total_patients: i64,
    #[serde(rename = "genderDistribution")]
    pub gender_distribution: BTreeMap<String, i64>,
    #[serde(rename = "ageDistribution")]
    pub age_distribution: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize)]
pub struct Sources {
    #[serde(rename = "sourceDistribution")]
    pub source_distribution: BTreeMap<String, i64>,
    /// Keyed `YYYY-MM`, chronological; only months with at least one record.
    #[serde(rename = "patientsByMonth")]
    pub patients_by_month: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopService {
    pub id: String,
    pub name: String,
    pub count: i64,
    pub revenue: i64,
}

#[derive(Debug, Serialize)]
pub struct ServicesAnalytics {
    #[serde(rename = "topServices")]
    pub top_services: Vec<TopService>,
    #[serde(rename = "totalRevenue")]
    pub total_revenue: i64,
    #[serde(rename = "averagePayment")]
    pub average_payment: i64,
    #[serde(rename = "totalPayments")]
    pub total_payments: i64,
}

#[derive(Debug, Serialize)]
pub struct ProviderStat {
    pub id: String,
    pub name: String,
    #[serde(rename = "appointmentCount")]
    pub appointment_count: i64,
    pub revenue: i64,
}

#[derive(Debug, Serialize)]
pub struct ProvidersAnalytics {
    pub providers: Vec<ProviderStat>,
}

#[derive(Debug, Serialize)]
pub struct AppointmentsAnalytics {
    #[serde(rename = "statusDistribution")]
    pub status_distribution: BTreeMap<String, i64>,
    #[serde(rename = "avgServicesPerAppointment")]
    pub avg_services_per_appointment: String,
    #[serde(rename = "appointmentsByDay")]
    pub appointments_by_day: BTreeMap<String, i64>,
    #[serde(rename = "totalAppointments")]
    pub total_appointments: i64,
}

#[derive(Debug, Serialize)]
pub struct PatientBehavior {
    #[serde(rename = "patientsByAppointmentCount")]
    pub patients_by_appointment_count: BTreeMap<String, i64>,
    #[serde(rename = "topServicesByRevenue")]
    pub top_services_by_revenue: Vec<TopService>,
    #[serde(rename = "topServicesByBookings")]
    pub top_services_by_bookings: Vec<TopService>,
}

#[derive(Debug, Serialize)]
pub struct BusinessAnalytics {
    #[serde(rename = "topServices")]
    pub top_services: Vec<TopService>,
    #[serde(rename = "totalRevenue")]
    pub total_revenue: i64,
    #[serde(rename = "averagePayment")]
    pub average_payment: i64,
    #[serde(rename = "totalPayments")]
    pub total_payments: i64,
    #[serde(rename = "statusDistribution")]
    pub status_distribution: BTreeMap<String, i64>,
    #[serde(rename = "avgServicesPerAppointment")]
    pub avg_services_per_appointment: String,
    #[serde(rename = "appointmentsByDay")]
    pub appointments_by_day: BTreeMap<String, i64>,
    #[serde(rename = "totalAppointments")]
    pub total_appointments: i64,
}

// ============================================================================
// Aggregations
// ============================================================================

pub fn demographics(conn: &Connection, today: NaiveDate) -> Result<Demographics, ApiError> {
    let total_patients: i64 =
        conn.query_row("SELECT COUNT(*) FROM patient", [], |row| row.get(0))?;

    let mut gender_distribution: BTreeMap<String, i64> = Gender::ALL
        .iter()
        .map(|g| (g.as_str().to_string(), 0))
        .collect();
    let mut stmt = conn.prepare("SELECT gender, COUNT(*) FROM patient GROUP BY gender")?;
    let counts = stmt.query_map([], |row| {
        Ok((row.get::<_, Gender>(0)?, row.get::<_, i64>(1)?))
    })?;
    for entry in counts {
        let (gender, count) = entry?;
        gender_distribution.insert(gender.as_str().to_string(), count);
    }

    // Bucket ages in Rust so the exact-boundary rule lives in one testable
    // place. Null birth dates are counted in the total but in no bucket.
    let mut age_distribution: BTreeMap<String, i64> =
        AGE_BUCKETS.iter().map(|b| (b.to_string(), 0)).collect();
    let mut stmt =
        conn.prepare("SELECT date_of_birth FROM patient WHERE date_of_birth IS NOT NULL")?;
    let dobs = stmt.query_map([], |row| row.get::<_, String>(0))?;
    for dob in dobs {
        let dob = parse_ts(&dob?)?.date_naive();
        if let Some(age) = age_on(dob, today) {
            if let Some(count) = age_distribution.get_mut(age_bucket(age)) {
                *count += 1;
            }
        }
    }

    Ok(Demographics {
        total_patients,
        gender_distribution,
        age_distribution,
    })
}

pub fn sources(conn: &Connection) -> Result<Sources, ApiError> {
    let mut source_distribution: BTreeMap<String, i64> = Source::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    let mut stmt = conn.prepare("SELECT source, COUNT(*) FROM patient GROUP BY source")?;
    let counts = stmt.query_map([], |row| {
        Ok((row.get::<_, Source>(0)?, row.get::<_, i64>(1)?))
    })?;
    for entry in counts {
        let (source, count) = entry?;
        source_distribution.insert(source.as_str().to_string(), count);
    }

    let mut stmt = conn.prepare(
        "SELECT strftime('%Y-%m', created_date) AS month, COUNT(*)
         FROM patient
         GROUP BY month
         ORDER BY month ASC",
    )?;
    let patients_by_month: BTreeMap<String, i64> = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<Result<_, _>>()?;

    Ok(Sources {
        source_distribution,
        patients_by_month,
    })
}

#[derive(Debug, Clone, Copy)]
enum ServiceRank {
    Bookings,
    Revenue,
}

/// Top-10 services with booking counts (join-table rows) and paid revenue,
/// ranked by the requested measure; ties broken by service id ascending.
fn top_services(conn: &Connection, rank: ServiceRank) -> Result<Vec<TopService>, ApiError> {
    let order = match rank {
        ServiceRank::Bookings => "bookings DESC, s.id ASC",
        ServiceRank::Revenue => "revenue DESC, s.id ASC",
    };
    let sql = format!(
        "SELECT s.id, s.name, COALESCE(b.n, 0) AS bookings, COALESCE(r.total, 0) AS revenue
         FROM service s
         LEFT JOIN (
             SELECT service_id, COUNT(*) AS n
             FROM appointment_service
             GROUP BY service_id
         ) b ON b.service_id = s.id
         LEFT JOIN (
             SELECT service_id, SUM(amount) AS total
             FROM payment
             WHERE status = 'paid'
             GROUP BY service_id
         ) r ON r.service_id = s.id
         ORDER BY {order}
         LIMIT 10"
    );

    let mut stmt = conn.prepare(&sql)?;
    let services = stmt
        .query_map([], |row| {
            Ok(TopService {
                id: row.get(0)?,
                name: row.get(1)?,
                count: row.get(2)?,
                revenue: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(services)
}

/// Total paid revenue and paid-payment count. Pending and failed payments are
/// excluded from every revenue and average figure.
fn paid_totals(conn: &Connection) -> Result<(i64, i64), ApiError> {
    let totals = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0), COUNT(*) FROM payment WHERE status = 'paid'",
        [],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
    )?;
    Ok(totals)
}

/// Integer floor division; 0 when the divisor is 0.
fn floor_average(total: i64, count: i64) -> i64 {
    if count > 0 {
        total / count
    } else {
        0
    }
}

pub fn services(conn: &Connection) -> Result<ServicesAnalytics, ApiError> {
    let top = top_services(conn, ServiceRank::Bookings)?;
    let (total_revenue, total_payments) = paid_totals(conn)?;

    Ok(ServicesAnalytics {
        top_services: top,
        total_revenue,
        average_payment: floor_average(total_revenue, total_payments),
        total_payments,
    })
}

/// Top-5 busiest providers by distinct-appointment count, ties by id
/// ascending.
pub fn providers(conn: &Connection) -> Result<ProvidersAnalytics, ApiError> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.first_name || ' ' || p.last_name AS name,
                COALESCE(ac.n, 0) AS appointment_count,
                COALESCE(rv.total, 0) AS revenue
         FROM provider p
         LEFT JOIN (
             SELECT provider_id, COUNT(DISTINCT appointment_id) AS n
             FROM appointment_service
             GROUP BY provider_id
         ) ac ON ac.provider_id = p.id
         LEFT JOIN (
             SELECT provider_id, SUM(amount) AS total
             FROM payment
             WHERE status = 'paid'
             GROUP BY provider_id
         ) rv ON rv.provider_id = p.id
         ORDER BY appointment_count DESC, p.id ASC
         LIMIT 5",
    )?;
    let providers = stmt
        .query_map([], |row| {
            Ok(ProviderStat {
                id: row.get(0)?,
                name: row.get(1)?,
                appointment_count: row.get(2)?,
                revenue: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ProvidersAnalytics { providers })
}

fn status_distribution(conn: &Connection) -> Result<BTreeMap<String, i64>, ApiError> {
    let mut distribution: BTreeMap<String, i64> = AppointmentStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM appointment GROUP BY status")?;
    let counts = stmt.query_map([], |row| {
        Ok((row.get::<_, AppointmentStatus>(0)?, row.get::<_, i64>(1)?))
    })?;
    for entry in counts {
        let (status, count) = entry?;
        distribution.insert(status.as_str().to_string(), count);
    }
    Ok(distribution)
}

/// Weekday histogram over service slot starts, counting each appointment at
/// most once per weekday even when it has several services that day.
fn appointments_by_day(conn: &Connection) -> Result<BTreeMap<String, i64>, ApiError> {
    let mut stmt = conn.prepare(
        "SELECT strftime('%w', start) AS dow, COUNT(DISTINCT appointment_id)
         FROM appointment_service
         GROUP BY dow",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut by_day = BTreeMap::new();
    for entry in rows {
        let (dow, count) = entry?;
        let idx: usize = dow.parse().map_err(|_| {
            ApiError::Store(anyhow::anyhow!("unexpected weekday index from store: {dow}"))
        })?;
        let name = WEEKDAYS.get(idx).ok_or_else(|| {
            ApiError::Store(anyhow::anyhow!("unexpected weekday index from store: {dow}"))
        })?;
        by_day.insert(name.to_string(), count);
    }
    Ok(by_day)
}

fn avg_services_per_appointment(conn: &Connection) -> Result<(String, i64), ApiError> {
    let total_appointments: i64 =
        conn.query_row("SELECT COUNT(*) FROM appointment", [], |row| row.get(0))?;
    let total_services: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointment_service",
        [],
        |row| row.get(0),
    )?;

    let avg = if total_appointments > 0 {
        format!(
            "{:.2}",
            total_services as f64 / total_appointments as f64
        )
    } else {
        "0.00".to_string()
    };
    Ok((avg, total_appointments))
}

pub fn appointments(conn: &Connection) -> Result<AppointmentsAnalytics, ApiError> {
    let (avg, total_appointments) = avg_services_per_appointment(conn)?;

    Ok(AppointmentsAnalytics {
        status_distribution: status_distribution(conn)?,
        avg_services_per_appointment: avg,
        appointments_by_day: appointments_by_day(conn)?,
        total_appointments,
    })
}

/// Patients bucketed by their appointment count (any status); zero-appointment
/// patients are included via the outer join.
pub fn patient_behavior(conn: &Connection) -> Result<PatientBehavior, ApiError> {
    let mut buckets: BTreeMap<String, i64> = APPOINTMENT_BUCKETS
        .iter()
        .map(|b| (b.to_string(), 0))
        .collect();

    let mut stmt = conn.prepare(
        "SELECT COALESCE(a.n, 0) AS appointments, COUNT(*)
         FROM patient p
         LEFT JOIN (
             SELECT patient_id, COUNT(*) AS n
             FROM appointment
             GROUP BY patient_id
         ) a ON a.patient_id = p.id
         GROUP BY appointments",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
    })?;
    for entry in rows {
        let (appointments, patients) = entry?;
        let key = if appointments >= 6 {
            "6+".to_string()
        } else {
            appointments.to_string()
        };
        if let Some(count) = buckets.get_mut(&key) {
            *count += patients;
        }
    }

    Ok(PatientBehavior {
        patients_by_appointment_count: buckets,
        top_services_by_revenue: top_services(conn, ServiceRank::Revenue)?,
        top_services_by_bookings: top_services(conn, ServiceRank::Bookings)?,
    })
}

/// Consolidated business snapshot: the services and appointments aggregates
/// in one response.
pub fn business(conn: &Connection) -> Result<BusinessAnalytics, ApiError> {
    let top = top_services(conn, ServiceRank::Bookings)?;
    let (total_revenue, total_payments) = paid_totals(conn)?;
    let (avg, total_appointments) = avg_services_per_appointment(conn)?;

    Ok(BusinessAnalytics {
        top_services: top,
        total_revenue,
        average_payment: floor_average(total_revenue, total_payments),
        total_payments,
        status_distribution: status_distribution(conn)?,
        avg_services_per_appointment: avg,
        appointments_by_day: appointments_by_day(conn)?,
        total_appointments,
    })
}
