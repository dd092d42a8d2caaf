// Clinic API - Patient Queries
// Filtered, keyset-paginated patient listing and the patient detail view.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::cursor;
use crate::db::{opt_ts_col, ts_col};
use crate::error::ApiError;
use crate::models::{AppointmentStatus, Gender, Patient, Payment, Service, Source};
use crate::pagination::{keyset_predicate, truncate_page, Page, SortOrder};

/// Cursor state for the patient listing: last-seen sort key plus tie-break id.
/// Temporal sort values are carried as canonical RFC 3339 text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListCursor {
    pub sort_value: String,
    pub id: String,
}

/// Allowed sort fields, mapped explicitly to SQL expressions. Anything not in
/// this set is rejected up front; an absent `sortBy` falls back to the
/// creation timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientSortField {
    FirstName,
    LastName,
    Email,
    Phone,
    Gender,
    Source,
    DateOfBirth,
    CreatedDate,
}

impl PatientSortField {
    pub fn parse(value: Option<&str>) -> Result<Self, ApiError> {
        match value {
            None => Ok(PatientSortField::CreatedDate),
            Some("first_name") => Ok(PatientSortField::FirstName),
            Some("last_name") => Ok(PatientSortField::LastName),
            Some("email") => Ok(PatientSortField::Email),
            Some("phone") => Ok(PatientSortField::Phone),
            Some("gender") => Ok(PatientSortField::Gender),
            Some("source") => Ok(PatientSortField::Source),
            Some("date_of_birth") => Ok(PatientSortField::DateOfBirth),
            Some("created_date") => Ok(PatientSortField::CreatedDate),
            Some(other) => Err(ApiError::invalid(
                "sortBy",
                format!("`{other}` is not a sortable field"),
            )),
        }
    }

    /// SQL sort expression. Nullable date_of_birth is coalesced to the empty
    /// string so the keyset comparison stays total.
    pub fn sort_expr(&self) -> &'static str {
        match self {
            PatientSortField::FirstName => "first_name",
            PatientSortField::LastName => "last_name",
            PatientSortField::Email => "email",
            PatientSortField::Phone => "phone",
            PatientSortField::Gender => "gender",
            PatientSortField::Source => "source",
            PatientSortField::DateOfBirth => "COALESCE(date_of_birth, '')",
            PatientSortField::CreatedDate => "created_date",
        }
    }
}

/// Non-pagination filters for the patient listing. Enum filters arrive here
/// already parsed; raw strings never reach the store layer.
#[derive(Debug, Default)]
pub struct PatientFilter {
    pub search: Option<String>,
    pub gender: Option<Gender>,
    pub source: Option<Source>,
}

impl PatientFilter {
    /// WHERE conditions plus their bind values, in order.
    fn conditions(&self) -> (Vec<String>, Vec<Value>) {
        let mut conds = Vec::new();
        let mut values = Vec::new();

        if let Some(search) = &self.search {
            let pattern = format!("%{search}%");
            conds.push(
                "(first_name LIKE ? OR last_name LIKE ? OR email LIKE ? OR phone LIKE ?)"
                    .to_string(),
            );
            for _ in 0..4 {
                values.push(Value::Text(pattern.clone()));
            }
        }
        if let Some(gender) = self.gender {
            conds.push("gender = ?".to_string());
            values.push(Value::Text(gender.as_str().to_string()));
        }
        if let Some(source) = self.source {
            conds.push("source = ?".to_string());
            values.push(Value::Text(source.as_str().to_string()));
        }

        (conds, values)
    }
}

fn patient_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        date_of_birth: opt_ts_col(row, 3)?,
        gender: row.get(4)?,
        source: row.get(5)?,
        address: row.get(6)?,
        phone: row.get(7)?,
        email: row.get(8)?,
        created_date: ts_col(row, 9)?,
    })
}

/// List patients with filters, sorting, and keyset pagination.
///
/// `total` is computed by a separate full-filter count independent of cursor
/// and limit; the page fetches limit + 1 rows to detect continuation.
pub fn list_patients(
    conn: &Connection,
    filter: &PatientFilter,
    sort: PatientSortField,
    order: SortOrder,
    cursor: Option<ListCursor>,
    limit: i64,
) -> Result<Page<Patient>, ApiError> {
    let (conds, filter_values) = filter.conditions();

    // Full-filter count, independent of pagination
    let mut count_sql = "SELECT COUNT(*) FROM patient".to_string();
    if !conds.is_empty() {
        count_sql.push_str(" WHERE ");
        count_sql.push_str(&conds.join(" AND "));
    }
    let total: i64 = conn.query_row(
        &count_sql,
        params_from_iter(filter_values.iter().cloned()),
        |row| row.get(0),
    )?;

    let sort_expr = sort.sort_expr();
    let mut conds = conds;
    let mut values = filter_values;

    if let Some(cursor) = &cursor {
        conds.push(keyset_predicate(sort_expr, "id", order));
        values.push(Value::Text(cursor.sort_value.clone()));
        values.push(Value::Text(cursor.sort_value.clone()));
        values.push(Value::Text(cursor.id.clone()));
    }

    let mut sql = format!(
        "SELECT id, first_name, last_name, date_of_birth, gender, source,
                address, phone, email, created_date, {sort_expr} AS sort_key
         FROM patient"
    );
    if !conds.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conds.join(" AND "));
    }
    let dir = order.as_sql();
    sql.push_str(&format!(" ORDER BY sort_key {dir}, id {dir} LIMIT ?"));
    values.push(Value::Integer(limit + 1));

    let mut stmt = conn.prepare(&sql)?;
    let mut rows: Vec<(Patient, String)> = stmt
        .query_map(params_from_iter(values), |row| {
            let patient = patient_from_row(row)?;
            let sort_key: String = row.get(10)?;
            Ok((patient, sort_key))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let has_more = truncate_page(&mut rows, limit as usize);
    let next_cursor = if has_more {
        rows.last().map(|(patient, sort_key)| {
            cursor::encode(&ListCursor {
                sort_value: sort_key.clone(),
                id: patient.id.clone(),
            })
        })
    } else {
        None
    };

    Ok(Page {
        data: rows.into_iter().map(|(patient, _)| patient).collect(),
        next_cursor,
        has_more,
        total,
    })
}

// ============================================================================
// Patient detail
// ============================================================================

#[derive(Debug, Serialize)]
pub struct AppointmentDetail {
    pub id: String,
    pub patient_id: String,
    pub status: AppointmentStatus,
    pub created_date: DateTime<Utc>,
    pub services: Vec<Service>,
    /// At most one payment is surfaced per appointment; when several rows
    /// exist the most recent by payment date wins.
    pub payment: Option<Payment>,
}

#[derive(Debug, Serialize)]
pub struct PatientDetail {
    pub patient: Patient,
    pub appointments: Vec<AppointmentDetail>,
}

pub fn get_patient_detail(conn: &Connection, patient_id: &str) -> Result<PatientDetail, ApiError> {
    let patient = conn
        .query_row(
            "SELECT id, first_name, last_name, date_of_birth, gender, source,
                    address, phone, email, created_date
             FROM patient WHERE id = ?1",
            params![patient_id],
            patient_from_row,
        )
        .optional()?
        .ok_or_else(|| ApiError::not_found("patient"))?;

    let mut stmt = conn.prepare(
        "SELECT id, patient_id, status, created_date
         FROM appointment
         WHERE patient_id = ?1
         ORDER BY created_date DESC, id DESC",
    )?;
    let appointments: Vec<(String, String, AppointmentStatus, DateTime<Utc>)> = stmt
        .query_map(params![patient_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, ts_col(row, 3)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut services_stmt = conn.prepare(
        "SELECT s.id, s.name, s.description, s.price, s.duration, s.created_date
         FROM appointment_service aps
         JOIN service s ON s.id = aps.service_id
         WHERE aps.appointment_id = ?1
         ORDER BY aps.start ASC, s.id ASC",
    )?;
    let mut payment_stmt = conn.prepare(
        "SELECT id, patient_id, appointment_id, provider_id, service_id,
                amount, date, method, status, created_date
         FROM payment
         WHERE appointment_id = ?1
         ORDER BY date DESC, id DESC
         LIMIT 1",
    )?;

    let mut details = Vec::with_capacity(appointments.len());
    for (id, patient_id, status, created_date) in appointments {
        let services: Vec<Service> = services_stmt
            .query_map(params![id], |row| {
                Ok(Service {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    price: row.get(3)?,
                    duration: row.get(4)?,
                    created_date: ts_col(row, 5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let payment = payment_stmt
            .query_row(params![id], |row| {
                Ok(Payment {
                    id: row.get(0)?,
                    patient_id: row.get(1)?,
                    appointment_id: row.get(2)?,
                    provider_id: row.get(3)?,
                    service_id: row.get(4)?,
                    amount: row.get(5)?,
                    date: ts_col(row, 6)?,
                    method: row.get(7)?,
                    status: row.get(8)?,
                    created_date: ts_col(row, 9)?,
                })
            })
            .optional()?;

        details.push(AppointmentDetail {
            id,
            patient_id,
            status,
            created_date,
            services,
            payment,
        });
    }

    Ok(PatientDetail {
        patient,
        appointments: details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        insert_appointment, insert_appointment_service, insert_patient, insert_payment,
        insert_provider, insert_service, parse_ts, setup_schema,
    };
    use crate::models::{Appointment, AppointmentService, PaymentMethod, PaymentStatus, Provider};

    fn ts(text: &str) -> DateTime<Utc> {
        parse_ts(text).unwrap()
    }

    fn patient(id: &str, first: &str, created: &str) -> Patient {
        Patient {
            id: id.to_string(),
            first_name: first.to_string(),
            last_name: "Doe".to_string(),
            date_of_birth: Some(ts("1990-01-01T00:00:00Z")),
            gender: Gender::Female,
            source: Source::Website,
            address: "1 Elm St".to_string(),
            phone: format!("555-{id}"),
            email: format!("{first}@example.com").to_lowercase(),
            created_date: ts(created),
        }
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_schema(&conn).unwrap();
        conn
    }

    fn walk_all_pages(
        conn: &Connection,
        filter: &PatientFilter,
        sort: PatientSortField,
        order: SortOrder,
        limit: i64,
    ) -> (Vec<String>, i64) {
        let mut ids = Vec::new();
        let mut token: Option<String> = None;
        let mut total = 0;
        loop {
            let cur = token.as_deref().and_then(cursor::decode::<ListCursor>);
            let page = list_patients(conn, filter, sort, order, cur, limit).unwrap();
            total = page.total;
            ids.extend(page.data.iter().map(|p| p.id.clone()));
            if !page.has_more {
                assert!(page.next_cursor.is_none());
                break;
            }
            assert!(page.next_cursor.is_some());
            token = page.next_cursor;
        }
        (ids, total)
    }

    #[test]
    fn test_limit_two_against_three_rows() {
        let conn = setup();
        insert_patient(&conn, &patient("pat_1", "Ana", "2025-01-01T10:00:00Z")).unwrap();
        insert_patient(&conn, &patient("pat_2", "Bea", "2025-01-02T10:00:00Z")).unwrap();
        insert_patient(&conn, &patient("pat_3", "Cal", "2025-01-03T10:00:00Z")).unwrap();

        let filter = PatientFilter::default();
        let page = list_patients(
            &conn,
            &filter,
            PatientSortField::CreatedDate,
            SortOrder::Desc,
            None,
            2,
        )
        .unwrap();
        assert_eq!(page.data.len(), 2);
        assert!(page.has_more);
        assert!(page.next_cursor.is_some());
        assert_eq!(page.total, 3);
        assert_eq!(page.data[0].id, "pat_3");
        assert_eq!(page.data[1].id, "pat_2");

        let cur = cursor::decode::<ListCursor>(&page.next_cursor.unwrap()).unwrap();
        let next = list_patients(
            &conn,
            &filter,
            PatientSortField::CreatedDate,
            SortOrder::Desc,
            Some(cur),
            2,
        )
        .unwrap();
        assert_eq!(next.data.len(), 1);
        assert_eq!(next.data[0].id, "pat_1");
        assert!(!next.has_more);
        assert!(next.next_cursor.is_none());
        assert_eq!(next.total, 3);
    }

    #[test]
    fn test_pages_partition_full_result_set() {
        let conn = setup();
        // Duplicate created_date values on purpose: tie-break must keep the
        // partition exact.
        for i in 0..17 {
            let created = format!("2025-03-{:02}T09:00:00Z", (i % 5) + 1);
            insert_patient(&conn, &patient(&format!("pat_{i:02}"), "Pat", &created)).unwrap();
        }

        let filter = PatientFilter::default();
        for order in [SortOrder::Asc, SortOrder::Desc] {
            let (ids, total) =
                walk_all_pages(&conn, &filter, PatientSortField::CreatedDate, order, 4);
            assert_eq!(total, 17);
            assert_eq!(ids.len(), 17, "no omissions");
            let mut unique = ids.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), 17, "no duplicates");

            let full = list_patients(&conn, &filter, PatientSortField::CreatedDate, order, None, 100)
                .unwrap();
            let full_ids: Vec<String> = full.data.iter().map(|p| p.id.clone()).collect();
            assert_eq!(ids, full_ids, "page concatenation equals full list");
        }
    }

    #[test]
    fn test_tie_break_is_by_id() {
        let conn = setup();
        for id in ["pat_b", "pat_a", "pat_c"] {
            insert_patient(&conn, &patient(id, "Same", "2025-04-01T12:00:00Z")).unwrap();
        }
        let filter = PatientFilter::default();

        let desc = list_patients(
            &conn,
            &filter,
            PatientSortField::CreatedDate,
            SortOrder::Desc,
            None,
            10,
        )
        .unwrap();
        let ids: Vec<&str> = desc.data.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["pat_c", "pat_b", "pat_a"]);

        let asc = list_patients(
            &conn,
            &filter,
            PatientSortField::CreatedDate,
            SortOrder::Asc,
            None,
            10,
        )
        .unwrap();
        let ids: Vec<&str> = asc.data.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["pat_a", "pat_b", "pat_c"]);
    }

    #[test]
    fn test_search_and_enum_filters() {
        let conn = setup();
        let mut ana = patient("pat_1", "Ana", "2025-01-01T10:00:00Z");
        ana.gender = Gender::Female;
        ana.source = Source::Instagram;
        insert_patient(&conn, &ana).unwrap();
        let mut bob = patient("pat_2", "Bob", "2025-01-02T10:00:00Z");
        bob.gender = Gender::Male;
        bob.source = Source::Google;
        insert_patient(&conn, &bob).unwrap();

        // Case-insensitive substring over name/contact fields
        let filter = PatientFilter {
            search: Some("ANA".to_string()),
            ..Default::default()
        };
        let page = list_patients(
            &conn,
            &filter,
            PatientSortField::CreatedDate,
            SortOrder::Desc,
            None,
            20,
        )
        .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].id, "pat_1");

        // Search matches phone too
        let filter = PatientFilter {
            search: Some("555-pat_2".to_string()),
            ..Default::default()
        };
        let page = list_patients(
            &conn,
            &filter,
            PatientSortField::CreatedDate,
            SortOrder::Desc,
            None,
            20,
        )
        .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].id, "pat_2");

        let filter = PatientFilter {
            gender: Some(Gender::Male),
            source: Some(Source::Google),
            ..Default::default()
        };
        let page = list_patients(
            &conn,
            &filter,
            PatientSortField::CreatedDate,
            SortOrder::Desc,
            None,
            20,
        )
        .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].id, "pat_2");
    }

    #[test]
    fn test_empty_set_and_cursor_past_end() {
        let conn = setup();
        let filter = PatientFilter::default();

        let page = list_patients(
            &conn,
            &filter,
            PatientSortField::CreatedDate,
            SortOrder::Desc,
            None,
            20,
        )
        .unwrap();
        assert!(page.data.is_empty());
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
        assert_eq!(page.total, 0);

        insert_patient(&conn, &patient("pat_1", "Ana", "2025-01-01T10:00:00Z")).unwrap();
        // Cursor pointing before everything in descending order
        let past_end = ListCursor {
            sort_value: "2000-01-01T00:00:00Z".to_string(),
            id: "".to_string(),
        };
        let page = list_patients(
            &conn,
            &filter,
            PatientSortField::CreatedDate,
            SortOrder::Desc,
            Some(past_end),
            20,
        )
        .unwrap();
        assert!(page.data.is_empty());
        assert!(!page.has_more);
        assert_eq!(page.total, 1);
    }

    #[test]
    fn test_sort_field_parsing() {
        assert_eq!(
            PatientSortField::parse(None).unwrap(),
            PatientSortField::CreatedDate
        );
        assert_eq!(
            PatientSortField::parse(Some("first_name")).unwrap(),
            PatientSortField::FirstName
        );
        assert!(PatientSortField::parse(Some("password")).is_err());
        assert!(PatientSortField::parse(Some("created_date; DROP TABLE")).is_err());
    }

    #[test]
    fn test_sort_by_name_ascending() {
        let conn = setup();
        insert_patient(&conn, &patient("pat_1", "Zoe", "2025-01-01T10:00:00Z")).unwrap();
        insert_patient(&conn, &patient("pat_2", "Ana", "2025-01-02T10:00:00Z")).unwrap();

        let page = list_patients(
            &conn,
            &PatientFilter::default(),
            PatientSortField::FirstName,
            SortOrder::Asc,
            None,
            20,
        )
        .unwrap();
        let names: Vec<&str> = page.data.iter().map(|p| p.first_name.as_str()).collect();
        assert_eq!(names, ["Ana", "Zoe"]);
    }

    #[test]
    fn test_detail_not_found() {
        let conn = setup();
        let err = get_patient_detail(&conn, "missing").unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
    }

    #[test]
    fn test_detail_with_services_and_latest_payment() {
        let conn = setup();
        insert_patient(&conn, &patient("pat_1", "Ana", "2025-01-01T10:00:00Z")).unwrap();
        insert_provider(
            &conn,
            &Provider {
                id: "prov_1".to_string(),
                first_name: "Sam".to_string(),
                last_name: "Lee".to_string(),
                email: "sam@clinic.test".to_string(),
                phone: "555-0200".to_string(),
                created_date: ts("2025-01-01T08:00:00Z"),
            },
        )
        .unwrap();
        for (id, price) in [("svc_1", 15000), ("svc_2", 30000)] {
            insert_service(
                &conn,
                &Service {
                    id: id.to_string(),
                    name: id.to_string(),
                    description: String::new(),
                    price,
                    duration: 30,
                    created_date: ts("2025-01-01T08:00:00Z"),
                },
            )
            .unwrap();
        }
        insert_appointment(
            &conn,
            &Appointment {
                id: "appt_1".to_string(),
                patient_id: "pat_1".to_string(),
                status: AppointmentStatus::Confirmed,
                created_date: ts("2025-02-01T10:00:00Z"),
            },
        )
        .unwrap();
        for (svc, start) in [
            ("svc_1", "2025-02-03T10:00:00Z"),
            ("svc_2", "2025-02-03T11:00:00Z"),
        ] {
            insert_appointment_service(
                &conn,
                &AppointmentService {
                    appointment_id: "appt_1".to_string(),
                    service_id: svc.to_string(),
                    provider_id: "prov_1".to_string(),
                    start: ts(start),
                    end: ts("2025-02-03T12:00:00Z"),
                },
            )
            .unwrap();
        }
        // Two payment rows; detail must surface the most recent by date.
        for (id, date, amount) in [
            ("pay_old", "2025-02-03T12:00:00Z", 100),
            ("pay_new", "2025-02-05T12:00:00Z", 45000),
        ] {
            insert_payment(
                &conn,
                &Payment {
                    id: id.to_string(),
                    patient_id: "pat_1".to_string(),
                    appointment_id: "appt_1".to_string(),
                    provider_id: "prov_1".to_string(),
                    service_id: "svc_1".to_string(),
                    amount,
                    date: ts(date),
                    method: PaymentMethod::Cash,
                    status: PaymentStatus::Paid,
                    created_date: ts(date),
                },
            )
            .unwrap();
        }

        let detail = get_patient_detail(&conn, "pat_1").unwrap();
        assert_eq!(detail.patient.id, "pat_1");
        assert_eq!(detail.appointments.len(), 1);
        let appt = &detail.appointments[0];
        assert_eq!(appt.services.len(), 2);
        assert_eq!(appt.services[0].id, "svc_1"); // ordered by slot start
        let payment = appt.payment.as_ref().unwrap();
        assert_eq!(payment.id, "pay_new");
        assert_eq!(payment.amount, 45000);
    }
}
