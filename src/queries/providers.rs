// Clinic API - Provider Queries
// Provider listing with derived appointment counts and paid revenue.
// Ordered by appointment count descending with id ascending as tie-break;
// the cursor carries the last-seen (appointment_count, id) pair.

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};

use crate::cursor;
use crate::error::ApiError;
use crate::pagination::{truncate_page, Page};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCursor {
    pub appointment_count: i64,
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(rename = "appointmentCount")]
    pub appointment_count: i64,
    pub revenue: i64,
}

const PROVIDER_SEARCH: &str = "(p.first_name LIKE ? OR p.last_name LIKE ? OR p.email LIKE ?)";

/// List providers with derived stats and keyset pagination.
///
/// appointmentCount counts DISTINCT appointments the provider appears in via
/// the join table; revenue sums only `paid` payments. Providers with no
/// activity appear with zeros via the outer joins.
pub fn list_providers(
    conn: &Connection,
    search: Option<&str>,
    cursor: Option<ProviderCursor>,
    limit: i64,
) -> Result<Page<ProviderRow>, ApiError> {
    let mut search_values: Vec<Value> = Vec::new();
    if let Some(search) = search {
        let pattern = format!("%{search}%");
        for _ in 0..3 {
            search_values.push(Value::Text(pattern.clone()));
        }
    }

    // Full-filter count, independent of pagination
    let mut count_sql = "SELECT COUNT(*) FROM provider p".to_string();
    if search.is_some() {
        count_sql.push_str(" WHERE ");
        count_sql.push_str(PROVIDER_SEARCH);
    }
    let total: i64 = conn.query_row(
        &count_sql,
        params_from_iter(search_values.iter().cloned()),
        |row| row.get(0),
    )?;

    let mut conds: Vec<String> = Vec::new();
    let mut values = search_values;
    if search.is_some() {
        conds.push(PROVIDER_SEARCH.to_string());
    }
    if let Some(cursor) = &cursor {
        // Count descending, id ascending: strictly-after means a smaller
        // count, or the same count with a larger id.
        conds.push(
            "(COALESCE(ac.n, 0) < ? OR (COALESCE(ac.n, 0) = ? AND p.id > ?))".to_string(),
        );
        values.push(Value::Integer(cursor.appointment_count));
        values.push(Value::Integer(cursor.appointment_count));
        values.push(Value::Text(cursor.id.clone()));
    }

    let mut sql = "SELECT p.id, p.first_name || ' ' || p.last_name AS name, p.email, p.phone,
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
         ) rv ON rv.provider_id = p.id"
        .to_string();
    if !conds.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conds.join(" AND "));
    }
    sql.push_str(" ORDER BY COALESCE(ac.n, 0) DESC, p.id ASC LIMIT ?");
    values.push(Value::Integer(limit + 1));

    let mut stmt = conn.prepare(&sql)?;
    let mut rows: Vec<ProviderRow> = stmt
        .query_map(params_from_iter(values), |row| {
            Ok(ProviderRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                phone: row.get(3)?,
                appointment_count: row.get(4)?,
                revenue: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let has_more = truncate_page(&mut rows, limit as usize);
    let next_cursor = if has_more {
        rows.last().map(|last| {
            cursor::encode(&ProviderCursor {
                appointment_count: last.appointment_count,
                id: last.id.clone(),
            })
        })
    } else {
        None
    };

    Ok(Page {
        data: rows,
        next_cursor,
        has_more,
        total,
    })
}
