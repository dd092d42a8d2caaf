// Clinic API - Keyset Pager
// Forward-only cursor pagination over a filtered, sorted collection.
// Rows are totally ordered by (sort_value, id); the cursor marks the last
// row seen and the predicate resumes strictly after it.

use serde::Serialize;

use crate::error::ApiError;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Paginated response envelope shared by every listing endpoint.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<String>,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
    /// Count of rows matching the filters before pagination, independent of
    /// cursor and limit.
    pub total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Parse a `sortOrder` query value; absent defaults to descending.
    pub fn parse(value: Option<&str>) -> Result<Self, ApiError> {
        match value {
            None => Ok(SortOrder::Desc),
            Some("asc") => Ok(SortOrder::Asc),
            Some("desc") => Ok(SortOrder::Desc),
            Some(other) => Err(ApiError::invalid(
                "sortOrder",
                format!("expected `asc` or `desc`, got `{other}`"),
            )),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// Comparison operator selecting rows strictly after the cursor.
    pub fn after_op(&self) -> &'static str {
        match self {
            SortOrder::Asc => ">",
            SortOrder::Desc => "<",
        }
    }
}

/// Validate a requested page size into 1..=MAX_LIMIT; absent defaults to 20.
/// Out-of-range values are rejected before any query runs.
pub fn validate_limit(limit: Option<i64>) -> Result<i64, ApiError> {
    match limit {
        None => Ok(DEFAULT_LIMIT),
        Some(n) if (1..=MAX_LIMIT).contains(&n) => Ok(n),
        Some(n) => Err(ApiError::invalid(
            "limit",
            format!("must be between 1 and {MAX_LIMIT}, got {n}"),
        )),
    }
}

/// SQL fragment restricting rows to those strictly after the cursor in the
/// requested direction, with the id as deterministic tie-breaker:
/// descending keeps `sort < ? OR (sort = ? AND id < ?)`, ascending mirrors
/// with `>`. Binds three parameters: sort_value, sort_value, id.
pub fn keyset_predicate(sort_expr: &str, id_col: &str, order: SortOrder) -> String {
    let op = order.after_op();
    format!("({sort_expr} {op} ? OR ({sort_expr} = ? AND {id_col} {op} ?))")
}

/// Truncate an L+1 fetch down to L rows; returns whether more rows remain.
pub fn truncate_page<T>(rows: &mut Vec<T>, limit: usize) -> bool {
    if rows.len() > limit {
        rows.truncate(limit);
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_limit_bounds() {
        assert_eq!(validate_limit(None).unwrap(), 20);
        assert_eq!(validate_limit(Some(1)).unwrap(), 1);
        assert_eq!(validate_limit(Some(100)).unwrap(), 100);
        assert!(validate_limit(Some(0)).is_err());
        assert!(validate_limit(Some(101)).is_err());
        assert!(validate_limit(Some(-5)).is_err());
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!(SortOrder::parse(None).unwrap(), SortOrder::Desc);
        assert_eq!(SortOrder::parse(Some("asc")).unwrap(), SortOrder::Asc);
        assert_eq!(SortOrder::parse(Some("desc")).unwrap(), SortOrder::Desc);
        assert!(SortOrder::parse(Some("DESC")).is_err());
        assert!(SortOrder::parse(Some("random")).is_err());
    }

    #[test]
    fn test_keyset_predicate_direction() {
        assert_eq!(
            keyset_predicate("created_date", "id", SortOrder::Desc),
            "(created_date < ? OR (created_date = ? AND id < ?))"
        );
        assert_eq!(
            keyset_predicate("created_date", "id", SortOrder::Asc),
            "(created_date > ? OR (created_date = ? AND id > ?))"
        );
    }

    #[test]
    fn test_truncate_page() {
        let mut rows = vec![1, 2, 3];
        assert!(truncate_page(&mut rows, 2));
        assert_eq!(rows, vec![1, 2]);

        let mut rows = vec![1, 2];
        assert!(!truncate_page(&mut rows, 2));
        assert_eq!(rows, vec![1, 2]);

        let mut rows: Vec<i32> = vec![];
        assert!(!truncate_page(&mut rows, 5));
        assert!(rows.is_empty());
    }
}
