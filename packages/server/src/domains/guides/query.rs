//! Dynamic filtering, pagination, and field search over cached guide records.
//!
//! Guides are schema-less (`serde_json::Map`), so every filter works on field
//! names discovered at query time. Two filter families exist:
//!
//! - `desde`/`hasta`: a date range matched against the first date-like field
//!   found among [`DATE_FIELD_ALIASES`]. Records without a parseable date pass
//!   the range check vacuously.
//! - any other key: case-insensitive substring containment against the
//!   record's value for that key. A record missing the key is excluded.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::common::{value_text, GuideRecord};

/// Query-string keys that drive pagination or tenant selection and are never
/// interpreted as field filters.
pub const RESERVED_KEYS: &[&str] = &["desde", "hasta", "page", "limit", "storeName"];

/// Field names probed, in order, for a record's date when applying
/// `desde`/`hasta`. The export's column casing varies by store.
pub const DATE_FIELD_ALIASES: &[&str] = &["fecha", "Fecha", "date", "Date"];

const DEFAULT_PAGE_LIMIT: usize = 100;

/// Slice descriptor returned alongside every page of results.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    #[serde(rename = "totalPages")]
    pub total_pages: usize,
}

/// Parse a filter or record date. Accepts `YYYY-MM-DD HH:MM:SS`,
/// `YYYY-MM-DDTHH:MM:SS`, or a bare `YYYY-MM-DD` (midnight).
pub fn parse_query_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or(NaiveDateTime::MIN))
}

fn record_date(record: &GuideRecord) -> Option<NaiveDateTime> {
    DATE_FIELD_ALIASES
        .iter()
        .find_map(|alias| record.get(*alias))
        .and_then(value_text)
        .as_deref()
        .and_then(parse_query_date)
}

/// Case-insensitive substring containment against one field of a record.
/// Missing or non-scalar values never match.
pub fn field_matches(record: &GuideRecord, field: &str, needle: &str) -> bool {
    match record.get(field).and_then(value_text) {
        Some(text) => text.to_lowercase().contains(&needle.to_lowercase()),
        None => false,
    }
}

fn passes_date_range(
    record: &GuideRecord,
    desde: Option<NaiveDateTime>,
    hasta: Option<NaiveDateTime>,
) -> bool {
    if desde.is_none() && hasta.is_none() {
        return true;
    }
    // No parseable date on the record: the range check cannot apply.
    let Some(date) = record_date(record) else {
        return true;
    };
    if let Some(desde) = desde {
        if date < desde {
            return false;
        }
    }
    if let Some(hasta) = hasta {
        if date > hasta {
            return false;
        }
    }
    true
}

/// Apply the full query-string filter set to a record list.
///
/// Malformed `desde`/`hasta` values are ignored rather than rejected; every
/// other filter narrows the result set.
pub fn apply_filters(records: Vec<GuideRecord>, filters: &HashMap<String, String>) -> Vec<GuideRecord> {
    let desde = filters.get("desde").and_then(|v| parse_query_date(v));
    let hasta = filters.get("hasta").and_then(|v| parse_query_date(v));

    let field_filters: Vec<(&str, &str)> = filters
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();

    records
        .into_iter()
        .filter(|record| passes_date_range(record, desde, hasta))
        .filter(|record| {
            field_filters
                .iter()
                .all(|(field, needle)| field_matches(record, field, needle))
        })
        .collect()
}

/// Slice a filtered record list into a 1-indexed page.
pub fn paginate(records: Vec<GuideRecord>, page: usize, limit: usize) -> (Vec<GuideRecord>, Pagination) {
    let page = page.max(1);
    let limit = limit.max(1);
    let total = records.len();
    let total_pages = total.div_ceil(limit);
    let offset = (page - 1) * limit;

    let data: Vec<GuideRecord> = records.into_iter().skip(offset).take(limit).collect();

    (
        data,
        Pagination {
            page,
            limit,
            total,
            total_pages,
        },
    )
}

/// Parse `page`/`limit` query values, falling back to page 1 / limit 100 on
/// absent or malformed input.
pub fn page_params(filters: &HashMap<String, String>) -> (usize, usize) {
    let page = filters
        .get("page")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(1)
        .max(1);
    let limit = filters
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .max(1);
    (page, limit)
}

/// All records whose `field` matches `value` by the substring rule.
/// An empty result is the caller's not-found signal.
pub fn find_by_field(records: Vec<GuideRecord>, field: &str, value: &str) -> Vec<GuideRecord> {
    records
        .into_iter()
        .filter(|record| field_matches(record, field, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};

    fn record(fields: &[(&str, Value)]) -> GuideRecord {
        let mut map = Map::new();
        for (key, value) in fields {
            map.insert((*key).to_string(), value.clone());
        }
        map
    }

    fn filters(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_substring_filter_case_insensitive() {
        let records = vec![
            record(&[("id", json!(1)), ("city", json!("Bogota"))]),
            record(&[("id", json!(2)), ("city", json!("Medellin"))]),
        ];

        let result = apply_filters(records, &filters(&[("city", "bog")]));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["id"], json!(1));
    }

    #[test]
    fn test_missing_field_excludes_record() {
        let records = vec![
            record(&[("id", json!(1)), ("city", json!("Bogota"))]),
            record(&[("id", json!(2))]),
            record(&[("id", json!(3)), ("city", json!(Value::Null))]),
        ];

        let result = apply_filters(records, &filters(&[("city", "o")]));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["id"], json!(1));
    }

    #[test]
    fn test_reserved_keys_are_not_field_filters() {
        let records = vec![record(&[("id", json!(1))])];

        // No record has a "storeName" or "page" field, but these keys must
        // not exclude anything.
        let result = apply_filters(
            records,
            &filters(&[("storeName", "acme"), ("page", "2"), ("limit", "10")]),
        );
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_numeric_values_match_as_text() {
        let records = vec![
            record(&[("guia", json!(100234))]),
            record(&[("guia", json!(555))]),
        ];

        let result = apply_filters(records, &filters(&[("guia", "1002")]));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["guia"], json!(100234));
    }

    #[test]
    fn test_date_range_filters() {
        let records = vec![
            record(&[("id", json!(1)), ("fecha", json!("2025-01-10 08:00:00"))]),
            record(&[("id", json!(2)), ("fecha", json!("2025-02-15 08:00:00"))]),
            record(&[("id", json!(3)), ("Fecha", json!("2025-03-20"))]),
        ];

        let result = apply_filters(
            records,
            &filters(&[("desde", "2025-02-01"), ("hasta", "2025-02-28")]),
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["id"], json!(2));
    }

    #[test]
    fn test_date_filter_vacuous_without_date_field() {
        let records = vec![
            record(&[("id", json!(1))]),
            record(&[("id", json!(2)), ("fecha", json!("not a date"))]),
            record(&[("id", json!(3)), ("fecha", json!("2020-01-01"))]),
        ];

        // Records 1 and 2 have no parseable date and pass; record 3 is
        // outside the range and is excluded.
        let result = apply_filters(records, &filters(&[("desde", "2025-01-01")]));
        assert_eq!(result.len(), 2);
        assert_eq!(result[0]["id"], json!(1));
        assert_eq!(result[1]["id"], json!(2));
    }

    #[test]
    fn test_malformed_date_bound_is_ignored() {
        let records = vec![record(&[("id", json!(1)), ("fecha", json!("2025-01-10"))])];

        let result = apply_filters(records, &filters(&[("desde", "soon")]));
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_paginate_middle_page() {
        let records: Vec<GuideRecord> = (1..=250)
            .map(|i| record(&[("id", json!(i))]))
            .collect();

        let (data, pagination) = paginate(records, 3, 100);
        assert_eq!(data.len(), 50);
        assert_eq!(data[0]["id"], json!(201));
        assert_eq!(data[49]["id"], json!(250));
        assert_eq!(
            pagination,
            Pagination {
                page: 3,
                limit: 100,
                total: 250,
                total_pages: 3,
            }
        );
    }

    #[test]
    fn test_paginate_past_end_is_empty() {
        let records: Vec<GuideRecord> = (1..=10).map(|i| record(&[("id", json!(i))])).collect();

        let (data, pagination) = paginate(records, 5, 10);
        assert!(data.is_empty());
        assert_eq!(pagination.total, 10);
        assert_eq!(pagination.total_pages, 1);
    }

    #[test]
    fn test_paginate_clamps_degenerate_input() {
        let records: Vec<GuideRecord> = (1..=3).map(|i| record(&[("id", json!(i))])).collect();

        let (data, pagination) = paginate(records, 0, 0);
        assert_eq!(data.len(), 1);
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.limit, 1);
        assert_eq!(pagination.total_pages, 3);
    }

    #[test]
    fn test_page_params_defaults() {
        assert_eq!(page_params(&filters(&[])), (1, 100));
        assert_eq!(page_params(&filters(&[("page", "3"), ("limit", "100")])), (3, 100));
        assert_eq!(page_params(&filters(&[("page", "abc"), ("limit", "-2")])), (1, 100));
    }

    #[test]
    fn test_find_by_field() {
        let records = vec![
            record(&[("estado", json!("Entregado"))]),
            record(&[("estado", json!("En ruta"))]),
            record(&[("otro", json!("x"))]),
        ];

        let hits = find_by_field(records.clone(), "estado", "entreg");
        assert_eq!(hits.len(), 1);

        let none = find_by_field(records, "estado", "anulado");
        assert!(none.is_empty());
    }
}
