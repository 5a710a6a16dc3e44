//! Table query filters.
//!
//! Filters are built as a small typed tree so that every backend can evaluate
//! them in process, while `Display` renders the OData text form used by table
//! services (`PartitionKey eq 'hack' and ...`).

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::table::TableRow;

pub const PARTITION_KEY: &str = "PartitionKey";
pub const ROW_KEY: &str = "RowKey";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    NotEqual,
}

impl ComparisonOperator {
    pub fn as_operator(&self) -> &'static str {
        match self {
            Self::Equal => "eq",
            Self::GreaterThan => "gt",
            Self::GreaterThanOrEqual => "ge",
            Self::LessThan => "lt",
            Self::LessThanOrEqual => "le",
            Self::NotEqual => "ne",
        }
    }

    fn accepts(&self, ordering: Option<Ordering>) -> bool {
        let Some(o) = ordering else { return false };
        match self {
            Self::Equal => o == Ordering::Equal,
            Self::NotEqual => o != Ordering::Equal,
            Self::GreaterThan => o == Ordering::Greater,
            Self::GreaterThanOrEqual => o != Ordering::Less,
            Self::LessThan => o == Ordering::Less,
            Self::LessThanOrEqual => o != Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    String(String),
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Date(DateTime<Utc>),
    Guid(Uuid),
    Binary(Vec<u8>),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Long(l) => write!(f, "{l}L"),
            Self::Double(d) => {
                if d.fract() == 0.0 && *d >= i32::MIN as f64 && *d <= i32::MAX as f64 {
                    write!(f, "{d}.0")
                } else {
                    write!(f, "{d}")
                }
            }
            Self::Date(dt) => write!(f, "datetime'{}'", dt.format("%Y-%m-%dT%H:%M:%S%.7fZ")),
            Self::Guid(g) => write!(f, "guid'{g}'"),
            Self::Binary(bytes) => write!(f, "X'{}'", hex::encode(bytes)),
        }
    }
}

impl FilterValue {
    fn compare_to(&self, actual: &Value) -> Option<Ordering> {
        match (self, actual) {
            (Self::String(expected), Value::String(s)) => Some(s.as_str().cmp(expected.as_str())),
            (Self::Bool(expected), Value::Bool(b)) => Some(b.cmp(expected)),
            (Self::Int(expected), Value::Number(n)) => n.as_i64().map(|v| v.cmp(&(*expected as i64))),
            (Self::Long(expected), Value::Number(n)) => n.as_i64().map(|v| v.cmp(expected)),
            (Self::Double(expected), Value::Number(n)) => n.as_f64().and_then(|v| v.partial_cmp(expected)),
            (Self::Date(expected), Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|v| v.with_timezone(&Utc).cmp(expected)),
            (Self::Guid(expected), Value::String(s)) => Uuid::parse_str(s).ok().map(|v| v.cmp(expected)),
            (Self::Binary(expected), Value::String(s)) => Some(s.to_ascii_lowercase().cmp(&hex::encode(expected))),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare { property: String, op: ComparisonOperator, value: FilterValue },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare { property, op, value } => write!(f, "{} {} {}", property, op.as_operator(), value),
            Self::And(filters) => write_combined(f, "and", filters),
            Self::Or(filters) => write_combined(f, "or", filters),
        }
    }
}

fn write_combined(f: &mut fmt::Formatter<'_>, op: &str, filters: &[Filter]) -> fmt::Result {
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            write!(f, " {op} ")?;
        }
        write!(f, "({filter})")?;
    }
    Ok(())
}

impl Filter {
    /// Evaluate the filter against a stored row. Missing properties never match.
    pub fn matches(&self, row: &TableRow) -> bool {
        match self {
            Self::Compare { property, op, value } => match row.property(property) {
                Some(actual) => op.accepts(value.compare_to(&actual)),
                None => false,
            },
            Self::And(filters) => filters.iter().all(|f| f.matches(row)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(row)),
        }
    }

    /// The partition key this filter pins, if any.
    pub fn partition_key(&self) -> Option<&str> {
        match self {
            Self::Compare { property, op: ComparisonOperator::Equal, value: FilterValue::String(pk) }
                if property == PARTITION_KEY => Some(pk.as_str()),
            Self::And(filters) => filters.iter().find_map(|f| f.partition_key()),
            _ => None,
        }
    }
}

fn compare(property: &str, op: ComparisonOperator, value: FilterValue) -> Filter {
    Filter::Compare { property: property.to_string(), op, value }
}

pub fn filter_for_string(property: &str, op: ComparisonOperator, value: &str) -> Filter {
    compare(property, op, FilterValue::String(value.to_string()))
}

pub fn filter_for_bool(property: &str, op: ComparisonOperator, value: bool) -> Filter {
    compare(property, op, FilterValue::Bool(value))
}

pub fn filter_for_int(property: &str, op: ComparisonOperator, value: i32) -> Filter {
    compare(property, op, FilterValue::Int(value))
}

pub fn filter_for_long(property: &str, op: ComparisonOperator, value: i64) -> Filter {
    compare(property, op, FilterValue::Long(value))
}

pub fn filter_for_double(property: &str, op: ComparisonOperator, value: f64) -> Filter {
    compare(property, op, FilterValue::Double(value))
}

pub fn filter_for_date(property: &str, op: ComparisonOperator, value: DateTime<Utc>) -> Filter {
    compare(property, op, FilterValue::Date(value))
}

pub fn filter_for_guid(property: &str, op: ComparisonOperator, value: Uuid) -> Filter {
    compare(property, op, FilterValue::Guid(value))
}

pub fn filter_for_binary(property: &str, op: ComparisonOperator, value: &[u8]) -> Filter {
    compare(property, op, FilterValue::Binary(value.to_vec()))
}

pub fn partition_key_filter(partition_key: &str) -> Filter {
    filter_for_string(PARTITION_KEY, ComparisonOperator::Equal, partition_key)
}

/// Rows of `partition_key` whose row key starts with `prefix`.
pub fn row_key_starts_with_filter(partition_key: &str, prefix: &str) -> Filter {
    let mut upper: Vec<char> = prefix.chars().collect();
    if let Some(last) = upper.pop() {
        let next = char::from_u32(last as u32 + 1).unwrap_or(char::MAX);
        upper.push(next);
    }
    let upper: String = upper.into_iter().collect();
    Filter::And(vec![
        partition_key_filter(partition_key),
        filter_for_string(ROW_KEY, ComparisonOperator::GreaterThanOrEqual, prefix),
        filter_for_string(ROW_KEY, ComparisonOperator::LessThan, &upper),
    ])
}

pub fn and(filters: impl IntoIterator<Item = Filter>) -> Option<Filter> {
    combine(filters.into_iter().collect(), Filter::And)
}

pub fn or(filters: impl IntoIterator<Item = Filter>) -> Option<Filter> {
    combine(filters.into_iter().collect(), Filter::Or)
}

fn combine(mut filters: Vec<Filter>, make: fn(Vec<Filter>) -> Filter) -> Option<Filter> {
    match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(make(filters)),
    }
}

/// RFC 3339 text used when datetimes are stored as properties.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn string_filter_escapes_quotes() {
        let f = filter_for_string("Name", ComparisonOperator::Equal, "o'neil");
        assert_eq!(f.to_string(), "Name eq 'o''neil'");
    }

    #[test]
    fn scalar_filters_render() {
        assert_eq!(filter_for_bool("ReadOnly", ComparisonOperator::Equal, true).to_string(), "ReadOnly eq true");
        assert_eq!(filter_for_int("Status", ComparisonOperator::NotEqual, 2).to_string(), "Status ne 2");
        assert_eq!(filter_for_long("Size", ComparisonOperator::GreaterThan, 5).to_string(), "Size gt 5L");
        assert_eq!(filter_for_double("Score", ComparisonOperator::LessThan, 3.0).to_string(), "Score lt 3.0");
        assert_eq!(filter_for_double("Score", ComparisonOperator::LessThan, 3.25).to_string(), "Score lt 3.25");
        assert_eq!(filter_for_binary("Data", ComparisonOperator::Equal, &[0x0a, 0xff]).to_string(), "Data eq X'0aff'");
    }

    #[test]
    fn date_and_guid_filters_render() {
        let dt = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(
            filter_for_date("CreatedAt", ComparisonOperator::GreaterThanOrEqual, dt).to_string(),
            "CreatedAt ge datetime'2021-03-04T05:06:07.0000000Z'"
        );
        let g = Uuid::nil();
        assert_eq!(
            filter_for_guid("Id", ComparisonOperator::Equal, g).to_string(),
            "Id eq guid'00000000-0000-0000-0000-000000000000'"
        );
    }

    #[test]
    fn combine_filters() {
        assert!(and(Vec::new()).is_none());
        let single = and([partition_key_filter("pk")]).unwrap();
        assert_eq!(single.to_string(), "PartitionKey eq 'pk'");
        let both = or([partition_key_filter("a"), partition_key_filter("b")]).unwrap();
        assert_eq!(both.to_string(), "(PartitionKey eq 'a') or (PartitionKey eq 'b')");
    }

    #[test]
    fn row_key_prefix_filter() {
        let f = row_key_starts_with_filter("pk", "abc");
        assert_eq!(
            f.to_string(),
            "(PartitionKey eq 'pk') and (RowKey ge 'abc') and (RowKey lt 'abd')"
        );
        assert_eq!(f.partition_key(), Some("pk"));
    }

    #[test]
    fn matches_rows() {
        let row = TableRow::new("hack", "team1", json!({"Status": "approved", "MembersCount": 3, "AutoApprove": false}));
        let f = and([
            partition_key_filter("hack"),
            filter_for_string("Status", ComparisonOperator::Equal, "approved"),
            filter_for_int("MembersCount", ComparisonOperator::GreaterThanOrEqual, 2),
            filter_for_bool("AutoApprove", ComparisonOperator::Equal, false),
        ])
        .unwrap();
        assert!(f.matches(&row));
        assert!(!filter_for_string("Missing", ComparisonOperator::NotEqual, "x").matches(&row));
        assert!(!partition_key_filter("other").matches(&row));
    }
}
