//! Records and their key/value field storage
//!
//! A record row only carries system columns. Field values live in a separate
//! key/value set, one entry per (field name, place).

mod filter;

pub use filter::{DeletedState, RecordCheck, RecordFilter, RecordValueFilter, SortExpr, SortExprSet};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Formats a timestamp the way it is stored: fixed-width RFC 3339 in UTC.
///
/// Fixed width keeps text order equal to time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a stored timestamp.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Single field value of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordValue {
    /// Owning record
    #[serde(default)]
    pub record_id: u64,

    /// Field name
    pub name: String,

    /// Raw value as text
    #[serde(default)]
    pub value: String,

    /// Referenced id for record/user/file fields
    #[serde(default, rename = "ref")]
    pub ref_id: u64,

    /// Position within a multi-valued field
    #[serde(default)]
    pub place: u32,

    /// Soft-delete marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl RecordValue {
    /// Create a plain value at place 0
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            record_id: 0,
            name: name.into(),
            value: value.into(),
            ref_id: 0,
            place: 0,
            deleted_at: None,
        }
    }

    /// Create a reference value; text and ref column carry the same id
    pub fn reference(name: impl Into<String>, id: u64) -> Self {
        let mut rv = Self::new(name, id.to_string());
        rv.ref_id = id;
        rv
    }

    /// Sets the place
    pub fn at(mut self, place: u32) -> Self {
        self.place = place;
        self
    }

    /// Returns true if the value is not soft-deleted
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Ordered collection of record values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordValueSet(pub Vec<RecordValue>);

impl RecordValueSet {
    /// Create from values
    pub fn new(values: Vec<RecordValue>) -> Self {
        Self(values)
    }

    /// Active value of a field at a place
    pub fn get(&self, name: &str, place: u32) -> Option<&RecordValue> {
        self.0
            .iter()
            .find(|v| v.is_active() && v.name == name && v.place == place)
    }

    /// All values (active or not) of a field, in place order
    pub fn field_values(&self, name: &str) -> Vec<&RecordValue> {
        let mut out: Vec<&RecordValue> = self.0.iter().filter(|v| v.name == name).collect();
        out.sort_by_key(|v| v.place);
        out
    }

    /// Iterate values
    pub fn iter(&self) -> std::slice::Iter<'_, RecordValue> {
        self.0.iter()
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if any value is active
    pub fn has_active(&self) -> bool {
        self.0.iter().any(RecordValue::is_active)
    }
}

impl From<Vec<RecordValue>> for RecordValueSet {
    fn from(values: Vec<RecordValue>) -> Self {
        Self(values)
    }
}

impl<'a> IntoIterator for &'a RecordValueSet {
    type Item = &'a RecordValue;
    type IntoIter = std::slice::Iter<'a, RecordValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Instance of a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Record id; 0 lets the store assign one on create
    #[serde(default)]
    pub id: u64,

    /// Module the record belongs to
    pub module_id: u64,

    /// Namespace of the module
    pub namespace_id: u64,

    /// Field values
    #[serde(default)]
    pub values: RecordValueSet,

    #[serde(default)]
    pub owned_by: u64,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub created_by: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_by: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub deleted_by: u64,
}

impl Record {
    /// Create a new record for a module, stamped with the current time
    pub fn new(module_id: u64, namespace_id: u64) -> Self {
        Self {
            id: 0,
            module_id,
            namespace_id,
            values: RecordValueSet::default(),
            owned_by: 0,
            created_at: Utc::now(),
            created_by: 0,
            updated_at: None,
            updated_by: 0,
            deleted_at: None,
            deleted_by: 0,
        }
    }

    /// Sets the id
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    /// Adds a value
    pub fn with_value(mut self, value: RecordValue) -> Self {
        self.values.0.push(value);
        self
    }

    /// Sets the creation time
    pub fn created(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// Returns true if the record is soft-deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Ids of a set of records, in order
pub fn record_ids(set: &[Record]) -> Vec<u64> {
    set.iter().map(|r| r.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        let a = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let b = a + chrono::Duration::microseconds(1_500);

        let fa = format_timestamp(&a);
        let fb = format_timestamp(&b);

        assert_eq!(fa, "2024-01-02T03:04:05.000000Z");
        assert_eq!(fa.len(), fb.len());
        assert!(fa < fb);
        assert_eq!(parse_timestamp(&fb), Some(b));
    }

    #[test]
    fn test_value_set_get_skips_deleted() {
        let mut deleted = RecordValue::new("status", "old");
        deleted.deleted_at = Some(Utc::now());

        let set = RecordValueSet::new(vec![
            deleted,
            RecordValue::new("status", "new").at(1),
        ]);

        assert!(set.get("status", 0).is_none());
        assert_eq!(set.get("status", 1).map(|v| v.value.as_str()), Some("new"));
        assert_eq!(set.field_values("status").len(), 2);
    }

    #[test]
    fn test_reference_value() {
        let rv = RecordValue::reference("owner", 42);
        assert_eq!(rv.value, "42");
        assert_eq!(rv.ref_id, 42);
    }
}
