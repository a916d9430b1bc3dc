//! Module and field definitions
//!
//! A module is a named dynamic schema; its fields are the only source of
//! truth for which identifiers a filter or sort may reference.

use serde::{Deserialize, Serialize};

/// Logical field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Free text
    String,
    /// Email address (text)
    Email,
    /// URL (text)
    Url,
    /// Option from a fixed list (text)
    Select,
    /// Decimal number stored as text
    Number,
    /// Boolean stored as "1"/"0"
    Bool,
    /// Date and/or time stored as text
    DateTime,
    /// Reference to another record
    Record,
    /// Reference to a user
    User,
    /// Attachment reference
    File,
}

impl FieldKind {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Email => "email",
            FieldKind::Url => "url",
            FieldKind::Select => "select",
            FieldKind::Number => "number",
            FieldKind::Bool => "bool",
            FieldKind::DateTime => "datetime",
            FieldKind::Record => "record",
            FieldKind::User => "user",
            FieldKind::File => "file",
        }
    }

    /// Returns true for kinds whose value lives in the `ref` column
    pub fn is_reference(&self) -> bool {
        matches!(self, FieldKind::Record | FieldKind::User | FieldKind::File)
    }
}

/// Type-specific field configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOptions {
    /// Decimal places for number fields; 0 means integer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,

    /// Date-only datetime field
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub only_date: bool,

    /// Time-only datetime field
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub only_time: bool,
}

/// Field definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field name, unique within the module
    pub name: String,

    /// Logical type
    pub kind: FieldKind,

    /// Whether the field holds more than one value
    #[serde(default)]
    pub multi: bool,

    /// Type-specific configuration
    #[serde(default)]
    pub options: FieldOptions,
}

impl Field {
    /// Create a single-valued field
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            multi: false,
            options: FieldOptions::default(),
        }
    }

    /// Create a text field
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    /// Create a number field with the given precision
    pub fn number(name: impl Into<String>, precision: u8) -> Self {
        let mut field = Self::new(name, FieldKind::Number);
        field.options.precision = Some(precision);
        field
    }

    /// Create a bool field
    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    /// Create a datetime field
    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::DateTime)
    }

    /// Create a record reference field
    pub fn record(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Record)
    }

    /// Mark the field as multi-valued
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    /// Mark a datetime field as date-only
    pub fn only_date(mut self) -> Self {
        self.options.only_date = true;
        self
    }
}

/// A dynamic record schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    /// Module identifier
    pub id: u64,

    /// Owning namespace
    pub namespace_id: u64,

    /// Human readable handle
    #[serde(default)]
    pub handle: String,

    /// Ordered field set
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Module {
    /// Create a module with the given fields
    pub fn new(id: u64, namespace_id: u64, fields: Vec<Field>) -> Self {
        Self {
            id,
            namespace_id,
            handle: String::new(),
            fields,
        }
    }

    /// Sets the handle
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = handle.into();
        self
    }

    /// Find a field by its exact name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns true if the module has a field with this name
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Checks structural validity of the definition.
    ///
    /// Field names double as SQL join aliases, so they are restricted to
    /// `[A-Za-z_][A-Za-z0-9_]*` and must be unique.
    pub fn validate_structure(&self) -> Result<(), String> {
        if self.id == 0 {
            return Err("module id must be non-zero".to_string());
        }

        for (i, field) in self.fields.iter().enumerate() {
            if !is_identifier(&field.name) {
                return Err(format!("invalid field name '{}'", field.name));
            }

            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(format!("duplicate field name '{}'", field.name));
            }

            if field.kind != FieldKind::DateTime
                && (field.options.only_date || field.options.only_time)
            {
                return Err(format!(
                    "field '{}': only_date/only_time apply to datetime fields",
                    field.name
                ));
            }

            if field.options.only_date && field.options.only_time {
                return Err(format!(
                    "field '{}': only_date and only_time are exclusive",
                    field.name
                ));
            }
        }

        Ok(())
    }
}

/// Returns true if `s` is a plain identifier
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_lookup() {
        let module = Module::new(1, 1, vec![Field::string("status"), Field::number("score", 0)]);
        assert!(module.has_field("score"));
        assert!(!module.has_field("Score"));
        assert_eq!(module.field("status").map(|f| f.kind), Some(FieldKind::String));
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        let module = Module::new(1, 1, vec![Field::string("bad name")]);
        assert!(module.validate_structure().is_err());

        let module = Module::new(1, 1, vec![Field::string("a"), Field::bool("a")]);
        assert!(module.validate_structure().is_err());
    }

    #[test]
    fn test_validate_datetime_options() {
        let module = Module::new(1, 1, vec![Field::string("s").only_date()]);
        assert!(module.validate_structure().is_err());

        let module = Module::new(1, 1, vec![Field::datetime("d").only_date()]);
        assert!(module.validate_structure().is_ok());
    }

    #[test]
    fn test_module_json() {
        let json = r#"{
            "id": 7,
            "namespaceId": 3,
            "fields": [
                {"name": "score", "kind": "number", "options": {"precision": 2}},
                {"name": "tags", "kind": "select", "multi": true}
            ]
        }"#;

        let module: Module = serde_json::from_str(json).unwrap();
        assert_eq!(module.id, 7);
        assert_eq!(module.namespace_id, 3);
        assert_eq!(module.fields[0].options.precision, Some(2));
        assert!(module.fields[1].multi);
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("created_at"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
    }
}
