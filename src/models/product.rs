use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ApiError, Result};

/// Name of the identifying field every catalog schema must declare.
pub const IDENTIFYING_FIELD: &str = "name";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    List,
}

/// Declares how one column of the tabular source is typed and whether it is
/// required. The full set of descriptors is the catalog schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldDescriptor {
    pub fn text(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Text,
            required: false,
        }
    }

    pub fn integer(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Integer,
            required: false,
        }
    }

    pub fn list(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::List,
            required: false,
        }
    }
}

/// Ordered field-descriptor table, validated once at construction.
///
/// Field order is the rendering order for searchable text and prompt
/// summaries, so identical schemas always produce identical renderings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSchema {
    fields: Vec<FieldDescriptor>,
}

impl CatalogSchema {
    pub fn new(fields: Vec<FieldDescriptor>) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(ApiError::ValidationError(format!(
                    "Duplicate field '{}' in catalog schema",
                    field.name
                )));
            }
        }

        let identifying = fields
            .iter()
            .find(|f| f.name == IDENTIFYING_FIELD)
            .ok_or_else(|| {
                ApiError::ValidationError(format!(
                    "Catalog schema must declare a '{}' field",
                    IDENTIFYING_FIELD
                ))
            })?;

        if identifying.kind != FieldKind::Text || !identifying.required {
            return Err(ApiError::ValidationError(format!(
                "The '{}' field must be a required text field",
                IDENTIFYING_FIELD
            )));
        }

        Ok(Self { fields })
    }

    /// The schema the shipped vehicle catalog uses.
    pub fn standard() -> Self {
        Self {
            fields: vec![
                FieldDescriptor {
                    name: IDENTIFYING_FIELD.to_string(),
                    kind: FieldKind::Text,
                    required: true,
                },
                FieldDescriptor::text("type"),
                FieldDescriptor::integer("price"),
                FieldDescriptor::text("engine"),
                FieldDescriptor::text("fuel_economy"),
                FieldDescriptor::integer("seating_capacity"),
                FieldDescriptor::integer("safety_rating"),
                FieldDescriptor::list("features"),
                FieldDescriptor::text("description"),
            ],
        }
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}

/// One field's value. Missing numeric values are `Null`, missing lists are
/// empty; records never drop a key the schema declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    List(Vec<String>),
    Text(String),
    Null,
}

impl FieldValue {
    fn render(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) if !s.is_empty() => Some(s.clone()),
            FieldValue::Integer(n) => Some(n.to_string()),
            FieldValue::List(items) if !items.is_empty() => Some(items.join(", ")),
            _ => None,
        }
    }
}

/// A normalized catalog entry. Values live in a sorted map so serialized
/// catalogs are byte-stable; display order comes from the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl ProductRecord {
    pub fn new(fields: BTreeMap<String, FieldValue>) -> Self {
        Self { fields }
    }

    /// Display name from the identifying field. Loaders reject records
    /// without one, so the fallback is only reachable on hand-built records.
    pub fn name(&self) -> &str {
        match self.fields.get(IDENTIFYING_FIELD) {
            Some(FieldValue::Text(s)) => s,
            _ => "",
        }
    }

    pub fn value(&self, field: &str) -> &FieldValue {
        self.fields.get(field).unwrap_or(&FieldValue::Null)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        match self.value(field) {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn integer(&self, field: &str) -> Option<i64> {
        match self.value(field) {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn list(&self, field: &str) -> &[String] {
        match self.value(field) {
            FieldValue::List(items) => items,
            _ => &[],
        }
    }

    /// The text a record is embedded from: labeled values in schema order,
    /// skipping empties. A pure function of (schema, fields), so identical
    /// catalogs always embed identically.
    pub fn searchable_text(&self, schema: &CatalogSchema) -> String {
        let mut parts = Vec::new();
        for field in schema.fields() {
            if let Some(rendered) = self.value(&field.name).render() {
                parts.push(format!("{}: {}", display_label(&field.name), rendered));
            }
        }
        parts.join(". ")
    }

    /// Full field rendering for generation prompts; absent values show as
    /// N/A so the prompt shape is identical for every record.
    pub fn field_summary(&self, schema: &CatalogSchema) -> String {
        schema
            .fields()
            .iter()
            .map(|field| {
                let rendered = self
                    .value(&field.name)
                    .render()
                    .unwrap_or_else(|| "N/A".to_string());
                format!("{}: {}", display_label(&field.name), rendered)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// "seating_capacity" -> "Seating Capacity"
fn display_label(field_name: &str) -> String {
    field_name
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
