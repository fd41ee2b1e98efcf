use crate::error::Result;
use crate::models::{CatalogSchema, FieldKind, FieldValue, ProductRecord, IDENTIFYING_FIELD};
use csv::ReaderBuilder;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use tracing::{debug, info, warn};

/// Accounting for one catalog load. Bad rows are skipped, never fatal.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded: usize,
    pub skipped: Vec<SkippedRow>,
}

#[derive(Debug)]
pub struct SkippedRow {
    /// 1-based data row number (the header line is not counted).
    pub row: usize,
    pub reason: String,
}

/// All product records of one catalog build, in positional order. The
/// position of a record here is its id in the vector index.
pub struct CatalogStore {
    schema: CatalogSchema,
    records: Vec<ProductRecord>,
    by_name: HashMap<String, usize>,
}

impl CatalogStore {
    /// Parse tabular input into normalized records.
    ///
    /// Declared numeric fields failing to parse become null; declared list
    /// fields are comma-split with per-element trimming; rows without the
    /// identifying field are skipped and recorded in the report.
    pub fn load<R: Read>(schema: CatalogSchema, reader: R) -> Result<(Self, LoadReport)> {
        let mut csv_reader = ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        let mut report = LoadReport::default();

        for (index, row) in csv_reader.deserialize::<HashMap<String, String>>().enumerate() {
            let row_number = index + 1;
            report.total_rows += 1;

            let raw = match row {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("Skipping malformed row {}: {}", row_number, e);
                    report.skipped.push(SkippedRow {
                        row: row_number,
                        reason: format!("malformed row: {}", e),
                    });
                    continue;
                }
            };

            match coerce_row(&schema, &raw) {
                Some(record) => {
                    records.push(record);
                    report.loaded += 1;
                }
                None => {
                    debug!("Row {} has no identifying field, skipping", row_number);
                    report.skipped.push(SkippedRow {
                        row: row_number,
                        reason: format!("missing required field '{}'", IDENTIFYING_FIELD),
                    });
                }
            }
        }

        info!(
            "Catalog load complete: {} rows, {} loaded, {} skipped",
            report.total_rows,
            report.loaded,
            report.skipped.len()
        );

        Ok((Self::from_records(schema, records), report))
    }

    /// Wrap already-normalized records (snapshot loading path).
    pub fn from_records(schema: CatalogSchema, records: Vec<ProductRecord>) -> Self {
        let mut by_name = HashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            // First occurrence wins for duplicate names.
            by_name
                .entry(record.name().trim().to_lowercase())
                .or_insert(position);
        }

        Self {
            schema,
            records,
            by_name,
        }
    }

    /// Case-insensitive exact lookup by display name.
    pub fn get(&self, name: &str) -> Option<&ProductRecord> {
        self.by_name
            .get(&name.trim().to_lowercase())
            .map(|&position| &self.records[position])
    }

    /// Display names in catalog order.
    pub fn list_all(&self) -> Vec<String> {
        self.records.iter().map(|r| r.name().to_string()).collect()
    }

    pub fn records(&self) -> &[ProductRecord] {
        &self.records
    }

    pub fn schema(&self) -> &CatalogSchema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Apply the schema's type coercions to one raw row. Returns None when the
/// identifying field is missing or empty.
fn coerce_row(schema: &CatalogSchema, raw: &HashMap<String, String>) -> Option<ProductRecord> {
    let name = raw.get(IDENTIFYING_FIELD).map(|s| s.trim())?;
    if name.is_empty() {
        return None;
    }

    let mut fields = BTreeMap::new();
    for field in schema.fields() {
        let raw_value = raw.get(&field.name).map(|s| s.trim()).unwrap_or("");
        let value = match field.kind {
            FieldKind::Text => {
                if raw_value.is_empty() {
                    FieldValue::Null
                } else {
                    FieldValue::Text(raw_value.to_string())
                }
            }
            FieldKind::Integer => match raw_value.parse::<i64>() {
                Ok(n) => FieldValue::Integer(n),
                Err(_) => {
                    if !raw_value.is_empty() {
                        debug!(
                            "Field '{}' value '{}' is not an integer, storing null",
                            field.name, raw_value
                        );
                    }
                    FieldValue::Null
                }
            },
            FieldKind::List => FieldValue::List(
                raw_value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
        };
        fields.insert(field.name.clone(), value);
    }

    Some(ProductRecord::new(fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_csv(data: &str) -> (CatalogStore, LoadReport) {
        CatalogStore::load(CatalogSchema::standard(), data.as_bytes()).unwrap()
    }

    #[test]
    fn test_load_coerces_declared_types() {
        let (store, report) = load_csv(
            "name,type,price,features,seating_capacity\n\
             Camry,Sedan,30000,\"GPS, Bluetooth, ,AC\",5\n\
             Accord,Sedan,not-a-number,,4\n",
        );

        assert_eq!(report.loaded, 2);
        assert!(report.skipped.is_empty());

        let camry = store.get("Camry").unwrap();
        assert_eq!(camry.integer("price"), Some(30000));
        assert_eq!(camry.list("features"), ["GPS", "Bluetooth", "AC"]);
        assert_eq!(camry.integer("seating_capacity"), Some(5));

        // Unparseable numeric fails silently to null, empty list stays empty.
        let accord = store.get("Accord").unwrap();
        assert_eq!(accord.integer("price"), None);
        assert_eq!(*accord.value("price"), FieldValue::Null);
        assert!(accord.list("features").is_empty());
    }

    #[test]
    fn test_every_record_exposes_every_schema_key() {
        let (store, _) = load_csv("name\nCamry\n");
        let record = store.get("Camry").unwrap();

        // Fields absent from the CSV are present as null/empty, not omitted.
        assert_eq!(*record.value("price"), FieldValue::Null);
        assert_eq!(*record.value("description"), FieldValue::Null);
        assert_eq!(*record.value("features"), FieldValue::List(vec![]));
    }

    #[test]
    fn test_rows_without_name_are_skipped_and_reported() {
        let (store, report) = load_csv(
            "name,type\n\
             Camry,Sedan\n\
             ,Sedan\n\
             Accord,Sedan\n",
        );

        assert_eq!(store.len(), 2);
        assert_eq!(report.total_rows, 3);
        assert_eq!(report.loaded, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].row, 2);
        assert!(report.skipped[0].reason.contains("name"));
    }

    #[test]
    fn test_get_is_case_insensitive() {
        let (store, _) = load_csv("name,type\nHonda Accord,Sedan\n");

        assert!(store.get("honda accord").is_some());
        assert!(store.get("HONDA ACCORD").is_some());
        assert!(store.get("  Honda Accord  ").is_some());
        assert!(store.get("Civic").is_none());
    }

    #[test]
    fn test_list_all_preserves_catalog_order() {
        let (store, _) = load_csv("name\nZephyr\nAtlas\nMeridian\n");
        assert_eq!(store.list_all(), ["Zephyr", "Atlas", "Meridian"]);
    }

    #[test]
    fn test_duplicate_names_resolve_to_first_occurrence() {
        let (store, _) = load_csv("name,price\nCamry,1\nCamry,2\n");
        assert_eq!(store.get("camry").unwrap().integer("price"), Some(1));
    }
}
