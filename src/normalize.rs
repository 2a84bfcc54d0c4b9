//! Post-processing of resolution records before they are written out.

use ip_extract::Ledger;
use serde_json::Value;

use crate::fields::FieldSpec;
use crate::record::{query_of, ResolutionRecord};

/// Separator used when a list value is rendered into one table cell.
pub const LIST_SEPARATOR: &str = " | ";

/// Set `count` on every record from the ledger, matching on `query`.
/// Records the ledger has never seen get zero.
pub fn merge_counts(mut records: Vec<ResolutionRecord>, ledger: &Ledger) -> Vec<ResolutionRecord> {
    for record in &mut records {
        let count = query_of(record).map_or(0, |q| ledger.count(q));
        record.insert("count".to_string(), Value::from(count));
    }
    records
}

/// Restrict every record to exactly the fields of `fields`, in that order.
/// Missing fields become `null`, extra keys are dropped.
pub fn project(records: Vec<ResolutionRecord>, fields: &FieldSpec) -> Vec<ResolutionRecord> {
    records
        .into_iter()
        .map(|mut record| {
            fields
                .iter()
                .map(|f| (f.to_string(), record.remove(f).unwrap_or(Value::Null)))
                .collect()
        })
        .collect()
}

/// Make nested records fit a table.
///
/// List values become one string joined with [`LIST_SEPARATOR`]. Object
/// values are expanded into `field.subkey` columns, which are appended to
/// `fields` the first time they appear. The original object stays under its
/// own column.
pub fn flatten_for_table(records: &[ResolutionRecord], fields: &mut FieldSpec) -> Vec<ResolutionRecord> {
    let columns: Vec<String> = fields.as_slice().to_vec();
    records
        .iter()
        .map(|raw| {
            let mut row = raw.clone();
            for column in &columns {
                match raw.get(column) {
                    Some(Value::Array(items)) => {
                        let joined = items
                            .iter()
                            .map(cell_text)
                            .collect::<Vec<_>>()
                            .join(LIST_SEPARATOR);
                        row.insert(column.clone(), Value::from(joined));
                    }
                    Some(Value::Object(map)) => {
                        for (key, value) in map {
                            let sub = format!("{column}.{key}");
                            fields.push(&sub);
                            row.insert(sub, value.clone());
                        }
                    }
                    _ => {}
                }
            }
            row
        })
        .collect()
}

/// Text of a value as it appears in a table cell.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}
