//! Room export and import documents.
//!
//! # Responsibility
//! - Build the versioned export document from a room view.
//! - Validate import text fully before any write happens.
//!
//! # Invariants
//! - `parse_import` either returns a complete payload or an error; callers
//!   never see a partially validated document.
//! - An item id may appear in at most one of the imported lists.

use crate::model::item::{Item, ListKind, RawItem, ValidationError};
use crate::model::room::RoomId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Version written into `meta.version`.
pub const EXPORT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMeta {
    pub version: u32,
    pub room_id: RoomId,
    pub exported_at: DateTime<Utc>,
}

/// Full export of one room's collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub meta: ExportMeta,
    pub checklist: Vec<Item>,
    pub wishlist: Vec<Item>,
}

impl ExportDocument {
    pub fn new(
        room_id: RoomId,
        checklist: Vec<Item>,
        wishlist: Vec<Item>,
        exported_at: DateTime<Utc>,
    ) -> Self {
        Self {
            meta: ExportMeta {
                version: EXPORT_VERSION,
                room_id,
                exported_at,
            },
            checklist,
            wishlist,
        }
    }

    /// Pretty-printed JSON text.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Suggested download name, e.g. `bbq-room-bbq-2025-export-2025-07-01.json`.
    pub fn file_name(&self) -> String {
        format!(
            "bbq-room-{}-export-{}.json",
            self.meta.room_id,
            self.meta.exported_at.format("%Y-%m-%d")
        )
    }
}

/// Validated import contents, still un-normalized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportPayload {
    pub checklist: Vec<RawItem>,
    pub wishlist: Vec<RawItem>,
}

impl ImportPayload {
    pub fn len(&self) -> usize {
        self.checklist.len() + self.wishlist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parses and validates import text.
///
/// # Errors
/// - `ValidationError::InvalidImport` when the text is not JSON, the top
///   level is not an object, a list is missing or not an array, an element
///   is not an object, an element name is blank, or one id appears in both
///   lists.
pub fn parse_import(text: &str) -> Result<ImportPayload, ValidationError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| ValidationError::InvalidImport(format!("not valid JSON: {err}")))?;
    parse_import_value(value)
}

/// Same as [`parse_import`] for an already parsed value.
pub fn parse_import_value(value: Value) -> Result<ImportPayload, ValidationError> {
    let Value::Object(mut root) = value else {
        return Err(invalid("top level must be an object"));
    };

    let checklist = take_list(&mut root, ListKind::Checklist)?;
    let wishlist = take_list(&mut root, ListKind::Wishlist)?;

    let checklist_ids: HashSet<String> = checklist.iter().filter_map(raw_id).collect();
    if let Some(shared) = wishlist
        .iter()
        .filter_map(raw_id)
        .find(|id| checklist_ids.contains(id))
    {
        return Err(invalid(format!("item id `{shared}` appears in both lists")));
    }

    Ok(ImportPayload {
        checklist,
        wishlist,
    })
}

fn take_list(
    root: &mut serde_json::Map<String, Value>,
    kind: ListKind,
) -> Result<Vec<RawItem>, ValidationError> {
    let Some(Value::Array(elements)) = root.remove(kind.as_str()) else {
        return Err(invalid(format!("`{kind}` must be an array")));
    };

    elements
        .into_iter()
        .enumerate()
        .map(|(index, element)| {
            let raw = RawItem::from_value(element)
                .ok_or_else(|| invalid(format!("{kind}[{index}] must be an object")))?;
            if raw.trimmed_name().is_empty() {
                return Err(invalid(format!("{kind}[{index}] has a blank name")));
            }
            Ok(raw)
        })
        .collect()
}

fn raw_id(raw: &RawItem) -> Option<String> {
    match raw.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => Some(id.trim().to_string()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    }
}

fn invalid(details: impl Into<String>) -> ValidationError {
    ValidationError::InvalidImport(details.into())
}

#[cfg(test)]
mod tests {
    use super::{parse_import, ExportDocument, EXPORT_VERSION};
    use crate::model::item::{normalize, ListKind, RawItem, ValidationError};
    use crate::model::room::RoomId;
    use chrono::{TimeZone, Utc};
    use serde_json::Value;

    fn rejection(text: &str) -> String {
        match parse_import(text).unwrap_err() {
            ValidationError::InvalidImport(details) => details,
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn export_document_shape_and_file_name() {
        let exported_at = Utc.with_ymd_and_hms(2025, 7, 1, 18, 30, 0).unwrap();
        let item = normalize(&RawItem::named("Charcoal").with_cost(12.3), ListKind::Checklist);
        let doc = ExportDocument::new(RoomId::default(), vec![item], Vec::new(), exported_at);

        assert_eq!(doc.file_name(), "bbq-room-bbq-2025-export-2025-07-01.json");
        let value: Value = serde_json::from_str(&doc.to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["meta"]["version"], EXPORT_VERSION);
        assert_eq!(value["meta"]["roomId"], "bbq-2025");
        assert_eq!(value["checklist"][0]["bought"], true);
        assert!(value["wishlist"].as_array().unwrap().is_empty());
    }

    #[test]
    fn accepts_minimal_document() {
        let payload =
            parse_import(r#"{"checklist":[{"name":"Ice"}],"wishlist":[],"meta":{}}"#).unwrap();
        assert_eq!(payload.checklist.len(), 1);
        assert!(payload.wishlist.is_empty());
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(rejection("not json").contains("JSON"));
        assert!(rejection("[]").contains("object"));
        assert!(rejection(r#"{"checklist":[]}"#).contains("wishlist"));
        assert!(rejection(r#"{"checklist":{},"wishlist":[]}"#).contains("checklist"));
        assert!(rejection(r#"{"checklist":[1],"wishlist":[]}"#).contains("checklist[0]"));
        assert!(rejection(r#"{"checklist":[],"wishlist":[{"name":"  "}]}"#).contains("blank"));
    }

    #[test]
    fn rejects_id_present_in_both_lists() {
        let text = r#"{"checklist":[{"id":"a","name":"x"}],"wishlist":[{"id":"a","name":"y"}]}"#;
        assert!(rejection(text).contains("both lists"));
    }
}
