//! Checklist/wishlist item model and normalizer.
//!
//! # Responsibility
//! - Define the canonical `Item` record stored in both room collections.
//! - Provide the single total coercion path (`normalize`) for every ingress.
//!
//! # Invariants
//! - `name` is trimmed; `category` is trimmed and never blank.
//! - `qty >= 1`, `cost >= 0` and finite.
//! - `cost > 0` implies `bought`.
//! - Wishlist items always carry `done == false`.
//! - `id` and `created_at` survive re-normalization; `updated_at` does not.

use crate::model::coerce;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Category assigned when the input leaves it blank.
pub const DEFAULT_CATEGORY: &str = "misc";

/// Stable item identifier, unique per room across both lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Mints a fresh random identifier.
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing identifier. Returns `None` for blank input.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which of the two room collections an item lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    /// Needed items; carries a meaningful `done` flag.
    Checklist,
    /// Optional items; `done` is always false.
    Wishlist,
}

impl ListKind {
    pub const ALL: [ListKind; 2] = [ListKind::Checklist, ListKind::Wishlist];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Checklist => "checklist",
            Self::Wishlist => "wishlist",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "checklist" => Some(Self::Checklist),
            "wishlist" => Some(Self::Wishlist),
            _ => None,
        }
    }

    /// Destination list of a move out of `self`.
    pub fn other(self) -> Self {
        match self {
            Self::Checklist => Self::Wishlist,
            Self::Wishlist => Self::Checklist,
        }
    }
}

impl Display for ListKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failures that abort an operation before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Item name is blank after trim.
    EmptyName,
    /// Import payload does not match the export document shape.
    InvalidImport(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "item name must not be blank"),
            Self::InvalidImport(details) => write!(f, "invalid import payload: {details}"),
        }
    }
}

impl Error for ValidationError {}

/// Canonical, schema-stable item record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub category: String,
    pub qty: u32,
    pub note: String,
    /// Payer name; feeds the participant roster and settlement.
    pub who: String,
    pub want: String,
    pub cost: f64,
    pub bought: bool,
    pub done: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Returns the item as a loosely typed record for re-normalization.
    pub fn to_raw(&self) -> RawItem {
        match serde_json::to_value(self) {
            Ok(Value::Object(fields)) => RawItem { fields },
            _ => RawItem::default(),
        }
    }

    /// Payer name trimmed, or `None` when unassigned.
    pub fn payer(&self) -> Option<&str> {
        let trimmed = self.who.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// Re-asserts the cross-field invariants for the given list.
    pub(crate) fn enforce_invariants(&mut self, kind: ListKind) {
        if self.cost > 0.0 {
            self.bought = true;
        }
        if kind != ListKind::Checklist {
            self.done = false;
        }
    }
}

/// Loosely typed item input.
///
/// Holds arbitrary JSON fields (camelCase keys, unknown keys tolerated) so
/// form submissions, import payloads and remote snapshots share one
/// coercion path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawItem {
    fields: Map<String, Value>,
}

impl RawItem {
    /// Wraps a JSON value. Returns `None` when the value is not an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Starts a raw record with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::default().with("name", Value::String(name.into()))
    }

    /// Sets one raw field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn with_id(self, id: &ItemId) -> Self {
        self.with("id", id.as_str())
    }

    pub fn with_category(self, category: &str) -> Self {
        self.with("category", category)
    }

    pub fn with_qty(self, qty: u32) -> Self {
        self.with("qty", qty)
    }

    pub fn with_cost(self, cost: f64) -> Self {
        self.with("cost", cost)
    }

    pub fn with_who(self, who: &str) -> Self {
        self.with("who", who)
    }

    pub fn with_note(self, note: &str) -> Self {
        self.with("note", note)
    }

    pub fn with_done(self, done: bool) -> Self {
        self.with("done", done)
    }

    pub fn with_bought(self, bought: bool) -> Self {
        self.with("bought", bought)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Trimmed name as it would be normalized.
    pub fn trimmed_name(&self) -> String {
        coerce::to_text(self.get("name")).trim().to_string()
    }
}

/// Normalizes a raw record for `kind`, stamping `updated_at` with now.
///
/// Total: never fails. A blank name is preserved as empty; callers that
/// write to the store reject it separately.
pub fn normalize(raw: &RawItem, kind: ListKind) -> Item {
    normalize_at(raw, kind, Utc::now())
}

/// Same as [`normalize`] with an explicit clock.
pub fn normalize_at(raw: &RawItem, kind: ListKind, now: DateTime<Utc>) -> Item {
    let now = coerce::to_millis_precision(now);
    let category = coerce::to_text(raw.get("category")).trim().to_string();
    let id = raw
        .get("id")
        .map(|value| coerce::to_text(Some(value)))
        .and_then(|text| ItemId::parse(&text))
        .unwrap_or_else(ItemId::mint);
    let created_at = coerce::to_timestamp(raw.get("createdAt"))
        .map(coerce::to_millis_precision)
        .unwrap_or(now);

    let mut item = Item {
        id,
        name: raw.trimmed_name(),
        category: if category.is_empty() {
            DEFAULT_CATEGORY.to_string()
        } else {
            category
        },
        qty: coerce::to_qty(raw.get("qty")),
        note: coerce::to_text(raw.get("note")),
        who: coerce::to_text(raw.get("who")),
        want: coerce::to_text(raw.get("want")),
        cost: coerce::to_cost(raw.get("cost")),
        bought: coerce::to_flag(raw.get("bought")),
        done: coerce::to_flag(raw.get("done")),
        created_at,
        updated_at: now,
    };
    item.enforce_invariants(kind);
    item
}

/// Normalizes a raw record for a store write, rejecting blank names.
pub fn normalize_for_write(raw: &RawItem, kind: ListKind) -> Result<Item, ValidationError> {
    let item = normalize(raw, kind);
    if item.name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::{normalize, normalize_at, normalize_for_write, ItemId, ListKind, RawItem};
    use chrono::{Duration, Utc};
    use serde_json::json;

    #[test]
    fn defaults_fill_missing_fields() {
        let item = normalize(&RawItem::named("  Charcoal  "), ListKind::Checklist);
        assert_eq!(item.name, "Charcoal");
        assert_eq!(item.category, "misc");
        assert_eq!(item.qty, 1);
        assert_eq!(item.cost, 0.0);
        assert!(!item.bought);
        assert!(!item.done);
        assert!(item.note.is_empty());
        assert!(item.who.is_empty());
        assert!(item.want.is_empty());
        assert!(!item.id.as_str().is_empty());
    }

    #[test]
    fn positive_cost_forces_bought() {
        let raw = RawItem::named("Tongs").with_cost(12.0).with_bought(false);
        let item = normalize(&raw, ListKind::Wishlist);
        assert!(item.bought);
    }

    #[test]
    fn wishlist_forces_done_false() {
        let raw = RawItem::named("Fan").with_done(true);
        assert!(!normalize(&raw, ListKind::Wishlist).done);
        assert!(normalize(&raw, ListKind::Checklist).done);
    }

    #[test]
    fn preserves_id_and_created_at_but_refreshes_updated_at() {
        let earlier = Utc::now() - Duration::hours(3);
        let first = normalize_at(&RawItem::named("Plates"), ListKind::Checklist, earlier);
        let later = earlier + Duration::minutes(5);
        let second = normalize_at(&first.to_raw(), ListKind::Checklist, later);

        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
    }

    #[test]
    fn normalization_is_idempotent_except_updated_at() {
        let raw = RawItem::from_value(json!({
            "name": "  Wings ",
            "category": "  ",
            "qty": "3.7",
            "cost": "-2",
            "who": "Alice",
            "done": 1,
            "extra": {"ignored": true}
        }))
        .unwrap();
        let once = normalize(&raw, ListKind::Wishlist);
        let mut twice = normalize(&once.to_raw(), ListKind::Wishlist);
        twice.updated_at = once.updated_at;
        assert_eq!(twice, once);
    }

    #[test]
    fn blank_id_is_replaced_with_minted_id() {
        let raw = RawItem::named("x").with("id", "   ");
        let item = normalize(&raw, ListKind::Checklist);
        assert!(!item.id.as_str().trim().is_empty());
        assert!(ItemId::parse("   ").is_none());
    }

    #[test]
    fn write_normalization_rejects_blank_name() {
        let err = normalize_for_write(&RawItem::named("   "), ListKind::Checklist).unwrap_err();
        assert_eq!(err, super::ValidationError::EmptyName);
    }

    #[test]
    fn serializes_with_camel_case_wire_fields() {
        let item = normalize(&RawItem::named("Ice").with_qty(2), ListKind::Checklist);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["name"], "Ice");
        assert_eq!(json["qty"], 2);
        assert!(json["createdAt"].is_string());
        assert!(json["updatedAt"].is_string());
        assert!(json.get("created_at").is_none());
    }

    #[test]
    fn list_kind_round_trips_through_text() {
        for kind in ListKind::ALL {
            assert_eq!(ListKind::parse(kind.as_str()), Some(kind));
            assert_eq!(kind.other().other(), kind);
        }
        assert_eq!(ListKind::parse("todo"), None);
    }
}
