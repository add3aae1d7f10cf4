//! Field-level partial updates for items.
//!
//! # Responsibility
//! - Carry per-field edit intents from UI callers.
//! - Coerce only the listed fields, then re-assert item invariants on apply.
//!
//! # Invariants
//! - Applying a patch never changes `id` or `created_at`.
//! - `cost > 0` in a patch implies `bought = true` in the same patch.

use crate::model::coerce;
use crate::model::item::{Item, ListKind, ValidationError, DEFAULT_CATEGORY};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Raw per-field edit. `None` means "field not listed".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub qty: Option<Value>,
    pub note: Option<String>,
    pub who: Option<String>,
    pub want: Option<String>,
    pub cost: Option<Value>,
    pub bought: Option<bool>,
    pub done: Option<bool>,
}

impl ItemPatch {
    pub fn name(value: impl Into<String>) -> Self {
        Self {
            name: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn qty(value: impl Into<Value>) -> Self {
        Self {
            qty: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn cost(value: impl Into<Value>) -> Self {
        Self {
            cost: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn who(value: impl Into<String>) -> Self {
        Self {
            who: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn note(value: impl Into<String>) -> Self {
        Self {
            note: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn done(value: bool) -> Self {
        Self {
            done: Some(value),
            ..Self::default()
        }
    }

    pub fn bought(value: bool) -> Self {
        Self {
            bought: Some(value),
            ..Self::default()
        }
    }

    /// Checkbox toggle on a row.
    ///
    /// Checklist rows toggle `done`, wishlist rows toggle `bought`; checking
    /// either also marks the item bought.
    pub fn toggle(kind: ListKind, checked: bool) -> Self {
        let mut patch = match kind {
            ListKind::Checklist => Self::done(checked),
            ListKind::Wishlist => Self::bought(checked),
        };
        if checked {
            patch.bought = Some(true);
        }
        patch
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Coerces listed fields.
    ///
    /// # Errors
    /// - `ValidationError::EmptyName` when `name` is listed and trims to empty.
    pub fn normalize(&self) -> Result<NormalizedPatch, ValidationError> {
        let name = match self.name.as_deref().map(str::trim) {
            Some("") => return Err(ValidationError::EmptyName),
            other => other.map(str::to_string),
        };
        let category = self.category.as_deref().map(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                DEFAULT_CATEGORY.to_string()
            } else {
                trimmed.to_string()
            }
        });
        let cost = self.cost.as_ref().map(|value| coerce::to_cost(Some(value)));
        let bought = match cost {
            Some(cost) if cost > 0.0 => Some(true),
            _ => self.bought,
        };

        Ok(NormalizedPatch {
            name,
            category,
            qty: self.qty.as_ref().map(|value| coerce::to_qty(Some(value))),
            note: self.note.clone(),
            who: self.who.clone(),
            want: self.want.clone(),
            cost,
            bought,
            done: self.done,
        })
    }
}

/// Patch with every listed field already coerced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub qty: Option<u32>,
    pub note: Option<String>,
    pub who: Option<String>,
    pub want: Option<String>,
    pub cost: Option<f64>,
    pub bought: Option<bool>,
    pub done: Option<bool>,
}

impl NormalizedPatch {
    /// Applies listed fields onto `item` stored in `kind` and stamps `now`.
    pub fn apply_to(&self, item: &mut Item, kind: ListKind, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(category) = &self.category {
            item.category = category.clone();
        }
        if let Some(qty) = self.qty {
            item.qty = qty;
        }
        if let Some(note) = &self.note {
            item.note = note.clone();
        }
        if let Some(who) = &self.who {
            item.who = who.clone();
        }
        if let Some(want) = &self.want {
            item.want = want.clone();
        }
        if let Some(cost) = self.cost {
            item.cost = cost;
        }
        if let Some(bought) = self.bought {
            item.bought = bought;
        }
        if let Some(done) = self.done {
            item.done = done;
        }
        item.enforce_invariants(kind);
        item.updated_at = coerce::to_millis_precision(now);
    }
}
