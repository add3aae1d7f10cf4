//! Free-text quick-add parser.
//!
//! Grammar, first match wins:
//! 1. `<name> x<qty>` / `<name> X <qty>` / `<name>×<qty>` / `<name>*<qty>`
//!    (a letter marker needs whitespace before it, so `Box 3` keeps its `x`)
//! 2. `<name> <qty>`
//! 3. `<name>` with qty 1
//!
//! `qty` is 1–4 ASCII digits.

use crate::model::item::{RawItem, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;

static MULTIPLIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)(?:\s+[xX]|\s*[*×])\s*(\d{1,4})$").expect("valid multiplier regex")
});
static TRAILING_QTY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s+(\d{1,4})$").expect("valid trailing qty regex"));

/// Parsed quick-add entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickAdd {
    pub name: String,
    pub qty: u32,
}

impl QuickAdd {
    /// Raw record ready for `RoomStore::add`.
    pub fn into_raw(self) -> RawItem {
        RawItem::named(self.name).with_qty(self.qty)
    }
}

/// Parses quick-add text.
///
/// # Errors
/// - `ValidationError::EmptyName` for blank input.
pub fn parse_quick_add(text: &str) -> Result<QuickAdd, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    for pattern in [&*MULTIPLIER_RE, &*TRAILING_QTY_RE] {
        if let Some(caps) = pattern.captures(trimmed) {
            let name = caps[1].trim();
            // Four digits always fit; qty 0 is floored to 1 like any input.
            let qty = caps[2].parse::<u32>().unwrap_or(1).max(1);
            if !name.is_empty() {
                return Ok(QuickAdd {
                    name: name.to_string(),
                    qty,
                });
            }
        }
    }

    Ok(QuickAdd {
        name: trimmed.to_string(),
        qty: 1,
    })
}
