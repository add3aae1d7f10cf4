//! Display-order comparator for participant names.
//!
//! Han characters sort by their toneless pinyin, other characters
//! case-insensitively. Equal keys fall back to the raw string so the order is
//! total and stable.

use pinyin::ToPinyin;
use std::cmp::Ordering;

/// Sort key used by [`compare_names`].
pub fn collation_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch.to_pinyin() {
            Some(pinyin) => key.push_str(pinyin.plain()),
            None => key.extend(ch.to_lowercase()),
        }
    }
    key
}

/// Total order over names.
pub fn compare_names(left: &str, right: &str) -> Ordering {
    collation_key(left)
        .cmp(&collation_key(right))
        .then_with(|| left.cmp(right))
}
