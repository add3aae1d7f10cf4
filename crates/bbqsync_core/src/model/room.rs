//! Room identity, metadata and participant roster.
//!
//! # Responsibility
//! - Sanitize external room selectors into storage-safe ids.
//! - Normalize the explicit participant list.
//! - Derive the settlement roster from participants plus item payers.
//!
//! # Invariants
//! - A `RoomId` never contains `/ # ? [ ]` and is never empty.
//! - Participant lists are trimmed, non-empty and duplicate-free, in first
//!   occurrence order.

use crate::model::item::Item;
use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

/// Room used when the selector is absent or sanitizes to empty.
pub const DEFAULT_ROOM_ID: &str = "bbq-2025";

const ROOM_QUERY_KEY: &str = "room";
const ROOM_ID_FORBIDDEN: [char; 5] = ['/', '#', '?', '[', ']'];

/// Sanitized room identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Sanitizes an optional selector, falling back to [`DEFAULT_ROOM_ID`].
    pub fn parse(selector: Option<&str>) -> Self {
        let trimmed = selector.unwrap_or_default().trim();
        if trimmed.is_empty() {
            return Self::default();
        }
        let sanitized = trimmed.replace(ROOM_ID_FORBIDDEN, "-");
        Self(sanitized)
    }

    /// Extracts `room=<id>` from a URL query string (leading `?` optional).
    pub fn from_query(query: &str) -> Self {
        let value = query
            .trim_start_matches('?')
            .split('&')
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
            .find(|(key, _)| *key == ROOM_QUERY_KEY)
            .map(|(_, value)| {
                let spaced = value.replace('+', " ");
                percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
            });
        Self::parse(value.as_deref())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self(DEFAULT_ROOM_ID.to_string())
    }
}

impl Display for RoomId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMeta {
    pub room_id: RoomId,
    /// Explicit roster, normalized.
    pub participants: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Trims, drops empties and dedupes, keeping first occurrence order.
pub fn normalize_participants<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for name in names {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() || !seen.insert(trimmed.to_string()) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}

/// Parses comma-separated participant text (`"Alice, Bob,,Carol"`).
pub fn parse_participants(text: &str) -> Vec<String> {
    normalize_participants(text.split(','))
}

/// Union of the explicit roster and every distinct payer on `items`.
///
/// Explicit names come first in stored order, followed by payers in item
/// order.
pub fn roster<'a, I>(participants: &'a [String], items: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Item>,
{
    let payers = items.into_iter().filter_map(Item::payer);
    normalize_participants(
        participants
            .iter()
            .map(String::as_str)
            .chain(payers)
            .collect::<Vec<_>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::{parse_participants, roster, RoomId, DEFAULT_ROOM_ID};
    use crate::model::item::{normalize, ListKind, RawItem};

    #[test]
    fn room_id_replaces_forbidden_characters() {
        assert_eq!(RoomId::parse(Some(" a/b#c?d[e]f ")).as_str(), "a-b-c-d-e-f");
    }

    #[test]
    fn room_id_falls_back_when_blank() {
        assert_eq!(RoomId::parse(None).as_str(), DEFAULT_ROOM_ID);
        assert_eq!(RoomId::parse(Some("   ")).as_str(), DEFAULT_ROOM_ID);
    }

    #[test]
    fn room_id_reads_query_parameter() {
        assert_eq!(
            RoomId::from_query("?lang=zh&room=summer%2Fpicnic").as_str(),
            "summer-picnic"
        );
        assert_eq!(RoomId::from_query("room=bbq+night").as_str(), "bbq night");
        assert_eq!(RoomId::from_query("lang=zh").as_str(), DEFAULT_ROOM_ID);
        assert_eq!(RoomId::from_query("room=").as_str(), DEFAULT_ROOM_ID);
    }

    #[test]
    fn participants_text_is_trimmed_and_deduped() {
        assert_eq!(
            parse_participants(" Alice, Bob,,Alice , Carol "),
            vec!["Alice", "Bob", "Carol"]
        );
        assert!(parse_participants(" , ").is_empty());
    }

    #[test]
    fn roster_unions_explicit_names_with_payers() {
        let items = [
            normalize(&RawItem::named("Wings").with_who(" Dave "), ListKind::Checklist),
            normalize(&RawItem::named("Ice").with_who("Alice"), ListKind::Checklist),
            normalize(&RawItem::named("Fan"), ListKind::Wishlist),
        ];
        let explicit = vec!["Alice".to_string(), "Bob".to_string()];
        assert_eq!(roster(&explicit, &items), vec!["Alice", "Bob", "Dave"]);
        assert_eq!(roster(&[], &items), vec!["Dave", "Alice"]);
    }
}
