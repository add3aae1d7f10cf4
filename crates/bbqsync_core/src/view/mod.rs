//! Local room view and everything derived from it.
//!
//! # Responsibility
//! - Hold the last snapshots received from the change feeds.
//! - Derive filtered lists, counters, roster and settlement for display.
//!
//! # Invariants
//! - Derivation is pure and always runs over the full view.
//! - Settlement and stats ignore list filters.

use crate::model::item::{Item, ItemId, ListKind};
use crate::model::room::{roster, RoomId, RoomMeta};
use crate::settlement::{settle, SettlementOutcome};

/// Status selector of a list filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    /// Checklist: not done. Wishlist: not bought.
    Open,
    /// Checklist only; matches nothing on the wishlist.
    Done,
    Bought,
}

impl StatusFilter {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Some(Self::All),
            "open" => Some(Self::Open),
            "done" => Some(Self::Done),
            "bought" => Some(Self::Bought),
            _ => None,
        }
    }

    fn matches(self, kind: ListKind, item: &Item) -> bool {
        match (self, kind) {
            (Self::All, _) => true,
            (Self::Open, ListKind::Checklist) => !item.done,
            (Self::Open, ListKind::Wishlist) => !item.bought,
            (Self::Done, ListKind::Checklist) => item.done,
            (Self::Done, ListKind::Wishlist) => false,
            (Self::Bought, _) => item.bought,
        }
    }
}

/// Text plus status filter for one list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    /// Case-insensitive substring over `name category note who`.
    pub text: String,
    pub status: StatusFilter,
}

impl ItemFilter {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: StatusFilter::All,
        }
    }

    pub fn status(status: StatusFilter) -> Self {
        Self {
            text: String::new(),
            status,
        }
    }

    pub fn matches(&self, kind: ListKind, item: &Item) -> bool {
        self.status.matches(kind, item) && matches_text(item, &self.text)
    }
}

fn matches_text(item: &Item, query: &str) -> bool {
    let query = query.trim();
    if query.is_empty() {
        return true;
    }
    let haystack = format!(
        "{} {} {} {}",
        item.name, item.category, item.note, item.who
    )
    .to_lowercase();
    haystack.contains(&query.to_lowercase())
}

/// Items of `kind` passing `filter`, order preserved.
pub fn filter_items(items: &[Item], kind: ListKind, filter: &ItemFilter) -> Vec<Item> {
    items
        .iter()
        .filter(|item| filter.matches(kind, item))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListStats {
    pub total: usize,
    /// Always zero for the wishlist.
    pub done: usize,
    pub bought: usize,
    pub open: usize,
}

/// Room-wide counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomStats {
    pub total_spent: f64,
    pub bought: usize,
    /// Neither bought nor done.
    pub open: usize,
    pub checklist: ListStats,
    pub wishlist: ListStats,
}

impl RoomStats {
    pub fn compute(checklist: &[Item], wishlist: &[Item]) -> Self {
        let all = || checklist.iter().chain(wishlist.iter());

        let checklist_done = checklist.iter().filter(|item| item.done).count();
        let checklist_bought = checklist.iter().filter(|item| item.bought).count();
        let wishlist_bought = wishlist.iter().filter(|item| item.bought).count();

        Self {
            total_spent: all().map(|item| item.cost).sum(),
            bought: all().filter(|item| item.bought).count(),
            open: all().filter(|item| !item.bought && !item.done).count(),
            checklist: ListStats {
                total: checklist.len(),
                done: checklist_done,
                bought: checklist_bought,
                // Items both done and bought count twice, hence the floor.
                open: checklist
                    .len()
                    .saturating_sub(checklist_done + checklist_bought),
            },
            wishlist: ListStats {
                total: wishlist.len(),
                done: 0,
                bought: wishlist_bought,
                open: wishlist.len().saturating_sub(wishlist_bought),
            },
        }
    }
}

/// `$12.30`. Non-finite amounts render as zero.
pub fn format_currency(amount: f64) -> String {
    let amount = if amount.is_finite() && amount != 0.0 {
        amount
    } else {
        0.0
    };
    format!("${amount:.2}")
}

/// Last-known room state as delivered by the change feeds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomView {
    pub room_id: RoomId,
    pub meta: Option<RoomMeta>,
    pub checklist: Vec<Item>,
    pub wishlist: Vec<Item>,
}

impl RoomView {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            ..Self::default()
        }
    }

    pub fn items(&self, kind: ListKind) -> &[Item] {
        match kind {
            ListKind::Checklist => &self.checklist,
            ListKind::Wishlist => &self.wishlist,
        }
    }

    pub fn set_items(&mut self, kind: ListKind, items: Vec<Item>) {
        match kind {
            ListKind::Checklist => self.checklist = items,
            ListKind::Wishlist => self.wishlist = items,
        }
    }

    pub fn find(&self, kind: ListKind, id: &ItemId) -> Option<&Item> {
        self.items(kind).iter().find(|item| &item.id == id)
    }

    /// Explicit participants; empty before the first metadata snapshot.
    pub fn participants(&self) -> &[String] {
        self.meta
            .as_ref()
            .map(|meta| meta.participants.as_slice())
            .unwrap_or(&[])
    }

    /// Explicit participants plus every payer, checklist first.
    pub fn roster(&self) -> Vec<String> {
        roster(
            self.participants(),
            self.checklist.iter().chain(self.wishlist.iter()),
        )
    }

    pub fn derive(&self, checklist_filter: &ItemFilter, wishlist_filter: &ItemFilter) -> DerivedView {
        let roster = self.roster();
        DerivedView {
            room_id: self.room_id.clone(),
            checklist: filter_items(&self.checklist, ListKind::Checklist, checklist_filter),
            wishlist: filter_items(&self.wishlist, ListKind::Wishlist, wishlist_filter),
            stats: RoomStats::compute(&self.checklist, &self.wishlist),
            settlement: settle(self.checklist.iter().chain(self.wishlist.iter()), &roster),
            roster,
        }
    }
}

/// Display-ready output of one re-derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedView {
    pub room_id: RoomId,
    pub checklist: Vec<Item>,
    pub wishlist: Vec<Item>,
    pub roster: Vec<String>,
    pub stats: RoomStats,
    pub settlement: SettlementOutcome,
}

#[cfg(test)]
mod tests {
    use super::{filter_items, format_currency, ItemFilter, RoomStats, StatusFilter};
    use crate::model::item::{normalize, Item, ListKind, RawItem};

    fn checklist_item(raw: RawItem) -> Item {
        normalize(&raw, ListKind::Checklist)
    }

    #[test]
    fn currency_has_two_decimals() {
        assert_eq!(format_currency(12.3), "$12.30");
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(-0.0), "$0.00");
        assert_eq!(format_currency(f64::NAN), "$0.00");
    }

    #[test]
    fn text_filter_searches_name_category_note_and_who() {
        let items = vec![
            checklist_item(RawItem::named("Charcoal").with_category("food")),
            checklist_item(RawItem::named("Tongs").with_who("Alice")),
            checklist_item(RawItem::named("Plates").with_note("ask ALICE")),
        ];
        let found = filter_items(&items, ListKind::Checklist, &ItemFilter::text(" alice "));
        assert_eq!(found.len(), 2);
        let found = filter_items(&items, ListKind::Checklist, &ItemFilter::text("FOOD"));
        assert_eq!(found[0].name, "Charcoal");
    }

    #[test]
    fn status_filter_depends_on_list() {
        let done = checklist_item(RawItem::named("Done").with_done(true));
        let bought = normalize(&RawItem::named("Fan").with_bought(true), ListKind::Wishlist);
        let open_wish = normalize(&RawItem::named("Ice"), ListKind::Wishlist);
        let wishlist = vec![bought, open_wish];

        let open = ItemFilter::status(StatusFilter::Open);
        assert!(filter_items(&[done.clone()], ListKind::Checklist, &open).is_empty());
        assert_eq!(filter_items(&wishlist, ListKind::Wishlist, &open)[0].name, "Ice");
        assert!(filter_items(&wishlist, ListKind::Wishlist, &ItemFilter::status(StatusFilter::Done)).is_empty());
    }

    #[test]
    fn stats_floor_checklist_open_at_zero() {
        let checklist = vec![checklist_item(
            RawItem::named("Charcoal").with_done(true).with_cost(10.0),
        )];
        let wishlist = vec![normalize(&RawItem::named("Fan"), ListKind::Wishlist)];
        let stats = RoomStats::compute(&checklist, &wishlist);

        assert_eq!(stats.total_spent, 10.0);
        assert_eq!(stats.bought, 1);
        assert_eq!(stats.open, 1);
        assert_eq!(stats.checklist.open, 0);
        assert_eq!(stats.wishlist.open, 1);
    }
}
