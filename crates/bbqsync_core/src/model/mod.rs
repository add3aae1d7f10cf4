//! Domain model for shared room lists.
//!
//! # Responsibility
//! - Define canonical item and room structures used by core logic.
//! - Own the total coercion rules applied at every ingress boundary.
//!
//! # Invariants
//! - Every item is identified by a stable `ItemId` unique within its room.
//! - Data entering the store always passes through `item::normalize`.

pub mod coerce;
pub mod item;
pub mod patch;
pub mod room;
