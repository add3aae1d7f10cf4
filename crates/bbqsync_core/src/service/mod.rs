//! Use-case services over the room repository.

pub mod exchange;
pub mod quick_add;
pub mod room_store;
