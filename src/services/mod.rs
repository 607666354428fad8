//! Database-backed operations. Each function takes the connection it runs on; multi-step writes
//! open their own transaction on it.

pub mod addresses;
pub mod carts;
pub mod catalog;
pub mod orders;
pub mod ratings;
pub mod status_history;
