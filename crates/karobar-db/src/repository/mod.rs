//! # Repository Implementations
//!
//! One repository per aggregate, each a thin struct over [`sqlx::SqlitePool`].
//!
//! Read methods execute against the pool directly. Mutating methods take a
//! `&mut sqlx::Transaction` so they compose into the caller's unit of
//! work: a sale or transfer is always ONE transaction spanning bill rows,
//! item snapshots, stock aggregates and movement history, committed (or
//! rolled back) as a whole by [`crate::engine`] / [`crate::transfer`].

pub mod product;
pub mod sale;
pub mod site;
pub mod stock;
