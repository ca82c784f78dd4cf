//! PostgreSQL adapters for the Formsmith core port traits.
//!
//! Each adapter is a newtype wrapping PgPool. All SQL is runtime-checked
//! (sqlx::query, not sqlx::query!) to avoid a compile-time DB requirement.

mod sqlx_types;
mod store;

pub use store::{PgFormStore, PgResponseStore, PgStores, PgUserStore};
