//! Formsmith core — pure domain logic for the form-builder service.
//!
//! Storage and delivery live behind port traits (`ports`); the HTTP
//! server and the Postgres adapter depend on this crate, never the
//! other way round.

pub mod error;
pub mod events;
pub mod otp;
pub mod password;
pub mod ports;
pub mod principal;
pub mod proto;
pub mod service;
pub mod types;
pub mod validate;
