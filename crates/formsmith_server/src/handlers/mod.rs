pub mod auth;
pub mod forms;
pub mod health;
pub mod public;
pub mod responses;
pub mod users;
