//! HTTP handlers, grouped by domain.

pub mod auth;
pub mod calculator;
pub mod health;
pub mod modules;
pub mod users;
