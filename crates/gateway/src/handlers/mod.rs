//! HTTP handlers module

pub mod admin;
pub mod health;
pub mod units;
