//! Domain utilities

pub mod expiry;
