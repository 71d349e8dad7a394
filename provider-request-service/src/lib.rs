//! Provider Request Service - intake and approval of green hosting providers.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
