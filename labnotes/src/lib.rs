//! labnotes library
//!
//! Search, filtering and condition handling for laboratory entries. The
//! binary is a thin CLI over this crate.

pub mod app;
pub mod commands;
pub mod conditions;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod search;
pub mod services;
