//! Opsnotify server library
//!
//! Exposes the dispatch engine and HTTP surface for the binary and tests.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod services;
