//! Shiv Accounts: double-entry bookkeeping for small Indian businesses.
//!
//! The [`books::Books`] service holds the business rules and sits on any
//! [`StorageBackend`](shiv_core::StorageBackend); [`api`] exposes it over HTTP.

pub mod api;
pub mod auth;
pub mod books;
pub mod config;
pub mod error;
pub mod render;
pub mod seed;
pub mod storage;
