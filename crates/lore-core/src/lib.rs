//! # lore-core
//!
//! Foundation types for the lore suggestion pipeline.
//!
//! This crate provides the shared vocabulary that all other lore crates
//! depend on:
//!
//! - **Branded IDs**: [`ids::SuggestionId`], [`ids::TeamId`], [`ids::PageId`] as newtypes
//! - **Suggestions**: [`suggestion::Suggestion`] and its forward-only status machine
//! - **Detections**: [`detection::Detection`] inbound payload with validation
//! - **Activity**: [`activity::ActivityEntry`] append-only lifecycle records
//! - **Usage**: [`usage::UsageSnapshot`] per-team plan counters
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other lore crates.

#![deny(unsafe_code)]

pub mod activity;
pub mod detection;
pub mod ids;
pub mod page;
pub mod suggestion;
pub mod usage;
