//! Shared data model for the indexer allocation monitor.
//!
//! Everything here is plain data: snapshots handed in by the data-fetch
//! layer, the per-tick [`context::RuleContext`], and the
//! [`types::Notification`] records that rules produce and channels consume.

pub mod cache;
pub mod context;
pub mod id;
pub mod types;
