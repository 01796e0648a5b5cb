//! `bloomledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the stock ledger and the
//! revenue reconciliation crates (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod money;
pub mod version;

pub use error::{DomainError, DomainResult};
pub use id::{BranchName, HistoryEntryId, ItemId, OperatorId, OrderId, sanitize_key};
pub use money::{Amount, round_half_up_percent};
pub use version::{ExpectedVersion, Versioned};
