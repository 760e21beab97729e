//! Use-case services over the repository layer.
//!
//! # Responsibility
//! - Provide the public orchestration surface consumed by the host
//!   application's composition root.
//! - Keep repositories storage-focused; cross-entity flows live here.
//!
//! # Invariants
//! - Service APIs never bypass repository validation or transaction
//!   contracts.
//! - The store handle is an explicitly constructed connection owned by the
//!   caller; there is no global singleton.

pub mod export_service;
pub mod journal_service;
