//! Idempotency Bounded Context
//!
//! Maps a submission fingerprint to the order it created so that a
//! semantically identical request inside the idempotency window resolves to
//! the same order instead of reaching the venue twice.
//!
//! The ledger rows themselves are owned by the persistence store, which
//! enforces uniqueness of live fingerprints. This module holds the pure
//! parts: how a fingerprint is derived and when a record has expired.

mod fingerprint;
mod record;

pub use fingerprint::Fingerprint;
pub use record::{IdempotencyLedger, IdempotencyRecord};
