//! Core contracts for sealkv: store adapters, protection providers, and the
//! envelope codec that binds them together.
//! Concrete crypto and storage backends live in sibling crates.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod protection;
pub mod store;

pub use codec::{EnvelopeCodec, Fetched, PutOutcome};
pub use error::EnvelopeError;
pub use protection::{CryptoError, ProtectionProvider};
pub use store::{Cas, Expiry, MemoryStore, StoreAdapter, StoreError, Stored};
