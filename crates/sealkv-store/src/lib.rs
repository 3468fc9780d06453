//! Concrete store adapters for sealkv.
//! Records are opaque bytes; protection happens in the envelope codec above.

pub mod file_store;

pub use file_store::FileStore;
