//! Foundation types for the Cairn object store.
//!
//! Every other Cairn crate depends on `cairn-types`. The crate is deliberately
//! small: it defines the one identifier the whole system is built around.
//!
//! # Key Types
//!
//! - [`Address`]: 256-bit content address of a stored object
//! - [`TypeError`]: parse failures for textual addresses

pub mod address;
pub mod error;

pub use address::Address;
pub use error::TypeError;
