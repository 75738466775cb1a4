//! Domain building blocks for packforge.
//!
//! Holds everything that does not touch the database or the HTTP layer:
//! shared types, the domain error, streaming content hashing, resource pack
//! archive inspection and the pack-format lookup table.

pub mod archive;
pub mod error;
pub mod hashing;
pub mod naming;
pub mod pack_format;
pub mod types;
