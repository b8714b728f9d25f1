//! Binary package metadata parsed from `Packages` index stanzas.
//!
//! A `Packages` index is a sequence of Debian control stanzas separated by
//! blank lines. Splitting the index into stanzas and resolving the resulting
//! dependency graph belong to the caller; this module turns a single stanza
//! into a [`Package`] and fetches the `.deb` it describes.
//!
//! # Stanza fields
//!
//! | Header        | Parsed into                         |
//! |---------------|-------------------------------------|
//! | `Package:`    | [`Package::name`] (last wins)       |
//! | `Filename:`   | [`Package::filename`] (last wins)   |
//! | `MD5sum:`     | [`Package::md5sum`] (last wins)     |
//! | `Depends:`    | [`Package::dependencies`] (union)   |
//! | `Recommends:` | [`Package::recommends`] (union)     |
//! | `Task:`       | [`Package::tasks`] (union)          |
//!
//! Other fields are preserved verbatim in [`Package::manifest`].

mod core;
mod manifest;

pub use self::core::Package;
pub use manifest::parse_list;
