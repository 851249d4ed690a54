#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod group;

pub mod ordered_table;

/// An insertion-ordered map implementation over the `OrderedTable`.
///
/// This module provides an `OrderedMap` that wraps the `OrderedTable` and
/// provides a standard key-value map interface with configurable hashers,
/// iterating in insertion order.
pub mod ordered_map;

pub use ordered_map::Entry;
pub use ordered_map::OrderedMap;
pub use ordered_table::OrderedTable;

/// Errors surfaced by table and map operations.
///
/// Absence of a key is not an error; lookups and removals signal it with
/// `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A caller-side hash hook failed before the table was consulted.
    ///
    /// The table itself consumes ready hashes, so it never produces this;
    /// it exists for embedding runtimes that hash through fallible hooks
    /// and need a single error type end to end.
    HashFailed,
    /// An equality predicate failed during probing. The operation was
    /// aborted with no mutation.
    EqualityFailed,
    /// A cursor detected a structural mutation (insert of a new entry,
    /// removal, clear, or rebuild) since it was created.
    MutatedDuringIteration,
    /// Growing the table failed to allocate. The table is unchanged, at
    /// its previous capacity with its previous contents.
    OutOfMemory,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::HashFailed => f.write_str("hash hook failed"),
            Error::EqualityFailed => f.write_str("equality hook failed"),
            Error::MutatedDuringIteration => {
                f.write_str("table structurally mutated during iteration")
            }
            Error::OutOfMemory => f.write_str("allocation failed while growing the table"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
