//! Storage is organized around a single [entities::TrackingState].
//! The basic idea is:
//!   - Word deltas are summed into fixed time buckets of a calendar day, see [buckets].
//!   - Last seen word count of each tracked file is kept next to the buckets.
//!   - The whole state is written as one json document by [state_storage::JsonStateStorage].

pub mod buckets;
pub mod entities;
pub mod state_storage;
