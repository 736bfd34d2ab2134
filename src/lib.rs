//! Small daemon and cli that watch your daily notes and record when during the day words
//! actually get written. Saves are turned into word count deltas and summed into half hour
//! buckets, reports show the day, a rolling average and the hours you usually write most.
//!

pub mod cli;
pub mod daemon;
pub mod fs;
pub mod utils;
