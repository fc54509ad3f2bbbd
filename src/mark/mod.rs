//! Spread-spectrum mark: schedule, embed, extract, capacity.
//!
//! Encode path: frame bits -> [`schedule::schedule`] -> [`embed::embed`].
//! Decode path: the same schedule -> [`extract::extract`] -> frame decode.

pub mod capacity;
pub mod embed;
pub mod extract;
pub mod prng;
pub mod schedule;
