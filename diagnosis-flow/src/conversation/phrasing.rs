//! Choice of cosmetic phrasing.
//!
//! Only message text flows through a [`Phrasing`]. The engine's transitions never look at
//! what was chosen.

use rand::seq::IndexedRandom;

pub trait Phrasing: Send + Sync {
    /// Picks one of `options`, or `""` when there are none.
    fn pick<'a>(&self, options: &'a [String]) -> &'a str;
}

/// Uniformly random choice using the thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPhrasing;

impl Phrasing for RandomPhrasing {
    fn pick<'a>(&self, options: &'a [String]) -> &'a str {
        options
            .choose(&mut rand::rng())
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Always the first option. Makes replies reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstPhrasing;

impl Phrasing for FirstPhrasing {
    fn pick<'a>(&self, options: &'a [String]) -> &'a str {
        options.first().map(String::as_str).unwrap_or("")
    }
}
