//! Password utilities

use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of generated passwords
pub const GENERATED_LENGTH: usize = 24;

/// Generate a random alphanumeric password.
pub fn generate() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_LENGTH)
        .map(char::from)
        .collect()
}
