//! Short user ID generation.

use rand::Rng;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of generated user IDs.
pub const USER_ID_LEN: usize = 4;

/// Generate a random user ID drawn from `[A-Z0-9]`.
///
/// Collisions are possible and are not checked; callers treat the result
/// as a suggestion.
pub fn generate_user_id() -> String {
    let mut rng = rand::rng();
    (0..USER_ID_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
