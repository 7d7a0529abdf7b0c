use rand::{thread_rng, Rng};

use crate::error::{AppError, Result};

use super::group_store::GroupStore;

const CODE_LENGTH: usize = 8;
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Retry ceiling for the uniqueness loop. Over a 36^8 code space a
/// collision is already vanishingly rare, so hitting the cap means
/// something is wrong with the store rather than with our luck.
const MAX_ATTEMPTS: usize = 10;

/// Generate a random 8-character invite code.
pub fn generate_invite_code() -> String {
    let mut rng = thread_rng();
    (0..CODE_LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Generate an invite code that no existing group is using. Uniqueness
/// is only checked here, at creation time; codes freed by a deleted
/// group may be handed out again.
pub async fn generate_unique_invite_code(store: &dyn GroupStore) -> Result<String> {
    for _ in 0..MAX_ATTEMPTS {
        let code = generate_invite_code();
        if store.find_by_invite_code(&code).await?.is_none() {
            return Ok(code);
        }
    }

    Err(AppError::Internal(format!(
        "Failed to generate a unique invite code after {MAX_ATTEMPTS} attempts"
    )))
}
