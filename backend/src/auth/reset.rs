use rand::RngCore;
use sha2::{Digest, Sha256};

/// A freshly issued password-reset token. Only `digest` is persisted;
/// `token` goes to the user.
#[derive(Debug)]
pub struct ResetToken {
    pub token: String,
    pub digest: String,
}

pub fn generate_reset_token() -> ResetToken {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);
    let digest = digest_reset_token(&token);
    ResetToken { token, digest }
}

pub fn digest_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.trim().as_bytes()))
}
