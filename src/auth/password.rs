use bcrypt::BcryptError;

use crate::error::AppResult;

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn hash_password(password: &str, cost: u32) -> Result<String, BcryptError> {
    bcrypt::hash(password, cost)
}

/// Compare a submitted password with a stored bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, BcryptError> {
    bcrypt::verify(password, hash)
}

/// `hash_password` on the blocking pool, so the cost factor never stalls a
/// runtime worker.
pub async fn hash_off_runtime(password: &str, cost: u32) -> AppResult<String> {
    let password = password.to_owned();
    Ok(tokio::task::spawn_blocking(move || hash_password(&password, cost)).await??)
}

pub async fn verify_off_runtime(password: &str, hash: &str) -> AppResult<bool> {
    let (password, hash) = (password.to_owned(), hash.to_owned());
    Ok(tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await??)
}
