use serde::Deserialize;

#[derive(Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires: Option<u64>,
}
