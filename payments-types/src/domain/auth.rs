//! Canonical wallet challenge.

/// Fixed template the payer signs, followed by the nonce.
pub const CHALLENGE_PREFIX: &str = "Sign this message to authenticate: ";

/// Builds the exact message a payer must sign for `nonce`.
pub fn challenge_message(nonce: &str) -> String {
    format!("{CHALLENGE_PREFIX}{nonce}")
}
