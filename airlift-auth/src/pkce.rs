use base64::prelude::{Engine, BASE64_URL_SAFE_NO_PAD};
use oauth2::{PkceCodeChallenge, PkceCodeVerifier};
use rand::Rng;

/// Verifier entropy in raw bytes, before base64url encoding.
const VERIFIER_BYTES: usize = 96;

/// One PKCE exchange: the verifier stays local, the S256 challenge goes on
/// the authorization URL.
pub struct PkcePair {
    pub verifier: PkceCodeVerifier,
    pub challenge: PkceCodeChallenge,
}

impl PkcePair {
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let random_bytes: Vec<u8> = (0..VERIFIER_BYTES).map(|_| rng.random()).collect();
        let verifier = PkceCodeVerifier::new(BASE64_URL_SAFE_NO_PAD.encode(&random_bytes));
        let challenge = PkceCodeChallenge::from_code_verifier_sha256(&verifier);
        Self { verifier, challenge }
    }
}

/// Random `state` nonce tying the callback back to this authorization attempt.
pub fn state_nonce() -> String {
    let mut rng = rand::rng();
    let random_bytes: Vec<u8> = (0..32).map(|_| rng.random()).collect();
    BASE64_URL_SAFE_NO_PAD.encode(&random_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_is_s256_of_verifier() {
        // RFC 7636 appendix B vector.
        let verifier = PkceCodeVerifier::new("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string());
        let challenge = PkceCodeChallenge::from_code_verifier_sha256(&verifier);
        assert_eq!(challenge.as_str(), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
        assert_eq!(
            serde_json::to_value(challenge.method()).unwrap(),
            serde_json::json!("S256")
        );
    }

    #[test]
    fn verifier_is_urlsafe_and_long_enough() {
        let pair = PkcePair::generate();
        let secret = pair.verifier.secret();
        // 96 bytes encode to 128 base64url characters.
        assert_eq!(secret.len(), 128);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn nonces_do_not_repeat() {
        assert_ne!(state_nonce(), state_nonce());
    }
}
