use crate::application_port::AuthError;
use hmac::{Hmac, KeyInit, Mac};
use nanoid::nanoid;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Double-submit CSRF tokens of the form `<nonce>.<hex hmac(nonce)>`.
///
/// The same value travels in a script-readable cookie and in the
/// `X-CSRF-Token` header; both must carry a valid signature over the same
/// nonce.
pub struct CsrfSigner {
    key: Vec<u8>,
}

impl CsrfSigner {
    pub fn new(key: Vec<u8>) -> Self {
        Self { key }
    }

    fn mac(&self, nonce: &str) -> Result<HmacSha256, AuthError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        mac.update(nonce.as_bytes());
        Ok(mac)
    }

    pub fn issue(&self) -> Result<String, AuthError> {
        let nonce = nanoid!(32);
        let tag = self.mac(&nonce)?.finalize().into_bytes();
        Ok(format!("{}.{}", nonce, hex::encode(tag)))
    }

    fn split(token: &str) -> Option<(&str, Vec<u8>)> {
        let (nonce, tag) = token.split_once('.')?;
        if nonce.is_empty() {
            return None;
        }
        Some((nonce, hex::decode(tag).ok()?))
    }

    fn tag_matches(&self, nonce: &str, tag: &[u8]) -> bool {
        self.mac(nonce)
            .map(|mac| mac.verify_slice(tag).is_ok())
            .unwrap_or(false)
    }

    pub fn verify(&self, token: &str) -> bool {
        match Self::split(token) {
            Some((nonce, tag)) => self.tag_matches(nonce, &tag),
            None => false,
        }
    }

    /// Tags are compared through `verify_slice`, which runs in constant time.
    pub fn check_double_submit(&self, cookie: Option<&str>, header: Option<&str>) -> bool {
        let (Some(cookie), Some(header)) = (cookie, header) else {
            return false;
        };
        let (Some((cookie_nonce, cookie_tag)), Some((header_nonce, header_tag))) =
            (Self::split(cookie), Self::split(header))
        else {
            return false;
        };

        cookie_nonce == header_nonce
            && self.tag_matches(header_nonce, &header_tag)
            && self.tag_matches(header_nonce, &cookie_tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> CsrfSigner {
        CsrfSigner::new(b"csrf-test-key".to_vec())
    }

    #[test]
    fn issued_tokens_verify_and_differ() {
        let signer = signer();
        let a = signer.issue().unwrap();
        let b = signer.issue().unwrap();
        assert_ne!(a, b);
        assert!(signer.verify(&a));
        assert!(signer.verify(&b));
    }

    #[test]
    fn tokens_from_another_key_or_tampered_fail() {
        let token = signer().issue().unwrap();
        assert!(!CsrfSigner::new(b"other".to_vec()).verify(&token));

        let (nonce, tag) = token.split_once('.').unwrap();
        let forged = format!("{}x.{}", nonce, tag);
        assert!(!signer().verify(&forged));
        assert!(!signer().verify("no-dot"));
        assert!(!signer().verify(".abcd"));
        assert!(!signer().verify("nonce.not-hex"));
    }

    #[test]
    fn double_submit_requires_both_halves_to_match() {
        let signer = signer();
        let token = signer.issue().unwrap();
        let other = signer.issue().unwrap();

        assert!(signer.check_double_submit(Some(&token), Some(&token)));
        assert!(!signer.check_double_submit(Some(&token), Some(&other)));
        assert!(!signer.check_double_submit(Some(&token), None));
        assert!(!signer.check_double_submit(None, Some(&token)));
    }
}
