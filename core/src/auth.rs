use crate::decoder::ReceivedFrame;
use crate::error::LinkError;
use std::fmt;

/// Credential expected when none is configured
pub const DEFAULT_CREDENTIAL: &str = "x4ef";

/// Result of checking one received frame against the credential
#[derive(Debug)]
pub enum AuthOutcome {
    Authenticated,
    /// A well-formed message that did not match
    Rejected(String),
    /// The frame could not be decoded into text
    Malformed(LinkError),
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated)
    }
}

impl fmt::Display for AuthOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthOutcome::Authenticated => write!(f, "[AUTHENTICATED]"),
            AuthOutcome::Rejected(text) => write!(f, "[FAIL] Received password: {}", text),
            AuthOutcome::Malformed(e) => write!(f, "[ERROR] Decoding error: {}", e),
        }
    }
}

/// Compares decoded messages with an expected credential string
#[derive(Debug, Clone)]
pub struct Authenticator {
    credential: String,
}

impl Authenticator {
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
        }
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn check(&self, frame: &ReceivedFrame) -> AuthOutcome {
        match frame.message() {
            Ok(message) if message == self.credential => AuthOutcome::Authenticated,
            Ok(message) => AuthOutcome::Rejected(message),
            Err(e) => AuthOutcome::Malformed(e),
        }
    }
}

impl Default for Authenticator {
    fn default() -> Self {
        Self::new(DEFAULT_CREDENTIAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::bytes_to_bitstring;

    #[test]
    fn test_authenticated() {
        let auth = Authenticator::default();
        let frame = ReceivedFrame::Bits(bytes_to_bitstring("x4ef"));
        let outcome = auth.check(&frame);
        assert!(outcome.is_authenticated());
        assert_eq!(outcome.to_string(), "[AUTHENTICATED]");
    }

    #[test]
    fn test_rejected() {
        let auth = Authenticator::default();
        let outcome = auth.check(&ReceivedFrame::Text("x4eg".into()));
        assert_eq!(outcome.to_string(), "[FAIL] Received password: x4eg");
    }

    #[test]
    fn test_malformed() {
        let auth = Authenticator::new("secret");
        let outcome = auth.check(&ReceivedFrame::Bits("0101".into()));
        assert!(matches!(outcome, AuthOutcome::Malformed(LinkError::MalformedLength(4))));
        assert!(outcome.to_string().starts_with("[ERROR] Decoding error:"));
    }
}
