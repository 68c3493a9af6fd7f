//! Webhook body signatures.
//!
//! When a webhook has a secret configured, every delivery carries
//!
//! ```text
//! X-Meshhub-Signature: {unix_timestamp}.{base64_signature}
//! ```
//!
//! where the signature is `HMAC-SHA256("{timestamp}.{json_body}", secret)`.
//! Receivers verify it with [`verify_body`].

/// Header name for the HMAC signature.
pub const SIGNATURE_HEADER: &str = "X-Meshhub-Signature";

/// Maximum allowed age of a signature (in seconds).
pub const MAX_SIGNATURE_AGE: i64 = 5 * 60;

/// Errors produced by signature operations.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid header format")]
    InvalidFormat,
    #[error("invalid base64 encoding")]
    InvalidBase64,
    #[error("invalid signature")]
    SignatureMismatch,
    #[error("signature expired")]
    Expired,
}

impl From<ring::error::Unspecified> for SignatureError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

/// Sign `body` with `key` at the current time and return the header value.
pub fn sign_body(body: &str, key: &[u8]) -> String {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    sign_body_at(body, key, now)
}

/// Sign `body` with `key` at an explicit timestamp.
pub fn sign_body_at(body: &str, key: &[u8], timestamp: i64) -> String {
    let data = format!("{timestamp}.{body}");
    let signature = ring::hmac::sign(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
        data.as_bytes(),
    );
    format_signature_header(timestamp, signature.as_ref())
}

/// Verify a signature header against the raw request body.
pub fn verify_body(header_value: &str, body: &str, key: &[u8]) -> Result<(), SignatureError> {
    let (timestamp, signature) = parse_signature_header(header_value)?;
    let data = format!("{timestamp}.{body}");
    ring::hmac::verify(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
        data.as_bytes(),
        &signature,
    )?;
    check_timestamp(timestamp)
}

/// Parse a `{timestamp}.{base64}` header value into its parts.
pub fn parse_signature_header(value: &str) -> Result<(i64, Box<[u8]>), SignatureError> {
    let (timestamp, encoded) = value.split_once('.').ok_or(SignatureError::InvalidFormat)?;
    let timestamp: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::InvalidFormat)?;
    let signature = fast32::base64::RFC4648_NOPAD
        .decode_str(encoded)
        .map_err(|_| SignatureError::InvalidBase64)?
        .into_boxed_slice();
    Ok((timestamp, signature))
}

/// Format a `{timestamp}.{base64}` header value from its parts.
pub fn format_signature_header(timestamp: i64, signature: &[u8]) -> String {
    format!(
        "{}.{}",
        timestamp,
        fast32::base64::RFC4648_NOPAD.encode(signature)
    )
}

/// Check that a signature timestamp is within [`MAX_SIGNATURE_AGE`].
pub fn check_timestamp(timestamp: i64) -> Result<(), SignatureError> {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    if now - timestamp > MAX_SIGNATURE_AGE {
        return Err(SignatureError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let body = r#"{"event_type":"advertisement","public_key":null,"payload":{}}"#;
        let header = sign_body(body, b"secret");
        assert!(verify_body(&header, body, b"secret").is_ok());
        assert!(matches!(
            verify_body(&header, body, b"other"),
            Err(SignatureError::SignatureMismatch)
        ));
        assert!(matches!(
            verify_body(&header, "{}", b"secret"),
            Err(SignatureError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_expired_signature() {
        let old = time::OffsetDateTime::now_utc().unix_timestamp() - MAX_SIGNATURE_AGE - 10;
        let header = sign_body_at("{}", b"k", old);
        assert!(matches!(
            verify_body(&header, "{}", b"k"),
            Err(SignatureError::Expired)
        ));
    }

    #[test]
    fn test_malformed_header() {
        assert!(matches!(
            parse_signature_header("no-dot"),
            Err(SignatureError::InvalidFormat)
        ));
        assert!(matches!(
            parse_signature_header("abc.AAAA"),
            Err(SignatureError::InvalidFormat)
        ));
        assert!(matches!(
            parse_signature_header("123.!!!"),
            Err(SignatureError::InvalidBase64)
        ));
    }
}
