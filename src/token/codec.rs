//! Compact token encoding: `base64url(header).base64url(claims).base64url(mac)`,
//! where `mac` is HMAC-SHA256 over the first two segments joined by `.`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::claims::Claims;
use super::key::SigningKey;
use crate::error::{SigningError, VerifyError};

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "HS256";

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

fn mac_for(key: &SigningKey, signing_input: &[u8]) -> Result<HmacSha256, InvalidLength> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes())?;
    mac.update(signing_input);
    Ok(mac)
}

/// Serialize and sign `claims`.
pub fn encode(claims: &Claims, key: &SigningKey) -> Result<String, SigningError> {
    let header = Header {
        alg: ALGORITHM.to_string(),
        typ: "JWT".to_string(),
    };
    let h = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
    let p = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);

    let signing_input = format!("{}.{}", h, p);
    let sig = mac_for(key, signing_input.as_bytes())
        .map_err(|_| SigningError::KeyRejected)?
        .finalize()
        .into_bytes();
    let s = URL_SAFE_NO_PAD.encode(sig);

    Ok(format!("{}.{}", signing_input, s))
}

/// Check the structure and MAC of `token` and return its claims.
///
/// Every structural defect and every MAC mismatch is `BadSignature`. Claims
/// are only deserialized after the MAC has been verified.
pub fn decode(token: &str, key: &SigningKey) -> Result<Claims, VerifyError> {
    let mut parts = token.trim().split('.');
    let (h, p, s) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) if !h.is_empty() && !p.is_empty() && !s.is_empty() => {
            (h, p, s)
        }
        _ => return Err(VerifyError::BadSignature),
    };

    let header_bytes = URL_SAFE_NO_PAD
        .decode(h)
        .map_err(|_| VerifyError::BadSignature)?;
    let header: Header =
        serde_json::from_slice(&header_bytes).map_err(|_| VerifyError::BadSignature)?;
    if header.alg != ALGORITHM {
        return Err(VerifyError::BadSignature);
    }

    let signature = URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|_| VerifyError::BadSignature)?;

    // The signing input is the exact presented text of the first two segments.
    let signing_input_len = h.len() + 1 + p.len();
    let signing_input = &token.trim()[..signing_input_len];

    // verify_slice compares in constant time.
    mac_for(key, signing_input.as_bytes())
        .map_err(|_| VerifyError::BadSignature)?
        .verify_slice(&signature)
        .map_err(|_| VerifyError::BadSignature)?;

    let claim_bytes = URL_SAFE_NO_PAD
        .decode(p)
        .map_err(|_| VerifyError::BadSignature)?;
    serde_json::from_slice(&claim_bytes).map_err(|_| VerifyError::BadSignature)
}
