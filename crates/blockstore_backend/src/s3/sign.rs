//! Request signing for the S3 REST interface.
//!
//! Requests are authenticated with a keyed hash over a canonical string:
//!
//! ```text
//! METHOD \n Content-MD5 \n Content-Type \n Date \n /bucket/key
//! ```
//!
//! The signature is `base64(HMAC-SHA1(secret_key, string_to_sign))` and is
//! sent as `Authorization: AWS <key_id>:<signature>`. The `Date` header must
//! carry exactly the date that was signed.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::io;
use std::time::SystemTime;

type HmacSha1 = Hmac<Sha1>;

/// Formats `time` as an RFC 7231 IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`).
#[must_use]
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Parses an HTTP date header value.
#[must_use]
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|date| SystemTime::from(date.with_timezone(&Utc)))
}

/// Returns the canonical resource for an object: `/bucket/key`.
#[must_use]
pub fn canonical_resource(bucket: &str, key: &str) -> String {
    format!("/{bucket}/{key}")
}

/// Builds the string that is signed for one request.
#[must_use]
pub fn string_to_sign(
    method: &str,
    content_md5: &str,
    content_type: &str,
    date: &str,
    resource: &str,
) -> String {
    format!("{method}\n{content_md5}\n{content_type}\n{date}\n{resource}")
}

/// Signs `string_to_sign` with the secret key.
pub fn sign(secret_key: &str, string_to_sign: &str) -> io::Result<String> {
    let mut mac = HmacSha1::new_from_slice(secret_key.as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Renders the `Authorization` header value.
#[must_use]
pub fn authorization(key_id: &str, signature: &str) -> String {
    format!("AWS {key_id}:{signature}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn http_date_format() {
        // 784111777 = Sun, 06 Nov 1994 08:49:37 GMT (RFC 7231 example)
        let time = UNIX_EPOCH + Duration::from_secs(784_111_777);
        assert_eq!(http_date(time), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn http_date_parses_back() {
        let time = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(parse_http_date(&http_date(time)), Some(time));
        assert_eq!(parse_http_date("not a date"), None);
    }

    #[test]
    fn canonical_string_layout() {
        let resource = canonical_resource("bucket", "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        let s = string_to_sign("GET", "", "", "Sun, 06 Nov 1994 08:49:37 GMT", &resource);
        assert_eq!(
            s,
            "GET\n\n\nSun, 06 Nov 1994 08:49:37 GMT\n/bucket/da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }

    #[test]
    fn signature_is_hmac_of_canonical_string() {
        let s = string_to_sign("PUT", "", "application/octet-stream", "date", "/b/k");
        let signature = sign("secret", &s).unwrap();

        let mut mac = HmacSha1::new_from_slice(b"secret").unwrap();
        mac.update(s.as_bytes());
        mac.verify_slice(&STANDARD.decode(&signature).unwrap())
            .unwrap();
        assert_eq!(signature.len(), 28);
    }

    #[test]
    fn signature_depends_on_every_input() {
        let sig = |key: &str, s: String| sign(key, &s).unwrap();
        let base = sig("secret", string_to_sign("GET", "", "", "d1", "/b/k"));
        assert_ne!(base, sig("other", string_to_sign("GET", "", "", "d1", "/b/k")));
        assert_ne!(base, sig("secret", string_to_sign("PUT", "", "", "d1", "/b/k")));
        assert_ne!(base, sig("secret", string_to_sign("GET", "", "", "d2", "/b/k")));
        assert_ne!(base, sig("secret", string_to_sign("GET", "", "", "d1", "/b/j")));
    }

    #[test]
    fn empty_secret_still_signs() {
        let signature = sign("", &string_to_sign("GET", "", "", "d1", "/b/k")).unwrap();
        assert_eq!(signature.len(), 28);
    }

    #[test]
    fn authorization_header() {
        assert_eq!(authorization("AKID", "c2ln"), "AWS AKID:c2ln");
    }
}
