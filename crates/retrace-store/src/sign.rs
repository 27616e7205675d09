// SPDX-FileCopyrightText: 2026 Retrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AWS Signature Version 4 for S3-compatible endpoints.
//!
//! Header signing for the service's own requests and query presigning for
//! externally shared links. Scope is always `s3`; the payload hash is the
//! caller's (uploads hash the body, presigned GETs use UNSIGNED-PAYLOAD).

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Headers to attach to a signed request.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub authorization: String,
    pub amz_date: String,
    pub content_sha256: String,
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Percent-encode per the SigV4 canonicalization rules. Path encoding
/// keeps `/` intact; query encoding does not.
fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char);
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (uri_encode(k, true), uri_encode(v, true)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn signing_key(secret: &str, date: &str, region: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, b"s3");
    hmac(&k_service, b"aws4_request")
}

fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
    format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    )
}

/// Sign a request with the `host`, `x-amz-content-sha256` and `x-amz-date`
/// headers.
pub fn sign_request(
    method: &str,
    host: &str,
    path: &str,
    query: &[(String, String)],
    payload_hash: &str,
    region: &str,
    credentials: &Credentials,
    now: DateTime<Utc>,
) -> SignedRequest {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let scope = format!("{date}/{region}/s3/aws4_request");

    let canonical_headers = format!(
        "host:{host}\nx-amz-content-sha256:{payload_hash}\nx-amz-date:{amz_date}\n"
    );
    let signed_headers = "host;x-amz-content-sha256;x-amz-date";

    let canonical_request = format!(
        "{method}\n{}\n{}\n{canonical_headers}\n{signed_headers}\n{payload_hash}",
        uri_encode(path, false),
        canonical_query(query),
    );

    let key = signing_key(&credentials.secret_access_key, &date, region);
    let signature = hex::encode(hmac(
        &key,
        string_to_sign(&amz_date, &scope, &canonical_request).as_bytes(),
    ));

    SignedRequest {
        authorization: format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            credentials.access_key_id
        ),
        amz_date,
        content_sha256: payload_hash.to_string(),
    }
}

/// Build a presigned GET URL valid for `expires_secs`.
pub fn presign_get(
    base_url: &str,
    host: &str,
    path: &str,
    region: &str,
    credentials: &Credentials,
    expires_secs: u64,
    now: DateTime<Utc>,
) -> String {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let scope = format!("{date}/{region}/s3/aws4_request");

    let query: Vec<(String, String)> = vec![
        ("X-Amz-Algorithm".into(), "AWS4-HMAC-SHA256".into()),
        (
            "X-Amz-Credential".into(),
            format!("{}/{scope}", credentials.access_key_id),
        ),
        ("X-Amz-Date".into(), amz_date.clone()),
        ("X-Amz-Expires".into(), expires_secs.to_string()),
        ("X-Amz-SignedHeaders".into(), "host".into()),
    ];

    let canonical_request = format!(
        "GET\n{}\n{}\nhost:{host}\n\nhost\n{UNSIGNED_PAYLOAD}",
        uri_encode(path, false),
        canonical_query(&query),
    );

    let key = signing_key(&credentials.secret_access_key, &date, region);
    let signature = hex::encode(hmac(
        &key,
        string_to_sign(&amz_date, &scope, &canonical_request).as_bytes(),
    ));

    format!(
        "{base_url}{path}?{}&X-Amz-Signature={signature}",
        canonical_query(&query)
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn creds() -> Credentials {
        Credentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
        }
    }

    #[test]
    fn uri_encoding_follows_sigv4_rules() {
        assert_eq!(uri_encode("a b/c~d", false), "a%20b/c~d");
        assert_eq!(uri_encode("a b/c~d", true), "a%20b%2Fc~d");
        assert_eq!(uri_encode("screen name+1", true), "screen%20name%2B1");
    }

    #[test]
    fn query_canonicalization_sorts_pairs() {
        let q = vec![
            ("prefix".to_string(), "tenant/t1/".to_string()),
            ("list-type".to_string(), "2".to_string()),
        ];
        assert_eq!(canonical_query(&q), "list-type=2&prefix=tenant%2Ft1%2F");
    }

    #[test]
    fn signature_is_deterministic_for_fixed_inputs() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let a = sign_request(
            "GET",
            "bucket.example.com",
            "/retrace/key.json",
            &[],
            UNSIGNED_PAYLOAD,
            "us-east-1",
            &creds(),
            now,
        );
        let b = sign_request(
            "GET",
            "bucket.example.com",
            "/retrace/key.json",
            &[],
            UNSIGNED_PAYLOAD,
            "us-east-1",
            &creds(),
            now,
        );
        assert_eq!(a.authorization, b.authorization);
        assert_eq!(a.amz_date, "20260101T000000Z");
        assert!(a.authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20260101/"));
        assert!(a.authorization.contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date"));
    }

    #[test]
    fn payload_changes_change_the_signature() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let a = sign_request(
            "PUT", "h", "/k", &[], &sha256_hex(b"one"), "us-east-1", &creds(), now,
        );
        let b = sign_request(
            "PUT", "h", "/k", &[], &sha256_hex(b"two"), "us-east-1", &creds(), now,
        );
        assert_ne!(a.authorization, b.authorization);
    }

    #[test]
    fn presigned_url_carries_required_params() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let url = presign_get(
            "https://cdn.example.com",
            "cdn.example.com",
            "/retrace/tenant/t1/file.jpg",
            "us-east-1",
            &creds(),
            3600,
            now,
        );
        assert!(url.starts_with("https://cdn.example.com/retrace/tenant/t1/file.jpg?"));
        assert!(url.contains("X-Amz-Algorithm=AWS4-HMAC-SHA256"));
        assert!(url.contains("X-Amz-Expires=3600"));
        assert!(url.contains("X-Amz-Signature="));
    }
}
