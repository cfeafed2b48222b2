//! DigitalOcean Spaces client.
//!
//! Spaces speaks the S3 protocol, so uploads are plain HTTPS PUTs carrying
//! an AWS Signature Version 4 authorization header. Only the one operation
//! the publisher needs is implemented.

use std::fs;
use std::path::Path;

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::publish::ObjectStore;
use crate::types::BuildError;

/// Regional Spaces endpoint the artifacts bucket lives in.
pub const ENDPOINT: &str = "ams3.digitaloceanspaces.com";

const REGION: &str = "ams3";
const SERVICE: &str = "s3";

type HmacSha256 = Hmac<Sha256>;

/// Blocking Spaces client authenticated with an access key pair.
#[derive(Debug)]
pub struct SpacesClient {
    access_key: String,
    secret_key: String,
    client: reqwest::blocking::Client,
}

impl SpacesClient {
    /// Creates a client, rejecting missing or empty credentials up front so
    /// a run fails before any artifact work rather than at upload time.
    pub fn new(access_key: Option<String>, secret_key: Option<String>) -> Result<Self, BuildError> {
        let access_key = access_key
            .filter(|k| !k.is_empty())
            .ok_or(BuildError::MissingCredentials("spaces access key"))?;
        let secret_key = secret_key
            .filter(|k| !k.is_empty())
            .ok_or(BuildError::MissingCredentials("spaces secret key"))?;

        Ok(Self {
            access_key,
            secret_key,
            client: reqwest::blocking::Client::new(),
        })
    }
}

impl ObjectStore for SpacesClient {
    fn put(&self, bucket: &str, key: &str, file: &Path) -> Result<(), BuildError> {
        let body = fs::read(file)?;
        let payload_hash = hex::encode(Sha256::digest(&body));
        let now = OffsetDateTime::now_utc();
        let (amz_date, date) = amz_timestamps(now);

        let canonical_uri = format!("/{}/{}", uri_encode(bucket), uri_encode(key));
        let authorization = sign_put(
            &self.access_key,
            &self.secret_key,
            &canonical_uri,
            &payload_hash,
            &amz_date,
            &date,
        );

        let url = format!("https://{ENDPOINT}{canonical_uri}");
        let response = self
            .client
            .put(&url)
            .header("x-amz-date", &amz_date)
            .header("x-amz-content-sha256", &payload_hash)
            .header("authorization", authorization)
            .body(body)
            .send()
            .map_err(|e| BuildError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BuildError::Upload(format!(
                "PUT {url} returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// `YYYYMMDDTHHMMSSZ` plus the `YYYYMMDD` scope date for one instant.
fn amz_timestamps(now: OffsetDateTime) -> (String, String) {
    let date = format!(
        "{:04}{:02}{:02}",
        now.year(),
        now.month() as u8,
        now.day()
    );
    let amz_date = format!(
        "{date}T{:02}{:02}{:02}Z",
        now.hour(),
        now.minute(),
        now.second()
    );
    (amz_date, date)
}

/// Percent-encodes a key for the canonical URI, keeping `/` as the
/// path separator.
fn uri_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                encoded.push(byte as char);
            }
            other => {
                encoded.push_str(&format!("%{other:02X}"));
            }
        }
    }
    encoded
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sign_put(
    access_key: &str,
    secret_key: &str,
    canonical_uri: &str,
    payload_hash: &str,
    amz_date: &str,
    date: &str,
) -> String {
    let signed_headers = "host;x-amz-content-sha256;x-amz-date";
    let canonical_request = format!(
        "PUT\n{canonical_uri}\n\nhost:{ENDPOINT}\nx-amz-content-sha256:{payload_hash}\nx-amz-date:{amz_date}\n\n{signed_headers}\n{payload_hash}"
    );

    let scope = format!("{date}/{REGION}/{SERVICE}/aws4_request");
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let key = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
    let key = hmac_sha256(&key, REGION.as_bytes());
    let key = hmac_sha256(&key, SERVICE.as_bytes());
    let key = hmac_sha256(&key, b"aws4_request");
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

    format!(
        "AWS4-HMAC-SHA256 Credential={access_key}/{scope}, SignedHeaders={signed_headers}, Signature={signature}"
    )
}
