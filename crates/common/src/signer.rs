//! Huawei Cloud AK/SK request signing (`SDK-HMAC-SHA256`)
//!
//! Every ECS API call carries an `X-Sdk-Date` header and an `Authorization` header holding
//! an HMAC-SHA256 over the canonical form of the request.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::error::{Result, RunnerError};

type HmacSha256 = Hmac<Sha256>;

pub const SIGN_ALGORITHM: &str = "SDK-HMAC-SHA256";
pub const DATE_HEADER: &str = "X-Sdk-Date";
const DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Access key / secret key pair
#[derive(Clone)]
pub struct Signer {
    access_key: String,
    secret_key: String,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl Signer {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Sign a request and return the headers to attach (`X-Sdk-Date`, `Authorization`).
    ///
    /// `headers` are the extra headers that will be sent and signed; `host` is derived from
    /// the URL.
    pub fn sign(
        &self,
        method: &str,
        url: &Url,
        headers: &[(&str, &str)],
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>> {
        let date = now.format(DATE_FORMAT).to_string();

        let mut signed: Vec<(String, String)> = headers
            .iter()
            .map(|(name, value)| (name.to_lowercase(), value.trim().to_string()))
            .collect();
        signed.push(("host".to_string(), host_header(url)));
        signed.push((DATE_HEADER.to_lowercase(), date.clone()));
        signed.sort();

        let (canonical, signed_names) = canonical_request(method, url, &signed, body);
        let string_to_sign = format!(
            "{}\n{}\n{}",
            SIGN_ALGORITHM,
            date,
            hex::encode(Sha256::digest(canonical.as_bytes()))
        );

        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| RunnerError::Configuration(format!("invalid secret key: {}", e)))?;
        mac.update(string_to_sign.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        let authorization = format!(
            "{} Access={}, SignedHeaders={}, Signature={}",
            SIGN_ALGORITHM, self.access_key, signed_names, signature
        );

        Ok(vec![
            (DATE_HEADER.to_string(), date),
            ("Authorization".to_string(), authorization),
        ])
    }
}

/// Host header value as reqwest sends it (port only when non-default)
fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Build the canonical request. `headers` must be lowercased and sorted.
fn canonical_request(
    method: &str,
    url: &Url,
    headers: &[(String, String)],
    body: &[u8],
) -> (String, String) {
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();
    let signed_names = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method.to_uppercase(),
        canonical_uri(url),
        canonical_query(url),
        canonical_headers,
        signed_names,
        hex::encode(Sha256::digest(body))
    );

    (canonical, signed_names)
}

fn canonical_uri(url: &Url) -> String {
    let mut uri = url
        .path()
        .split('/')
        .map(|segment| {
            let decoded = urlencoding::decode(segment)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| segment.to_string());
            urlencoding::encode(&decoded).into_owned()
        })
        .collect::<Vec<_>>()
        .join("/");

    if !uri.ends_with('/') {
        uri.push('/');
    }
    uri
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            (
                urlencoding::encode(&k).into_owned(),
                urlencoding::encode(&v).into_owned(),
            )
        })
        .collect();
    pairs.sort();

    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}
