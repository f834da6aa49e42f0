//! Storage connection strings and request signing.
//!
//! Supports the account-key form (`AccountName`/`AccountKey`), the SAS form
//! (`BlobEndpoint`/`SharedAccessSignature`) and `UseDevelopmentStorage=true`.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

const DEV_ACCOUNT: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// Errors surfaced while parsing a storage connection string.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionStringError {
    /// A `;`-separated segment had no `=`.
    #[error("connection string segment `{0}` is not a key=value pair")]
    MalformedSegment(String),
    /// Neither `BlobEndpoint` nor `AccountName` was provided.
    #[error("connection string needs BlobEndpoint or AccountName")]
    MissingEndpoint,
    /// `AccountKey` was present without `AccountName`.
    #[error("connection string has AccountKey but no AccountName")]
    MissingAccountName,
    /// `AccountKey` is not valid base64.
    #[error("account key is not valid base64: {0}")]
    InvalidAccountKey(#[from] base64::DecodeError),
    /// The blob endpoint could not be parsed as a URL.
    #[error("invalid blob endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

/// How requests to the blob service are authorized.
#[derive(Clone, PartialEq, Eq)]
pub enum StorageCredential {
    /// Shared Key signing with the decoded account key.
    SharedKey {
        /// Storage account name.
        account: String,
        /// Decoded account key bytes.
        key: Vec<u8>,
    },
    /// Shared access signature appended to every request URL (no leading `?`).
    Sas(String),
    /// Public container, no authorization.
    Anonymous,
}

impl std::fmt::Debug for StorageCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SharedKey { account, .. } => f
                .debug_struct("SharedKey")
                .field("account", account)
                .finish_non_exhaustive(),
            Self::Sas(_) => f.write_str("Sas(<redacted>)"),
            Self::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// Parsed storage connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConnection {
    /// Blob service endpoint, without a trailing slash in its path.
    pub blob_endpoint: Url,
    /// Request authorization.
    pub credential: StorageCredential,
}

impl FromStr for StorageConnection {
    type Err = ConnectionStringError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut pairs = HashMap::new();
        for segment in input.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| ConnectionStringError::MalformedSegment(segment.to_string()))?;
            pairs.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        if pairs
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Ok(Self {
                blob_endpoint: Url::parse(DEV_BLOB_ENDPOINT)?,
                credential: StorageCredential::SharedKey {
                    account: DEV_ACCOUNT.to_string(),
                    key: BASE64.decode(DEV_ACCOUNT_KEY)?,
                },
            });
        }

        let account = pairs.get("accountname").cloned();
        let blob_endpoint = match (pairs.get("blobendpoint"), &account) {
            (Some(endpoint), _) => Url::parse(endpoint.trim_end_matches('/'))?,
            (None, Some(account)) => {
                let protocol = pairs
                    .get("defaultendpointsprotocol")
                    .map(String::as_str)
                    .unwrap_or("https");
                let suffix = pairs
                    .get("endpointsuffix")
                    .map(String::as_str)
                    .unwrap_or("core.windows.net");
                Url::parse(&format!("{protocol}://{account}.blob.{suffix}"))?
            }
            (None, None) => return Err(ConnectionStringError::MissingEndpoint),
        };

        let credential = match (pairs.get("accountkey"), pairs.get("sharedaccesssignature")) {
            (Some(key), _) => StorageCredential::SharedKey {
                account: account.ok_or(ConnectionStringError::MissingAccountName)?,
                key: BASE64.decode(key)?,
            },
            (None, Some(sas)) => StorageCredential::Sas(sas.trim_start_matches('?').to_string()),
            (None, None) => StorageCredential::Anonymous,
        };

        Ok(Self {
            blob_endpoint,
            credential,
        })
    }
}

impl StorageConnection {
    /// URL of `container` (and optionally a blob inside it) under this endpoint.
    ///
    /// Blob names containing `/` keep their virtual directory segments.
    pub fn resource_url(&self, container: &str, blob: Option<&str>) -> Url {
        let mut url = self.blob_endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(container);
            if let Some(blob) = blob {
                segments.extend(blob.split('/'));
            }
        }
        url
    }

    /// Appends the SAS token to `url` when the credential is a SAS.
    pub fn apply_sas(&self, url: &mut Url) {
        if let StorageCredential::Sas(token) = &self.credential {
            let query = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{token}"),
                _ => token.clone(),
            };
            url.set_query(Some(&query));
        }
    }

    /// `Authorization` header value for a GET request, when Shared Key signing applies.
    ///
    /// `ms_headers` are the `x-ms-*` headers sent with the request.
    pub fn authorization(&self, url: &Url, ms_headers: &[(&str, &str)]) -> Option<String> {
        let StorageCredential::SharedKey { account, key } = &self.credential else {
            return None;
        };
        let string_to_sign = string_to_sign("GET", account, url, ms_headers);
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key).ok()?;
        mac.update(string_to_sign.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());
        Some(format!("SharedKey {account}:{signature}"))
    }
}

/// Shared Key string-to-sign for a request without a body.
///
/// The eleven standard header slots (Content-Encoding through Range) are left
/// empty; the date travels in `x-ms-date`.
pub fn string_to_sign(verb: &str, account: &str, url: &Url, ms_headers: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(256);
    out.push_str(verb);
    out.push('\n');
    for _ in 0..11 {
        out.push('\n');
    }

    let mut headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .filter(|(name, _)| name.starts_with("x-ms-"))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, value) in headers {
        out.push_str(&name);
        out.push(':');
        out.push_str(value);
        out.push('\n');
    }

    out.push('/');
    out.push_str(account);
    out.push_str(url.path());

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        params
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into_owned());
    }
    for (name, mut values) in params {
        values.sort();
        out.push('\n');
        out.push_str(&name);
        out.push(':');
        out.push_str(&values.join(","));
    }
    out
}
