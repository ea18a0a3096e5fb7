//! Attachment storage in an S3 bucket.
//!
//! Nothing here talks to S3 directly: the client uploads straight to the bucket through a
//! pre-signed URL and later reads the object back from its bucket URL.
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use log::*;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

pub trait ObjectStore: Send + Sync {
    /**
     * Short-lived, write-only URL the attachment can be PUT to
     */
    fn upload_url(&self, attachment_id: &str) -> String;

    /**
     * URL the stored attachment can be read back from
     */
    fn retrieval_url(&self, attachment_id: &str) -> String;
}

/**
 * Static credentials used for signing
 */
#[derive(Clone, Debug)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/**
 * Issues AWS Signature Version 4 pre-signed URLs for objects in a single bucket
 */
#[derive(Clone, Debug)]
pub struct S3Presigner {
    host: String,
    region: String,
    credentials: Credentials,
    expires_in: u64,
}

impl S3Presigner {
    pub fn new(bucket: &str, region: &str, credentials: Credentials, expires_in: u64) -> Self {
        Self {
            host: format!("{}.s3.{}.amazonaws.com", bucket, region),
            region: region.to_string(),
            credentials,
            expires_in,
        }
    }

    /**
     * Override the virtual-hosted bucket endpoint, e.g. for the legacy global endpoint
     */
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    /**
     * Sign `method` on the object `key`, valid for `expires_in` seconds from `now`
     */
    pub fn presign(&self, method: &str, key: &str, expires_in: u64, now: DateTime<Utc>) -> String {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/{}/aws4_request", date, self.region, SERVICE);
        let uri = format!("/{}", uri_encode(key, false));

        let mut params = vec![
            ("X-Amz-Algorithm", ALGORITHM.to_string()),
            (
                "X-Amz-Credential",
                format!("{}/{}", self.credentials.access_key_id, scope),
            ),
            ("X-Amz-Date", amz_date.clone()),
            ("X-Amz-Expires", expires_in.to_string()),
            ("X-Amz-SignedHeaders", "host".to_string()),
        ];
        if let Some(token) = &self.credentials.session_token {
            params.push(("X-Amz-Security-Token", token.clone()));
        }
        params.sort_by(|a, b| a.0.cmp(b.0));

        let query = params
            .iter()
            .map(|(name, value)| format!("{}={}", uri_encode(name, true), uri_encode(value, true)))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_request = format!(
            "{}\n{}\n{}\nhost:{}\n\nhost\n{}",
            method, uri, query, self.host, UNSIGNED_PAYLOAD
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = self.signing_key(&date);
        let signature = hex::encode(hmac(&signing_key, string_to_sign.as_bytes()));

        format!(
            "https://{}{}?{}&X-Amz-Signature={}",
            self.host, uri, query, signature
        )
    }

    fn signing_key(&self, date: &str) -> Vec<u8> {
        let secret = format!("AWS4{}", self.credentials.secret_access_key);
        let k_date = hmac(secret.as_bytes(), date.as_bytes());
        let k_region = hmac(&k_date, self.region.as_bytes());
        let k_service = hmac(&k_region, SERVICE.as_bytes());
        hmac(&k_service, b"aws4_request")
    }
}

impl ObjectStore for S3Presigner {
    fn upload_url(&self, attachment_id: &str) -> String {
        debug!("Signing upload URL for attachment {}", attachment_id);
        self.presign("PUT", attachment_id, self.expires_in, Utc::now())
    }

    fn retrieval_url(&self, attachment_id: &str) -> String {
        format!("https://{}/{}", self.host, uri_encode(attachment_id, false))
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/** RFC 3986 unreserved characters stay as they are, everything else is percent-encoded */
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/** Object keys additionally keep their `/` separators */
const OBJECT_KEY: &AsciiSet = &UNRESERVED.remove(b'/');

fn uri_encode(input: &str, encode_slash: bool) -> String {
    let set = if encode_slash { UNRESERVED } else { OBJECT_KEY };
    utf8_percent_encode(input, set).to_string()
}

/**
 * Object store handing out predictable URLs, for tests
 */
#[cfg(test)]
pub struct StaticObjectStore;

#[cfg(test)]
impl ObjectStore for StaticObjectStore {
    fn upload_url(&self, attachment_id: &str) -> String {
        format!("https://uploads.test/{}?signed", attachment_id)
    }

    fn retrieval_url(&self, attachment_id: &str) -> String {
        format!("https://attachments.test/{}", attachment_id)
    }
}
