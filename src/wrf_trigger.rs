/// WRF NetCDF download trigger
///
/// Locates the WRF output for a run date in a Cloud Storage bucket and
/// downloads it to the local WRF data directory, using the Cloud Storage
/// JSON API.
///
/// API Documentation: https://cloud.google.com/storage/docs/json_api/v1/objects

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::logging::{self, Source};
use crate::model::PipelineError;

const GCS_BASE_URL: &str = "https://storage.googleapis.com/storage/v1";

// ============================================================================
// Cloud Storage API Response Structures
// ============================================================================

/// One page of an object listing
#[derive(Debug, Deserialize)]
pub struct ObjectList {
    #[serde(default)]
    pub items: Vec<StorageObject>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// Object metadata; sizes arrive as decimal strings
#[derive(Debug, Clone, Deserialize)]
pub struct StorageObject {
    pub name: String,
    pub size: Option<String>,
}

/// Parse one page of an object listing
pub fn parse_object_list(body: &str) -> Result<ObjectList, PipelineError> {
    serde_json::from_str(body)
        .map_err(|e| PipelineError::Storage(format!("Parse error: {}", e)))
}

// ============================================================================
// Run naming
// ============================================================================

/// What to download and where.
#[derive(Debug, Clone, PartialEq)]
pub struct WrfRequest {
    pub run_date: NaiveDate,
    pub run_time: NaiveTime,
    /// Days of forecast past the run the downstream extraction covers.
    pub forward_days: u32,
    /// Days of history before the run the downstream extraction covers.
    pub backward_days: u32,
}

impl WrfRequest {
    /// WRF output is labelled with the day before the run date.
    pub fn net_cdf_date(&self) -> NaiveDate {
        self.run_date - Duration::hours(24)
    }

    /// Run start in the `YYYY-MM-DD_HH:00` form the extractor expects.
    pub fn start_ts(&self) -> String {
        format!("{}_{}", self.run_date.format("%Y-%m-%d"), self.run_time.format("%H:00"))
    }

    /// Local directory the NetCDF lands in: `<wrf_data_dir><date>_<time>`.
    pub fn download_location(&self, wrf_data_dir: &str) -> PathBuf {
        PathBuf::from(format!(
            "{}{}_{}",
            wrf_data_dir,
            self.run_date.format("%Y-%m-%d"),
            self.run_time.format("%H:%M:%S")
        ))
    }
}

/// Expands a `<head>-<tail>` template to `<head>_<date>_<tail>`.
///
/// Only the first two `-` separated parts are used.
pub fn net_cdf_file_name(template: &str, date: NaiveDate) -> Result<String, PipelineError> {
    let mut parts = template.split('-');
    match (parts.next(), parts.next()) {
        (Some(head), Some(tail)) => Ok(format!("{}_{}_{}", head, date.format("%Y-%m-%d"), tail)),
        _ => Err(PipelineError::Config(format!(
            "NET_CDF_FILE '{}' should look like <head>-<tail>",
            template
        ))),
    }
}

/// Object listing prefix for a configured initial path.
pub fn listing_prefix(initial_path_prefix: &str) -> String {
    format!("{}_", initial_path_prefix)
}

/// Glob `*<file_name>`: any object whose name ends with the target file.
pub fn matches_target(object_name: &str, file_name: &str) -> bool {
    object_name.ends_with(file_name)
}

// ============================================================================
// API Client
// ============================================================================

pub struct StorageClient {
    http: reqwest::blocking::Client,
    bucket: String,
    token: Option<String>,
}

impl StorageClient {
    pub fn new(bucket: &str, token: Option<String>) -> Result<Self, PipelineError> {
        let http = reqwest::blocking::Client::builder().build()?;
        Ok(Self {
            http,
            bucket: bucket.to_string(),
            token,
        })
    }

    /// Builds a client for `bucket`, minting an access token first when a
    /// service account is configured.
    pub fn connect(bucket: &str, credentials: &Credentials) -> Result<Self, PipelineError> {
        let mut client = Self::new(bucket, None)?;
        if let Credentials::ServiceAccount(key) = credentials {
            client.token = Some(fetch_access_token(&client.http, key)?);
            logging::debug(
                Source::Storage,
                None,
                &format!("access token minted for {}", key.client_email),
            );
        }
        Ok(client)
    }

    fn object_url(&self, name: Option<&str>) -> Result<Url, PipelineError> {
        let mut url = Url::parse(GCS_BASE_URL)
            .map_err(|e| PipelineError::Storage(format!("bad base URL: {}", e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| PipelineError::Storage("base URL cannot take a path".to_string()))?;
            segments.extend(["b", self.bucket.as_str(), "o"]);
            if let Some(name) = name {
                // Object names contain '/', which must be escaped as one segment
                segments.push(name);
            }
        }
        Ok(url)
    }

    fn get(&self, url: Url) -> reqwest::blocking::RequestBuilder {
        let request = self.http.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// List every object under `prefix`, following page tokens
    pub fn list_objects(&self, prefix: &str) -> Result<Vec<StorageObject>, PipelineError> {
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.get(self.object_url(None)?).query(&[("prefix", prefix)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send()?;
            if !response.status().is_success() {
                return Err(PipelineError::Storage(format!(
                    "list {} HTTP {}",
                    prefix,
                    response.status()
                )));
            }

            let page = parse_object_list(&response.text()?)?;
            objects.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(objects)
    }

    /// Download one object to `dest`, returning the bytes written
    pub fn download(&self, name: &str, dest: &Path) -> Result<u64, PipelineError> {
        let mut url = self.object_url(Some(name))?;
        url.query_pairs_mut().append_pair("alt", "media");

        let mut response = self.get(url).send()?;
        if !response.status().is_success() {
            return Err(PipelineError::Storage(format!(
                "download {} HTTP {}",
                name,
                response.status()
            )));
        }

        let mut file = File::create(dest)?;
        let bytes = response.copy_to(&mut file)?;
        Ok(bytes)
    }
}

// ============================================================================
// Service account credentials
// ============================================================================

const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_only";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Lifetime requested for the signed assertion; Google caps it at one hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The fields of a service account key file (`KEY_FILE_PATH`) used to mint
/// access tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Debug, Clone)]
pub enum Credentials {
    /// No key file configured; only public buckets are readable.
    Anonymous,
    ServiceAccount(ServiceAccountKey),
}

/// JWT claims for the OAuth 2.0 service account flow
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Parses service account key JSON.
pub fn parse_service_account_key(text: &str) -> Result<ServiceAccountKey, PipelineError> {
    let key: ServiceAccountKey = serde_json::from_str(text)
        .map_err(|e| PipelineError::Config(format!("not a service account key: {}", e)))?;
    if key.key_type != "service_account" {
        return Err(PipelineError::Config(format!(
            "key type '{}' is not supported, expected 'service_account'",
            key.key_type
        )));
    }
    Ok(key)
}

/// Loads the key file named by `KEY_FILE_PATH`. An empty path means anonymous
/// access.
pub fn load_credentials(key_file_path: &str) -> Result<Credentials, PipelineError> {
    if key_file_path.trim().is_empty() {
        return Ok(Credentials::Anonymous);
    }
    let text = fs::read_to_string(key_file_path)
        .map_err(|e| PipelineError::Config(format!("KEY_FILE_PATH {}: {}", key_file_path, e)))?;
    let key = parse_service_account_key(&text)
        .map_err(|e| PipelineError::Config(format!("KEY_FILE_PATH {}: {}", key_file_path, e)))?;
    Ok(Credentials::ServiceAccount(key))
}

/// Signs the RS256 assertion exchanged for an access token.
///
/// # Arguments
/// * `key` - service account key
/// * `issued_at` - Unix seconds
pub fn signed_assertion(key: &ServiceAccountKey, issued_at: i64) -> Result<String, PipelineError> {
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: STORAGE_SCOPE,
        aud: &key.token_uri,
        iat: issued_at,
        exp: issued_at + ASSERTION_LIFETIME_SECS,
    };
    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| PipelineError::Config(format!("service account private key: {}", e)))?;
    encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
        .map_err(|e| PipelineError::Config(format!("signing assertion: {}", e)))
}

/// Exchanges a signed assertion for an OAuth access token
pub fn fetch_access_token(
    http: &reqwest::blocking::Client,
    key: &ServiceAccountKey,
) -> Result<String, PipelineError> {
    let assertion = signed_assertion(key, Utc::now().timestamp())?;

    let response = http
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()?;
    if !response.status().is_success() {
        return Err(PipelineError::Storage(format!(
            "token exchange for {} HTTP {}",
            key.client_email,
            response.status()
        )));
    }

    let token: TokenResponse = serde_json::from_str(&response.text()?)
        .map_err(|e| PipelineError::Storage(format!("token response: {}", e)))?;
    Ok(token.access_token)
}

// ============================================================================
// Trigger
// ============================================================================

/// Finds the run's NetCDF file under the configured prefix and downloads it.
///
/// Returns the local path when a matching object was downloaded, `None` when
/// the bucket holds no match yet.
pub fn trigger_download(
    config: &Config,
    request: &WrfRequest,
) -> Result<Option<PathBuf>, PipelineError> {
    if config.bucket_name.is_empty() {
        return Err(PipelineError::Config("BUCKET_NAME is not set".to_string()));
    }

    let file_name = net_cdf_file_name(&config.net_cdf_file, request.net_cdf_date())?;
    let prefix = listing_prefix(&config.initial_path_prefix);
    let location = request.download_location(&config.wrf_data_dir);

    logging::info(Source::Storage, None, &format!("prefix : {}", prefix));
    logging::info(Source::Storage, None, &format!("net_cdf_file_name : {}", file_name));
    logging::debug(
        Source::Storage,
        None,
        &format!(
            "start_ts {} duration_days ({}, {})",
            request.start_ts(),
            request.backward_days,
            request.forward_days
        ),
    );

    let credentials = load_credentials(&config.key_file_path)?;
    let client = StorageClient::connect(&config.bucket_name, &credentials)?;
    let objects = client.list_objects(&prefix)?;

    let Some(object) = objects.iter().find(|o| matches_target(&o.name, &file_name)) else {
        logging::warn(
            Source::Storage,
            Some(file_name.as_str()),
            &format!("no object under {} matches {} ({} listed)", prefix, file_name, objects.len()),
        );
        return Ok(None);
    };

    fs::create_dir_all(&location)?;
    let dest = location.join(&file_name);
    let bytes = client.download(&object.name, &dest)?;

    logging::info(
        Source::Storage,
        Some(file_name.as_str()),
        &format!("Downloaded {} ({} bytes) to {}", object.name, bytes, dest.display()),
    );
    Ok(Some(dest))
}

// ============================================================================
// Tests
// ============================================================================
