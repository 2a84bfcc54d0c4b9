//! Resolver for the ip-api.com JSON API.
//!
//! The free tier (`http://ip-api.com/`) is limited to a small number of
//! requests per minute and reports its quota through two headers: `X-Rl`
//! (requests remaining in the window) and `X-Ttl` (seconds until the window
//! resets). The pro tier (`https://pro.ip-api.com/`) takes a `key` parameter
//! and is not rate limited.
//!
//! Single lookups use `GET json/{address}`, which also fills in `reverse`.
//! Batch lookups use `POST batch` with up to [`BATCH_SIZE`] addresses each.

use serde_json::{json, Value};
use tracing::{debug, error, warn};

use super::{progress_bar, select_language, RateLimit, ResolutionFailure, Resolver, Transport};
use crate::fields::FieldSpec;
use crate::record::{failed_record, ResolutionRecord};

pub const FREE_URL: &str = "http://ip-api.com/";
pub const PRO_URL: &str = "https://pro.ip-api.com/";

/// Addresses per batch request.
pub const BATCH_SIZE: usize = 100;

/// Default ordered output fields.
pub const FIELDS: &[&str] = &[
    "query", "count", "as", "org", "isp", "continent", "country", "regionName", "city",
    "district", "zip", "mobile", "proxy", "hosting", "reverse", "lat", "lon", "timezone",
    "status", "message",
];

/// Every field the service can return, plus the locally computed `count`.
pub const SUPPORTED_FIELDS: &[&str] = &[
    "query", "count", "status", "message", "continent", "continentCode", "country",
    "countryCode", "region", "regionName", "city", "district", "zip", "lat", "lon",
    "timezone", "offset", "currency", "isp", "org", "as", "asname", "reverse", "mobile",
    "proxy", "hosting",
];

/// Response languages, default first.
pub const LANGUAGES: &[&str] = &["en", "de", "es", "pt-BR", "fr", "ja", "zh-CN", "ru"];

/// ip-api.com client, free or pro tier.
pub struct IpApiResolver<T> {
    transport: T,
    base_url: String,
    api_key: Option<String>,
    lang: &'static str,
    limit: RateLimit,
    progress: bool,
}

impl<T: Transport> IpApiResolver<T> {
    /// Free tier client, header driven rate limiting enabled.
    pub fn free(transport: T, lang: &str) -> Self {
        Self {
            transport,
            base_url: FREE_URL.to_string(),
            api_key: None,
            lang: select_language(lang, LANGUAGES),
            limit: RateLimit::new(true),
            progress: false,
        }
    }

    /// Pro tier client. Quota headers are ignored.
    pub fn pro(transport: T, api_key: &str, lang: &str) -> Self {
        Self {
            base_url: PRO_URL.to_string(),
            api_key: Some(api_key.to_string()),
            limit: RateLimit::new(false),
            ..Self::free(transport, lang)
        }
    }

    /// Point the client at another server. The URL must end with `/`.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, limit: RateLimit) -> Self {
        self.limit = limit;
        self
    }

    #[inline]
    pub fn rate_limit(&self) -> &RateLimit {
        &self.limit
    }

    #[inline]
    pub fn is_pro(&self) -> bool {
        self.api_key.is_some()
    }

    fn params(&self, fields: &FieldSpec) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(3);
        let remote = fields.remote_param();
        if !remote.is_empty() {
            params.push(("fields", remote));
        }
        params.push(("lang", self.lang.to_string()));
        if let Some(key) = &self.api_key {
            params.push(("key", key.clone()));
        }
        params
    }

    fn observe(&mut self, resp: &super::HttpResponse) {
        self.limit
            .observe(resp.header_num("x-rl"), resp.header_num("x-ttl"));
    }

    fn resolve_chunk(
        &mut self,
        chunk: &[String],
        params: &[(&str, &str)],
    ) -> Vec<ResolutionRecord> {
        let url = format!("{}batch", self.base_url);
        let body = Value::Array(chunk.iter().map(|a| json!({ "query": a })).collect());
        loop {
            self.limit.wait();
            let resp = match self.transport.post_json(&url, params, &body) {
                Ok(resp) => resp,
                Err(e) => {
                    error!(error = %e, "batch request failed");
                    return fail_all(chunk, &ResolutionFailure::from(e).to_string());
                }
            };
            match resp.status {
                200 => {
                    self.observe(&resp);
                    return match resp.json::<Vec<ResolutionRecord>>() {
                        Ok(found) => pair_batch(chunk, found),
                        Err(e) => {
                            error!(error = %e, "undecodable batch response");
                            fail_all(chunk, &ResolutionFailure::from(e).to_string())
                        }
                    };
                }
                429 => {
                    warn!(addresses = chunk.len(), "batch rate limited, retrying");
                    self.limit.throttled(resp.header_num("x-ttl"));
                }
                status => {
                    let failure = ResolutionFailure::from_status(status);
                    error!(status, "batch request rejected: {failure}");
                    return fail_all(chunk, &failure.to_string());
                }
            }
        }
    }
}

impl<T: Transport> Resolver for IpApiResolver<T> {
    fn name(&self) -> &'static str {
        "ip_api"
    }

    fn supported_fields(&self) -> &'static [&'static str] {
        SUPPORTED_FIELDS
    }

    fn default_fields(&self) -> &'static [&'static str] {
        FIELDS
    }

    fn supports_batch(&self) -> bool {
        true
    }

    fn language(&self) -> &str {
        self.lang
    }

    fn resolve_one(&mut self, address: &str, fields: &FieldSpec) -> ResolutionRecord {
        let url = format!("{}json/{}", self.base_url, address);
        let owned = self.params(fields);
        let params: Vec<(&str, &str)> = owned.iter().map(|(k, v)| (*k, v.as_str())).collect();
        loop {
            self.limit.wait();
            let resp = match self.transport.get(&url, &params) {
                Ok(resp) => resp,
                Err(e) => {
                    error!(address, error = %e, "request failed");
                    return ResolutionFailure::from(e).into_record(address);
                }
            };
            match resp.status {
                200 => {
                    self.observe(&resp);
                    return match resp.json::<ResolutionRecord>() {
                        Ok(record) => with_query(record, address),
                        Err(e) => {
                            error!(address, error = %e, "undecodable response");
                            ResolutionFailure::from(e).into_record(address)
                        }
                    };
                }
                429 => {
                    warn!(address, "rate limited, retrying");
                    self.limit.throttled(resp.header_num("x-ttl"));
                }
                status => {
                    let failure = ResolutionFailure::from_status(status);
                    error!(address, status, "request rejected: {failure}");
                    return failure.into_record(address);
                }
            }
        }
    }

    fn resolve_many(&mut self, addresses: &[String], fields: &FieldSpec) -> Vec<ResolutionRecord> {
        let owned = self.params(fields);
        let params: Vec<(&str, &str)> = owned.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let bar = progress_bar(self.progress, addresses.len() as u64, self.name());
        let mut records = Vec::with_capacity(addresses.len());
        for chunk in addresses.chunks(BATCH_SIZE) {
            debug!(addresses = chunk.len(), "resolving batch");
            records.extend(self.resolve_chunk(chunk, &params));
            bar.inc(chunk.len() as u64);
        }
        bar.finish_and_clear();
        records
    }

    fn set_progress(&mut self, enabled: bool) {
        self.progress = enabled;
    }

    fn progress(&self) -> bool {
        self.progress
    }
}

fn with_query(mut record: ResolutionRecord, address: &str) -> ResolutionRecord {
    if !record.contains_key("query") {
        record.insert("query".to_string(), Value::from(address));
    }
    record
}

fn fail_all(chunk: &[String], message: &str) -> Vec<ResolutionRecord> {
    chunk.iter().map(|a| failed_record(a, message)).collect()
}

/// Batch answers come back in request order. Addresses the service dropped
/// get failed records.
fn pair_batch(chunk: &[String], found: Vec<ResolutionRecord>) -> Vec<ResolutionRecord> {
    let mut found = found.into_iter();
    chunk
        .iter()
        .map(|address| match found.next() {
            Some(record) => with_query(record, address),
            None => failed_record(address, "missing from batch response"),
        })
        .collect()
}
