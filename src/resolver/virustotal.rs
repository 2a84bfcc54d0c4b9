//! Resolver for the VirusTotal v2 IP address report.
//!
//! There is no batch endpoint: [`Resolver::resolve_many`] issues one request
//! per address. An exhausted quota is signalled by `204 No Content` with no
//! reset time, so the client waits out a fixed cool-down before retrying.

use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{error, warn};

use super::{resolve_each, select_language, RateLimit, ResolutionFailure, Resolver, Transport};
use crate::fields::FieldSpec;
use crate::record::ResolutionRecord;

pub const REPORT_URL: &str = "https://www.virustotal.com/vtapi/v2/ip-address/report";

/// Default ordered output fields.
pub const FIELDS: &[&str] = &[
    "query", "count", "asn", "country", "subnet", "resolution_count",
    "detected_sample_count", "undetected_sample_count", "detected_url_count",
    "undetected_url_count", "status", "message",
];

/// Every field a report can fill. The nested ones (`whois`, `resolutions`,
/// the sample and URL maps) are only written on request.
pub const SUPPORTED_FIELDS: &[&str] = &[
    "query", "count", "asn", "country", "continent", "subnet", "whois", "resolution_count",
    "detected_sample_count", "undetected_sample_count", "detected_url_count",
    "undetected_url_count", "status", "message", "resolutions", "detected_samples",
    "undetected_samples", "detected_urls", "undetected_urls",
];

pub const LANGUAGES: &[&str] = &["en"];

/// Make a URL or hostname non-clickable: every `.` becomes `[.]`.
pub fn defang(ioc: &str) -> String {
    ioc.replace('.', "[.]")
}

pub struct VirusTotalResolver<T> {
    transport: T,
    url: String,
    api_key: String,
    lang: &'static str,
    limit: RateLimit,
    progress: bool,
}

impl<T: Transport> VirusTotalResolver<T> {
    pub fn new(transport: T, api_key: &str, lang: &str) -> Self {
        Self {
            transport,
            url: REPORT_URL.to_string(),
            api_key: api_key.to_string(),
            lang: select_language(lang, LANGUAGES),
            limit: RateLimit::new(true),
            progress: false,
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, limit: RateLimit) -> Self {
        self.limit = limit;
        self
    }
}

impl<T: Transport> Resolver for VirusTotalResolver<T> {
    fn name(&self) -> &'static str {
        "virustotal"
    }

    fn supported_fields(&self) -> &'static [&'static str] {
        SUPPORTED_FIELDS
    }

    fn default_fields(&self) -> &'static [&'static str] {
        FIELDS
    }

    fn supports_batch(&self) -> bool {
        false
    }

    fn language(&self) -> &str {
        self.lang
    }

    fn resolve_one(&mut self, address: &str, _fields: &FieldSpec) -> ResolutionRecord {
        let params = [("apikey", self.api_key.as_str()), ("ip", address)];
        loop {
            self.limit.wait();
            let resp = match self.transport.get(&self.url, &params) {
                Ok(resp) => resp,
                Err(e) => {
                    error!(address, error = %e, "request failed");
                    return ResolutionFailure::from(e).into_record(address);
                }
            };
            match resp.status {
                200 => {
                    return match resp.json::<Report>() {
                        Ok(report) => report.into_record(address),
                        Err(e) => {
                            error!(address, error = %e, "undecodable report");
                            ResolutionFailure::from(e).into_record(address)
                        }
                    };
                }
                204 | 429 => {
                    warn!(address, "quota exceeded, retrying after cool-down");
                    self.limit.throttled(None);
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
        resolve_each(self, addresses, fields)
    }

    fn set_progress(&mut self, enabled: bool) {
        self.progress = enabled;
    }

    fn progress(&self) -> bool {
        self.progress
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Report {
    response_code: Value,
    verbose_msg: Option<String>,
    asn: Value,
    as_owner: Option<String>,
    country: Option<String>,
    continent: Option<String>,
    network: Option<String>,
    whois: Option<String>,
    resolutions: Vec<Resolution>,
    detected_communicating_samples: Vec<Sample>,
    detected_downloaded_samples: Vec<Sample>,
    detected_referrer_samples: Vec<Sample>,
    undetected_communicating_samples: Vec<Sample>,
    undetected_downloaded_samples: Vec<Sample>,
    undetected_referrer_samples: Vec<Sample>,
    detected_urls: Vec<DetectedUrl>,
    /// `[url, sha256, positives, total, scan_date]` tuples.
    undetected_urls: Vec<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Resolution {
    hostname: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Sample {
    sha256: Option<String>,
    positives: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DetectedUrl {
    url: Option<String>,
    positives: Option<u64>,
}

impl Report {
    fn into_record(self, query: &str) -> ResolutionRecord {
        let mut rec = ResolutionRecord::new();
        rec.insert("query".into(), Value::from(query));
        rec.insert("asn".into(), Value::from(self.asn_label()));
        rec.insert("continent".into(), opt_str(self.continent.as_deref()));
        rec.insert("country".into(), opt_str(self.country.as_deref()));
        rec.insert("subnet".into(), opt_str(self.network.as_deref()));
        rec.insert("status".into(), self.response_code.clone());
        rec.insert("message".into(), opt_str(self.verbose_msg.as_deref()));
        rec.insert(
            "whois".into(),
            Value::Object(parse_whois(self.whois.as_deref().unwrap_or(""))),
        );

        rec.insert("resolution_count".into(), Value::from(self.resolutions.len()));
        let hostnames = self.resolutions.iter().filter_map(|r| r.hostname.clone());
        rec.insert("resolutions".into(), sorted_distinct(hostnames));

        let detected = [
            &self.detected_communicating_samples,
            &self.detected_downloaded_samples,
            &self.detected_referrer_samples,
        ];
        let detected_count: usize = detected.iter().map(|s| s.len()).sum();
        rec.insert("detected_sample_count".into(), Value::from(detected_count));
        rec.insert("detected_samples".into(), Value::Object(sum_positives(&detected)));

        let undetected = [
            &self.undetected_communicating_samples,
            &self.undetected_downloaded_samples,
            &self.undetected_referrer_samples,
        ];
        let undetected_count: usize = undetected.iter().map(|s| s.len()).sum();
        rec.insert("undetected_sample_count".into(), Value::from(undetected_count));
        let hashes = undetected
            .iter()
            .flat_map(|set| set.iter())
            .filter_map(|s| s.sha256.clone());
        rec.insert("undetected_samples".into(), sorted_distinct(hashes));

        rec.insert("detected_url_count".into(), Value::from(self.detected_urls.len()));
        let mut detected_urls = Map::new();
        for entry in &self.detected_urls {
            if let Some(url) = &entry.url {
                detected_urls.insert(defang(url), Value::from(entry.positives.unwrap_or(0)));
            }
        }
        rec.insert("detected_urls".into(), Value::Object(detected_urls));

        rec.insert("undetected_url_count".into(), Value::from(self.undetected_urls.len()));
        let urls = self
            .undetected_urls
            .iter()
            .filter_map(|row| row.first().and_then(Value::as_str))
            .map(defang);
        rec.insert("undetected_urls".into(), sorted_distinct(urls));
        rec
    }

    /// `AS{number} {owner}`, empty when the report carries no ASN.
    fn asn_label(&self) -> String {
        let number = match &self.asn {
            Value::Number(n) => n.to_string(),
            Value::String(s) if !s.is_empty() => s.clone(),
            _ => return String::new(),
        };
        let owner = self.as_owner.as_deref().unwrap_or("");
        format!("AS{number} {owner}").trim_end().to_string()
    }
}

fn opt_str(value: Option<&str>) -> Value {
    value.map_or(Value::Null, Value::from)
}

fn sorted_distinct(items: impl Iterator<Item = String>) -> Value {
    let mut items: Vec<String> = items.collect();
    items.sort();
    items.dedup();
    Value::from(items)
}

/// Positives per hash, summed across sample categories. Hashes whose total
/// is zero are left out.
fn sum_positives(sets: &[&Vec<Sample>]) -> Map<String, Value> {
    let mut totals: Vec<(&str, u64)> = Vec::new();
    let mut index: FxHashMap<&str, usize> = FxHashMap::default();
    for set in sets {
        // Within one category a repeated hash keeps its last value.
        let mut category: FxHashMap<&str, u64> = FxHashMap::default();
        let mut order: Vec<&str> = Vec::new();
        for sample in set.iter() {
            let Some(hash) = sample.sha256.as_deref() else {
                continue;
            };
            if category.insert(hash, sample.positives.unwrap_or(0)).is_none() {
                order.push(hash);
            }
        }
        for hash in order {
            let positives = category[hash];
            match index.get(hash) {
                Some(&i) => totals[i].1 += positives,
                None => {
                    index.insert(hash, totals.len());
                    totals.push((hash, positives));
                }
            }
        }
    }
    totals
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .map(|(h, n)| (h.to_string(), Value::from(n)))
        .collect()
}

/// Split WHOIS text into `key: value` pairs. Lines without a colon are
/// collected under `OtherRemarks`.
fn parse_whois(text: &str) -> Map<String, Value> {
    let mut remarks = String::new();
    let mut pairs: Vec<(String, String)> = Vec::new();
    for line in text.lines().filter(|l| !l.is_empty()) {
        match line.split_once(':') {
            Some((key, value)) => {
                let key = key.trim().to_string();
                let value = value.trim().to_string();
                match pairs.iter_mut().find(|(k, _)| *k == key) {
                    Some(slot) => slot.1 = value,
                    None => pairs.push((key, value)),
                }
            }
            None => {
                remarks.push_str(line);
                remarks.push('\n');
            }
        }
    }
    let mut whois = Map::new();
    whois.insert("OtherRemarks".into(), Value::from(remarks));
    for (key, value) in pairs {
        whois.insert(key, Value::from(value));
    }
    whois
}
