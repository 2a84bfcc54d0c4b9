//! Rate-limit aware clients for IP intelligence services.
//!
//! Each service is an independent [`Resolver`] implementation owning its own
//! [`RateLimit`] state. Per-address failures never escape as errors: they are
//! turned into failed-status records (see [`ResolutionFailure`]) so a bulk
//! job keeps going past one bad address.

pub mod ipapi;
pub mod transport;
pub mod virustotal;

use std::thread;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::fields::FieldSpec;
use crate::record::{failed_record, ResolutionRecord};

pub use ipapi::IpApiResolver;
pub use transport::{HttpResponse, HttpTransport, Transport, TransportError};
pub use virustotal::VirusTotalResolver;

/// A client resolving addresses against one service.
pub trait Resolver {
    /// Short service name used in logs and progress bars.
    fn name(&self) -> &'static str;

    /// Every field this service can fill in.
    fn supported_fields(&self) -> &'static [&'static str];

    /// Fields reported when the user does not choose any.
    fn default_fields(&self) -> &'static [&'static str];

    /// Whether [`Resolver::resolve_many`] issues multi-address requests.
    fn supports_batch(&self) -> bool;

    /// Response language actually in use.
    fn language(&self) -> &str;

    /// Resolve one address with a single-item request.
    fn resolve_one(&mut self, address: &str, fields: &FieldSpec) -> ResolutionRecord;

    /// Resolve many addresses, one record per address in input order.
    fn resolve_many(&mut self, addresses: &[String], fields: &FieldSpec) -> Vec<ResolutionRecord>;

    fn set_progress(&mut self, enabled: bool);

    fn progress(&self) -> bool;
}

/// Resolve addresses one request at a time, with an optional progress bar.
pub fn resolve_each<R: Resolver + ?Sized>(
    resolver: &mut R,
    addresses: &[String],
    fields: &FieldSpec,
) -> Vec<ResolutionRecord> {
    let bar = progress_bar(resolver.progress(), addresses.len() as u64, resolver.name());
    let mut records = Vec::with_capacity(addresses.len());
    for address in addresses {
        bar.set_message(address.clone());
        records.push(resolver.resolve_one(address, fields));
        bar.inc(1);
    }
    bar.finish_and_clear();
    records
}

/// Progress bar on stderr, or a hidden one when disabled.
pub(crate) fn progress_bar(enabled: bool, len: u64, prefix: &str) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    bar.set_prefix(prefix.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    let style = ProgressStyle::with_template(
        "[{prefix}] {elapsed_precise} {bar:36.cyan/blue} {pos:>4}/{len:4} {msg}",
    )
    .map(|s| s.progress_chars("■■□"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

/// Per-client "resume not before" bookkeeping.
///
/// No request is sent while `now < resume_not_before`. Header driven
/// deferrals only apply when the limit is enabled; explicit throttling
/// signals from the service always apply.
#[derive(Clone, Debug)]
pub struct RateLimit {
    enabled: bool,
    cooldown: Duration,
    resume_not_before: Option<Instant>,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RateLimit {
    /// Added on top of every advertised reset time to absorb clock skew.
    pub const RESET_BUFFER: Duration = Duration::from_millis(250);

    /// Wait applied when a service says "try later" without saying when.
    pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(15);

    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            cooldown: Self::DEFAULT_COOLDOWN,
            resume_not_before: None,
        }
    }

    /// Override the fallback cool-down interval.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    #[inline]
    pub fn resume_not_before(&self) -> Option<Instant> {
        self.resume_not_before
    }

    /// Block until requests may be sent again.
    pub fn wait(&mut self) {
        if let Some(resume) = self.resume_not_before.take() {
            let now = Instant::now();
            if resume > now {
                let pause = resume - now;
                info!(
                    seconds = pause.as_secs_f64(),
                    "sleeping due to rate limiting"
                );
                thread::sleep(pause);
            }
        }
    }

    /// Push the resume point at least `delay` into the future.
    pub fn defer_for(&mut self, delay: Duration) {
        let resume = Instant::now() + delay;
        self.resume_not_before = Some(match self.resume_not_before {
            Some(current) if current > resume => current,
            _ => resume,
        });
    }

    /// Record quota headers from a successful response. When no requests
    /// remain, defer for the reset time plus [`RateLimit::RESET_BUFFER`].
    pub fn observe(&mut self, remaining: Option<i64>, reset_secs: Option<u64>) {
        if !self.enabled {
            return;
        }
        if let Some(remaining) = remaining {
            if remaining < 1 {
                let reset = Duration::from_secs(reset_secs.unwrap_or(0));
                debug!(remaining, reset_secs = reset.as_secs(), "quota exhausted");
                self.defer_for(reset + Self::RESET_BUFFER);
            }
        }
    }

    /// Handle an explicit "too many requests" signal. Uses the advertised
    /// reset time when there is one, the cool-down otherwise.
    pub fn throttled(&mut self, reset_secs: Option<u64>) {
        let delay = match reset_secs {
            Some(secs) => Duration::from_secs(secs) + Self::RESET_BUFFER,
            None => self.cooldown,
        };
        debug!(delay_ms = delay.as_millis() as u64, "throttled by service");
        self.defer_for(delay);
    }
}

/// Why one address could not be resolved.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionFailure {
    #[error("invalid request (HTTP {0}), check the input data")]
    InvalidRequest(u16),

    #[error("authorization error (HTTP {0}), check the API key")]
    Authorization(u16),

    #[error("service unavailable (HTTP {0})")]
    ServiceUnavailable(u16),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ResolutionFailure {
    /// Classify a non-success, non-throttling status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ResolutionFailure::Authorization(status),
            400..=499 => ResolutionFailure::InvalidRequest(status),
            _ => ResolutionFailure::ServiceUnavailable(status),
        }
    }

    /// The failed-status record reported for `query`.
    pub fn into_record(self, query: &str) -> ResolutionRecord {
        failed_record(query, self.to_string())
    }
}

/// Pick `requested` when the service supports it, its default otherwise.
pub fn select_language(requested: &str, supported: &'static [&'static str]) -> &'static str {
    let default = supported.first().copied().unwrap_or("en");
    match supported.iter().find(|l| **l == requested) {
        Some(lang) => lang,
        None => {
            debug!(requested, default, "unsupported language, using default");
            default
        }
    }
}

/// The resolution services chickadee knows about.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
pub enum Backend {
    #[default]
    #[value(name = "ip_api")]
    #[serde(rename = "ip_api")]
    IpApi,
    #[value(name = "virustotal")]
    #[serde(rename = "virustotal")]
    VirusTotal,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::IpApi => "ip_api",
            Backend::VirusTotal => "virustotal",
        }
    }

    pub fn default_fields(self) -> &'static [&'static str] {
        match self {
            Backend::IpApi => ipapi::FIELDS,
            Backend::VirusTotal => virustotal::FIELDS,
        }
    }

    pub fn supported_fields(self) -> &'static [&'static str] {
        match self {
            Backend::IpApi => ipapi::SUPPORTED_FIELDS,
            Backend::VirusTotal => virustotal::SUPPORTED_FIELDS,
        }
    }
}

/// Everything needed to construct a [`Resolver`].
#[derive(Clone, Debug, Default)]
pub struct ResolverOptions {
    pub backend: Backend,
    pub api_key: Option<String>,
    pub lang: String,
    pub progress: bool,
}

/// Build the resolver for `opts` over the real HTTP transport.
///
/// Fails before any request when the backend needs a key and none is set.
pub fn build_resolver(opts: &ResolverOptions) -> Result<Box<dyn Resolver>> {
    let api_key = opts.api_key.as_deref().filter(|k| !k.trim().is_empty());
    let mut resolver: Box<dyn Resolver> = match (opts.backend, api_key) {
        (Backend::IpApi, None) => Box::new(IpApiResolver::free(HttpTransport::new()?, &opts.lang)),
        (Backend::IpApi, Some(key)) => {
            info!("API key found, using ip-api pro endpoint");
            Box::new(IpApiResolver::pro(HttpTransport::new()?, key, &opts.lang))
        }
        (Backend::VirusTotal, Some(key)) => {
            info!("API key found");
            Box::new(VirusTotalResolver::new(HttpTransport::new()?, key, &opts.lang))
        }
        (Backend::VirusTotal, None) => {
            return Err(Error::MissingApiKey {
                backend: Backend::VirusTotal.name(),
            })
        }
    };
    resolver.set_progress(opts.progress);
    Ok(resolver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            ResolutionFailure::from_status(403),
            ResolutionFailure::Authorization(403)
        ));
        assert!(matches!(
            ResolutionFailure::from_status(400),
            ResolutionFailure::InvalidRequest(400)
        ));
        assert!(matches!(
            ResolutionFailure::from_status(503),
            ResolutionFailure::ServiceUnavailable(503)
        ));
    }

    #[test]
    fn unsupported_language_falls_back() {
        assert_eq!(select_language("fr", ipapi::LANGUAGES), "fr");
        assert_eq!(select_language("xx", ipapi::LANGUAGES), "en");
        assert_eq!(select_language("fr", virustotal::LANGUAGES), "en");
    }

    #[test]
    fn observe_only_defers_when_exhausted() {
        let mut limit = RateLimit::new(true);
        limit.observe(Some(3), Some(60));
        assert!(limit.resume_not_before().is_none());
        limit.observe(Some(0), Some(2));
        let resume = limit.resume_not_before().unwrap();
        assert!(resume >= Instant::now() + Duration::from_secs(2));
    }

    #[test]
    fn disabled_limit_ignores_headers_but_not_throttling() {
        let mut limit = RateLimit::new(false).with_cooldown(Duration::from_millis(10));
        limit.observe(Some(0), Some(60));
        assert!(limit.resume_not_before().is_none());
        limit.throttled(None);
        assert!(limit.resume_not_before().is_some());
    }

    #[test]
    fn wait_clears_resume_point() {
        let mut limit = RateLimit::new(true);
        limit.defer_for(Duration::from_millis(20));
        let start = Instant::now();
        limit.wait();
        assert!(start.elapsed() >= Duration::from_millis(15));
        assert!(limit.resume_not_before().is_none());
    }

    #[test]
    fn virustotal_requires_key() {
        let opts = ResolverOptions {
            backend: Backend::VirusTotal,
            api_key: Some("  ".into()),
            ..Default::default()
        };
        assert!(matches!(
            build_resolver(&opts),
            Err(Error::MissingApiKey { .. })
        ));
    }
}
