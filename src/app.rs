use ip_extract::Ledger;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::fields::FieldSpec;
use crate::files::{scan_dir, scan_file, scan_stdin};
use crate::input::Source;
use crate::normalize::merge_counts;
use crate::record::{is_failed, ResolutionRecord};
use crate::resolver::{resolve_each, Resolver};

/// Message carried by records when resolution is turned off.
pub const NO_RESOLVE_MESSAGE: &str = "No resolve";

/// One extraction and resolution run.
///
/// Reads every source into a single [`Ledger`], resolves the distinct
/// addresses and attaches occurrence counts to the records.
pub struct Chickadee {
    pub fields: FieldSpec,
    pub include_bogons: bool,
    /// Always use single-item requests, even when the service can batch.
    pub single: bool,
    resolver: Option<Box<dyn Resolver>>,
}

impl Chickadee {
    /// A run that only extracts and counts.
    pub fn new(fields: FieldSpec) -> Self {
        Self {
            fields,
            include_bogons: false,
            single: false,
            resolver: None,
        }
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Box<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn include_bogons(mut self, yes: bool) -> Self {
        self.include_bogons = yes;
        self
    }

    #[must_use]
    pub fn single(mut self, yes: bool) -> Self {
        self.single = yes;
        self
    }

    /// Whether addresses will be sent to a service.
    #[inline]
    pub fn resolves(&self) -> bool {
        self.resolver.is_some()
    }

    /// Classify command line arguments into sources. No arguments means stdin.
    pub fn sources<S: AsRef<str>>(args: &[S]) -> Result<Vec<Source>> {
        if args.is_empty() {
            return Ok(vec![Source::Stdin]);
        }
        args.iter().map(|a| Source::classify(a.as_ref())).collect()
    }

    /// Count the addresses of every source into one ledger.
    pub fn extract(&self, sources: &[Source]) -> Result<Ledger> {
        let exclude = !self.include_bogons;
        let mut ledger = Ledger::new(exclude);
        for source in sources {
            debug!(%source, "scanning");
            let found = match source {
                Source::Stdin => scan_stdin(exclude)?,
                Source::File(path) => scan_file(path, exclude)?,
                Source::Dir(path) => scan_dir(path, exclude)?,
                Source::Text(text) => {
                    let mut found = Ledger::new(exclude);
                    found.record(text);
                    found
                }
            };
            ledger.merge_from(&found);
        }
        info!(distinct = ledger.len(), "extracted addresses");
        Ok(ledger)
    }

    /// Resolve the distinct addresses of `ledger`.
    ///
    /// Without a resolver every address gets a [`NO_RESOLVE_MESSAGE`]
    /// record. `count` is attached when the field list asks for it.
    pub fn resolve_ledger(&mut self, ledger: &Ledger) -> Vec<ResolutionRecord> {
        let Some(resolver) = self.resolver.as_deref_mut() else {
            return unresolved(ledger);
        };
        let addresses = ledger.addresses();
        if addresses.is_empty() {
            return Vec::new();
        }
        info!(
            addresses = addresses.len(),
            service = resolver.name(),
            "resolving"
        );
        let records = if self.single || !resolver.supports_batch() {
            resolve_each(resolver, &addresses, &self.fields)
        } else {
            resolver.resolve_many(&addresses, &self.fields)
        };
        let failed = records.iter().filter(|r| is_failed(r)).count();
        if failed > 0 {
            warn!(failed, total = records.len(), "some addresses could not be resolved");
        }
        if self.fields.contains("count") {
            merge_counts(records, ledger)
        } else {
            records
        }
    }

    /// Extract from `args` and resolve the result.
    pub fn run<S: AsRef<str>>(&mut self, args: &[S]) -> Result<Vec<ResolutionRecord>> {
        let sources = Self::sources(args)?;
        let ledger = self.extract(&sources)?;
        Ok(self.resolve_ledger(&ledger))
    }
}

/// One `{query, count, message}` record per ledger entry.
pub fn unresolved(ledger: &Ledger) -> Vec<ResolutionRecord> {
    ledger
        .iter()
        .map(|(address, count)| {
            let mut record = ResolutionRecord::new();
            record.insert("query".into(), Value::from(address));
            record.insert("count".into(), Value::from(count));
            record.insert("message".into(), Value::from(NO_RESOLVE_MESSAGE));
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_resolver_reports_counts() {
        let mut run = Chickadee::new(FieldSpec::parse("query,count,message"));
        let records = run.run(&["1.1.1.1,1.1.1.1", "2.2.2.2"]).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["query"], "1.1.1.1");
        assert_eq!(records[0]["count"], 2);
        assert_eq!(records[1]["message"], NO_RESOLVE_MESSAGE);
    }

    #[test]
    fn bogons_follow_flag() {
        let strict = Chickadee::new(FieldSpec::default());
        let src = [Source::Text("10.0.1.2,8.8.8.8".into())];
        assert_eq!(strict.extract(&src).unwrap().addresses(), vec!["8.8.8.8"]);

        let lax = Chickadee::new(FieldSpec::default()).include_bogons(true);
        assert_eq!(
            lax.extract(&src).unwrap().addresses(),
            vec!["10.0.1.2", "8.8.8.8"]
        );
    }
}
