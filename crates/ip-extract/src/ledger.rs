use rustc_hash::FxHashMap;
use tracing::trace;

use crate::bogon::is_bogon_str;
use crate::matcher::{strip_zone_index, Matcher};

/// Occurrence counts for every address seen while scanning one or more sources.
///
/// Entries keep the order in which addresses were first seen. Every present
/// address has a count of at least one; absent addresses count as zero.
/// Merging ledgers sums counts per address, so folding per-file ledgers into
/// a per-directory one is order independent.
///
/// ```
/// use ip_extract::Ledger;
///
/// let mut ledger = Ledger::new(true);
/// ledger.record("10.0.1.2,8.8.8.8,8.8.8.8");
/// assert_eq!(ledger.count("8.8.8.8"), 2);
/// assert_eq!(ledger.count("10.0.1.2"), 0);
/// ```
#[derive(Clone, Debug)]
pub struct Ledger {
    exclude_bogons: bool,
    entries: Vec<(String, u64)>,
    index: FxHashMap<String, usize>,
}

impl Default for Ledger {
    /// An empty ledger that skips bogon addresses.
    fn default() -> Self {
        Self::new(true)
    }
}

impl Ledger {
    /// Create an empty ledger. With `exclude_bogons`, private, link-local,
    /// reserved and multicast addresses are not counted.
    pub fn new(exclude_bogons: bool) -> Self {
        Self {
            exclude_bogons,
            entries: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Scan `text` and count every address found in it.
    #[inline]
    pub fn record(&mut self, text: &str) {
        self.record_bytes(text.as_bytes());
    }

    /// Scan a byte slice and count every address found in it.
    ///
    /// Non UTF-8 content around the addresses is fine; addresses themselves
    /// are always ASCII.
    pub fn record_bytes(&mut self, data: &[u8]) {
        for range in Matcher::shared().find_iter(data) {
            let Ok(raw) = std::str::from_utf8(&data[range]) else {
                continue;
            };
            let address = strip_zone_index(raw);
            if self.exclude_bogons && is_bogon_str(address) {
                trace!(address, "skipping bogon");
                continue;
            }
            self.add(address, 1);
        }
    }

    /// Add `n` occurrences of `address`. Adding zero is a no-op.
    pub fn add(&mut self, address: &str, n: u64) {
        if n == 0 {
            return;
        }
        match self.index.get(address) {
            Some(&idx) => self.entries[idx].1 += n,
            None => {
                self.index.insert(address.to_string(), self.entries.len());
                self.entries.push((address.to_string(), n));
            }
        }
    }

    /// Occurrences of `address`, zero when never seen.
    #[inline]
    pub fn count(&self, address: &str) -> u64 {
        self.index
            .get(address)
            .map(|&idx| self.entries[idx].1)
            .unwrap_or(0)
    }

    /// Fold `other` into this ledger, summing counts per address.
    pub fn merge_from(&mut self, other: &Ledger) {
        for (address, n) in other.iter() {
            self.add(address, n);
        }
    }

    /// Combine two ledgers into one whose counts are the per-address sums.
    #[must_use]
    pub fn merge(mut self, other: Ledger) -> Ledger {
        self.merge_from(&other);
        self
    }

    /// The distinct addresses, in first-seen order.
    pub fn addresses(&self) -> Vec<String> {
        self.entries.iter().map(|(a, _)| a.clone()).collect()
    }

    /// Iterate `(address, count)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.entries.iter().map(|(a, n)| (a.as_str(), *n))
    }

    /// Number of distinct addresses.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ledgers are equal when they hold the same counts, regardless of the
/// order addresses were first seen in.
impl PartialEq for Ledger {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(a, n)| other.count(a) == n)
    }
}

impl Eq for Ledger {}
