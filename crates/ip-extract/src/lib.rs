//! IP address extraction, bogon classification and occurrence counting.
//!
//! `ip-extract` finds IPv4 and IPv6 literals in unstructured text and
//! tallies how often each distinct address appears. It is the I/O-free half
//! of chickadee: nothing here touches the network or the filesystem.
//!
//! - [`Matcher`] recognizes dotted-quad and colon-hex literals, including
//!   `::` compression, IPv4-mapped and embedded forms, and link-local zone
//!   indexes (`fe80::1%eth0`).
//! - [`is_bogon`] reports whether an address is private, link-local,
//!   reserved or multicast.
//! - [`Ledger`] counts occurrences per address and merges across sources.
//!
//! ## Quick Start
//!
//! ```
//! use ip_extract::Ledger;
//!
//! let mut ledger = Ledger::new(true); // skip bogons
//! ledger.record("Connect from 192.168.1.1 to 8.8.8.8, retry 8.8.8.8");
//! ledger.record("fallback 2001:4860:4860::8888");
//!
//! assert_eq!(ledger.count("8.8.8.8"), 2);
//! assert_eq!(ledger.count("192.168.1.1"), 0);
//! assert_eq!(ledger.len(), 2);
//! ```
//!
//! ## Raw matches
//!
//! ```
//! use ip_extract::Matcher;
//!
//! let found: Vec<&str> = Matcher::shared()
//!     .addresses("link fe80::1%eth0 peer 10.0.0.1")
//!     .collect();
//! assert_eq!(found, vec!["fe80::1%eth0", "10.0.0.1"]);
//! ```

pub mod bogon;
pub mod error;
pub mod ledger;
pub mod matcher;

pub use bogon::{is_bogon, is_bogon_str, parse_address, parse_dotted_quad};
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use matcher::{strip_zone_index, Matcher};
