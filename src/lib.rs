//! Extract IP addresses from logs and evidence files and enrich them with
//! GeoIP and threat intelligence.
//!
//! Sources (literal text, files, gzip files, directory trees, stdin) are read
//! into an [`ip_extract::Ledger`] that counts every distinct public address.
//! The distinct addresses are then resolved against ip-api.com or VirusTotal
//! by a [`resolver::Resolver`], which honours the service's rate limits, and
//! the records are written as CSV, JSON or JSON lines.
//!
//! # Examples
//!
//! Counting only, no network involved:
//!
//! ```
//! use chickadee::{Chickadee, FieldSpec};
//!
//! let mut run = Chickadee::new(FieldSpec::parse("query,count"));
//! let records = run.run(&["10.0.1.2,8.8.8.8,8.8.8.8"]).unwrap();
//!
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0]["query"], "8.8.8.8");
//! assert_eq!(records[0]["count"], 2);
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod fields;
pub mod files;
pub mod input;
pub mod normalize;
pub mod record;
pub mod resolver;
pub mod writer;

pub use crate::app::Chickadee;
pub use crate::error::{Error, Result};
pub use crate::fields::FieldSpec;
pub use crate::record::ResolutionRecord;
pub use crate::resolver::{build_resolver, Backend, Resolver, ResolverOptions};
pub use crate::writer::{write_report, OutputFormat};
