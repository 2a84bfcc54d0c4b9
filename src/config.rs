//! Layered run configuration: command line flags over a YAML file over
//! built-in defaults.
//!
//! The file is looked up as `chickadee.yaml` or `.chickadee.yaml` in the
//! working directory, the home directory, `~/.config/chickadee` and
//! `/etc/chickadee`, first match wins. An explicit `--config` skips the
//! search. Keys use the long flag names:
//!
//! ```yaml
//! backend: ip_api
//! fields: query,count,as,country
//! output-format: csv
//! include-bogon: true
//! api-key: ...
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::fs;
use tracing::debug;

use crate::error::{Error, Result};
use crate::fields::FieldSpec;
use crate::resolver::{Backend, ResolverOptions};
use crate::writer::OutputFormat;

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "CHICKADEE_API_KEY";

pub const CONFIG_NAMES: &[&str] = &["chickadee.yaml", ".chickadee.yaml"];

/// `fields` may be a comma separated string or a YAML list.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FieldList {
    Joined(String),
    List(Vec<String>),
}

impl FieldList {
    pub fn to_spec(&self) -> FieldSpec {
        match self {
            FieldList::Joined(s) => FieldSpec::parse(s),
            FieldList::List(items) => FieldSpec::new(items),
        }
    }
}

/// One configuration layer. Unset keys fall through to the layer below.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FileConfig {
    pub backend: Option<Backend>,
    pub api_key: Option<String>,
    pub fields: Option<FieldList>,
    pub output_format: Option<OutputFormat>,
    pub output_file: Option<Utf8PathBuf>,
    pub no_resolve: Option<bool>,
    pub include_bogon: Option<bool>,
    pub single: Option<bool>,
    pub progress: Option<bool>,
    pub lang: Option<String>,
    pub log: Option<Utf8PathBuf>,
    pub verbose: Option<bool>,
}

impl FileConfig {
    /// Parse a YAML document. An empty document is an empty layer.
    pub fn from_yaml(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_yaml(&text).map_err(|source| Error::Config {
            path: path.as_std_path().to_path_buf(),
            source,
        })?;
        debug!(%path, "loaded config file");
        Ok(config)
    }

    /// Keys set in `self` win over those in `lower`.
    #[must_use]
    pub fn overlay(self, lower: FileConfig) -> FileConfig {
        FileConfig {
            backend: self.backend.or(lower.backend),
            api_key: self.api_key.or(lower.api_key),
            fields: self.fields.or(lower.fields),
            output_format: self.output_format.or(lower.output_format),
            output_file: self.output_file.or(lower.output_file),
            no_resolve: self.no_resolve.or(lower.no_resolve),
            include_bogon: self.include_bogon.or(lower.include_bogon),
            single: self.single.or(lower.single),
            progress: self.progress.or(lower.progress),
            lang: self.lang.or(lower.lang),
            log: self.log.or(lower.log),
            verbose: self.verbose.or(lower.verbose),
        }
    }
}

/// Candidate config file locations, in search order.
pub fn search_paths() -> Vec<Utf8PathBuf> {
    let mut dirs: Vec<Utf8PathBuf> = Vec::new();
    if let Some(cwd) = std::env::current_dir()
        .ok()
        .and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
    {
        dirs.push(cwd);
    }
    if let Some(home) = std::env::var("HOME").ok().filter(|h| !h.is_empty()) {
        let home = Utf8PathBuf::from(home);
        let xdg = home.join(".config").join("chickadee");
        dirs.push(home);
        dirs.push(xdg);
    }
    dirs.push(Utf8PathBuf::from("/etc/chickadee"));

    dirs.iter()
        .flat_map(|dir| CONFIG_NAMES.iter().map(move |name| dir.join(name)))
        .collect()
}

/// The first config file that exists, if any.
pub fn discover() -> Option<Utf8PathBuf> {
    search_paths().into_iter().find(|p| p.is_file())
}

/// A non-empty API key from [`API_KEY_ENV`].
pub fn api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

/// Fully resolved settings for one run.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub backend: Backend,
    pub api_key: Option<String>,
    /// `None` means the backend's default field list.
    pub fields: Option<FieldSpec>,
    pub output_format: OutputFormat,
    pub output_file: Option<Utf8PathBuf>,
    pub no_resolve: bool,
    pub include_bogon: bool,
    pub single: bool,
    pub progress: bool,
    pub lang: String,
    pub log: Option<Utf8PathBuf>,
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::resolve(FileConfig::default(), FileConfig::default(), None)
    }
}

impl Settings {
    /// Merge command line flags over the config file, with `env_key` as the
    /// last resort for the API key.
    pub fn resolve(cli: FileConfig, file: FileConfig, env_key: Option<String>) -> Settings {
        let merged = cli.overlay(file);
        let api_key = merged
            .api_key
            .filter(|k| !k.trim().is_empty())
            .or(env_key);
        Settings {
            backend: merged.backend.unwrap_or_default(),
            api_key,
            fields: merged.fields.as_ref().map(FieldList::to_spec),
            output_format: merged.output_format.unwrap_or_default(),
            output_file: merged.output_file,
            no_resolve: merged.no_resolve.unwrap_or(false),
            include_bogon: merged.include_bogon.unwrap_or(false),
            single: merged.single.unwrap_or(false),
            progress: merged.progress.unwrap_or(false),
            lang: merged.lang.unwrap_or_else(|| "en".to_string()),
            log: merged.log,
            verbose: merged.verbose.unwrap_or(false),
        }
    }

    /// The requested fields, or the backend's defaults.
    pub fn field_spec(&self) -> FieldSpec {
        self.fields
            .clone()
            .unwrap_or_else(|| FieldSpec::new(self.backend.default_fields()))
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            backend: self.backend,
            api_key: self.api_key.clone(),
            lang: self.lang.clone(),
            progress: self.progress,
        }
    }
}
