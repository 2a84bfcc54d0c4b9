use anyhow::{Context, Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use chickadee::config::{self, FileConfig, FieldList, Settings};
use chickadee::{build_resolver, write_report, Backend, Chickadee, OutputFormat};

/// Check if the error chain contains a broken pipe error.
#[inline(always)]
fn is_broken_pipe(err: &Error) -> bool {
    for cause in err.chain() {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::BrokenPipe {
                return true;
            }
        }
    }
    false
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// An IP address, a comma separated list of addresses, or a path to a
    /// file or directory to scan (plain text or gzip). Leave empty or use
    /// "-" to read from stdin
    #[clap(value_name = "DATA")]
    data: Vec<String>,

    /// Comma separated fields to query and report
    #[clap(short, long, value_name = "FIELDS")]
    fields: Option<String>,

    /// Output format [default: jsonl]
    #[clap(short = 't', long, value_enum)]
    output_format: Option<OutputFormat>,

    /// Path to file to write output to instead of stdout
    #[clap(short = 'w', long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    output_file: Option<Utf8PathBuf>,

    /// Only extract and count addresses, don't resolve them
    #[clap(short, long)]
    no_resolve: bool,

    /// Use the slower single item API, which adds reverse DNS
    #[clap(short, long)]
    single: bool,

    /// Include private, reserved and multicast addresses
    #[clap(short = 'b', long)]
    include_bogon: bool,

    /// Response language, falls back to the service default when unsupported
    #[clap(long)]
    lang: Option<String>,

    /// Resolution service [default: ip_api]
    #[clap(long, value_enum)]
    backend: Option<Backend>,

    /// API key; ip_api switches to the pro endpoint when one is set. Falls
    /// back to the config file, then CHICKADEE_API_KEY
    #[clap(long, value_name = "KEY")]
    api_key: Option<String>,

    /// Path to a YAML config file to load instead of searching for one
    #[clap(short, long, value_name = "FILE", env = "CHICKADEE_CONFIG", value_hint = clap::ValueHint::FilePath)]
    config: Option<Utf8PathBuf>,

    /// Show a progress bar while resolving
    #[clap(short, long)]
    progress: bool,

    /// Include debug log messages
    #[clap(short, long)]
    verbose: bool,

    /// Also append log messages to this file
    #[clap(short, long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    log: Option<Utf8PathBuf>,

    /// List the fields the selected backend supports and exit
    #[clap(long)]
    list_fields: bool,
}

impl Args {
    /// Flags given on the command line, as the top configuration layer.
    fn overrides(&self) -> FileConfig {
        FileConfig {
            backend: self.backend,
            api_key: self.api_key.clone(),
            fields: self.fields.clone().map(FieldList::Joined),
            output_format: self.output_format,
            output_file: self.output_file.clone(),
            no_resolve: self.no_resolve.then_some(true),
            include_bogon: self.include_bogon.then_some(true),
            single: self.single.then_some(true),
            progress: self.progress.then_some(true),
            lang: self.lang.clone(),
            log: self.log.clone(),
            verbose: self.verbose.then_some(true),
        }
    }
}

fn main() -> ExitCode {
    let err = match run_main() {
        Ok(code) => return code,
        Err(err) => err,
    };

    if is_broken_pipe(&err) {
        return ExitCode::SUCCESS;
    }

    if std::env::var("RUST_BACKTRACE").is_ok_and(|v| v == "1")
        && std::env::var("RUST_LIB_BACKTRACE").map_or(true, |v| v == "1")
    {
        let _ = writeln!(&mut io::stderr(), "{:?}", err);
    } else {
        let _ = writeln!(&mut io::stderr(), "{:#}", err);
    }

    ExitCode::FAILURE
}

fn load_config(explicit: Option<&Utf8Path>) -> Result<FileConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match config::discover() {
            Some(path) => path,
            None => return Ok(FileConfig::default()),
        },
    };
    FileConfig::load(&path).with_context(|| format!("failed to load config file {}", path))
}

/// Stderr at `info` (`debug` when verbose) unless `RUST_LOG` says otherwise,
/// plus a plain text debug log when `log` is set.
fn init_logging(verbose: bool, log: Option<&Utf8Path>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(env_filter);

    let file_layer = match log {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_filter(EnvFilter::new("debug")),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

fn run_main() -> Result<ExitCode> {
    let args = Args::parse();

    let file_config = load_config(args.config.as_deref())?;
    let settings = Settings::resolve(args.overrides(), file_config, config::api_key_from_env());
    init_logging(settings.verbose, settings.log.as_deref())?;
    debug!(
        backend = settings.backend.name(),
        format = ?settings.output_format,
        no_resolve = settings.no_resolve,
        include_bogon = settings.include_bogon,
        single = settings.single,
        lang = %settings.lang,
        api_key = settings.api_key.is_some(),
        "starting chickadee"
    );

    if args.list_fields {
        let defaults = settings.backend.default_fields();
        let mut out = io::stdout().lock();
        writeln!(out, "Fields supported by '{}' (* = default):", settings.backend.name())?;
        for field in settings.backend.supported_fields() {
            let mark = if defaults.contains(field) { "*" } else { " " };
            writeln!(out, "{} {}", mark, field)?;
        }
        return Ok(ExitCode::SUCCESS);
    }

    let fields = settings.field_spec();
    let mut run = Chickadee::new(fields.clone())
        .include_bogons(settings.include_bogon)
        .single(settings.single);
    if !settings.no_resolve {
        // Key problems surface before any input is read or request is sent.
        run = run.with_resolver(build_resolver(&settings.resolver_options())?);
    }

    let records = run.run(&args.data)?;

    match &settings.output_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create output file {}", path))?;
            write_report(BufWriter::new(file), &records, &fields, settings.output_format)?;
            info!(%path, records = records.len(), "report written");
        }
        None => {
            let out = BufWriter::with_capacity(65536, io::stdout().lock());
            write_report(out, &records, &fields, settings.output_format)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
