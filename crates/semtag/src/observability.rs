//! Structured logging for the CLI.
//!
//! Log records are written as JSON lines to a daily-rolling file. stdout is
//! reserved for command output and never receives log records; if no log
//! file can be opened, records go to stderr instead.
//!
//! The log file is chosen from, in order:
//! 1. `SEMTAG_LOG_PATH` (a file)
//! 2. `SEMTAG_LOG_DIR` (a directory)
//! 3. `log_dir` from the configuration
//! 4. `<data-local-dir>/semtag/logs`

use std::fs::OpenOptions;
use std::io::Write;

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};
use tracing::Event;
use tracing::field::{Field, Visit};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "SEMTAG_LOG_PATH";
const ENV_LOG_DIR: &str = "SEMTAG_LOG_DIR";
const LOG_FILE_SUFFIX: &str = ".jsonl";

/// Where log records should go.
#[derive(Clone, Debug, Default)]
pub struct ObservabilityConfig {
    /// `SEMTAG_LOG_PATH`, if set.
    pub log_path: Option<Utf8PathBuf>,
    /// `SEMTAG_LOG_DIR`, if set.
    pub env_log_dir: Option<Utf8PathBuf>,
    /// `log_dir` from the configuration.
    pub config_log_dir: Option<Utf8PathBuf>,
}

impl ObservabilityConfig {
    /// Read the environment, with `config_log_dir` as the next fallback.
    pub fn from_env(config_log_dir: Option<Utf8PathBuf>) -> Self {
        Self {
            log_path: env_path(ENV_LOG_PATH),
            env_log_dir: env_path(ENV_LOG_DIR),
            config_log_dir,
        }
    }
}

fn env_path(name: &str) -> Option<Utf8PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(Utf8PathBuf::from)
}

/// Keeps the background log writer alive; drop it last.
pub struct ObservabilityGuard {
    _log_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Install the global subscriber.
pub fn init_observability(
    cfg: &ObservabilityConfig,
    env_filter: EnvFilter,
) -> Result<ObservabilityGuard> {
    let (writer, guard) = match resolve_log_file(cfg) {
        Ok(file) => {
            let appender = tracing_appender::rolling::daily(&file.dir, &file.name);
            tracing_appender::non_blocking(appender)
        }
        Err(err) => {
            eprintln!("Warning: {err:#}. Logging to stderr.");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(JsonLines::new(writer))
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::debug!("observability initialized");
    Ok(ObservabilityGuard { _log_guard: guard })
}

/// The filter for this run.
///
/// `--quiet` wins over `-v`, which wins over `RUST_LOG`, which wins over the
/// configured level.
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    match (quiet, verbose) {
        (true, _) => EnvFilter::new("error"),
        (false, 1) => EnvFilter::new("debug"),
        (false, 2..) => EnvFilter::new("trace"),
        (false, 0) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
        }
    }
}

// ──────────────────────────────────────────────
// Log file resolution
// ──────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
struct LogFile {
    dir: Utf8PathBuf,
    name: String,
}

fn default_file_name() -> String {
    format!("{}{LOG_FILE_SUFFIX}", env!("CARGO_PKG_NAME"))
}

fn resolve_log_file(cfg: &ObservabilityConfig) -> Result<LogFile> {
    let file = if let Some(path) = &cfg.log_path {
        let name = path
            .file_name()
            .ok_or_else(|| anyhow!("{ENV_LOG_PATH} must name a file"))?;
        let dir = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        LogFile {
            dir: dir.to_path_buf(),
            name: name.to_string(),
        }
    } else {
        let dir = cfg
            .env_log_dir
            .clone()
            .or_else(|| cfg.config_log_dir.clone())
            .or_else(|| semtag_core::config::user_data_local_dir().map(|dir| dir.join("logs")))
            .ok_or_else(|| anyhow!("no log directory could be determined"))?;
        LogFile {
            dir,
            name: default_file_name(),
        }
    };

    ensure_writable(&file)?;
    Ok(file)
}

fn ensure_writable(file: &LogFile) -> Result<()> {
    std::fs::create_dir_all(&file.dir)
        .with_context(|| format!("cannot create log directory {}", file.dir))?;
    let path = file.dir.join(&file.name);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("cannot open log file {path}"))?;
    Ok(())
}

// ──────────────────────────────────────────────
// JSON lines layer
// ──────────────────────────────────────────────

/// Writes one JSON object per event, with the fields of every enclosing
/// span merged in.
struct JsonLines<W> {
    make_writer: W,
}

impl<W> JsonLines<W> {
    const fn new(make_writer: W) -> Self {
        Self { make_writer }
    }
}

#[derive(Clone, Debug, Default)]
struct SpanFields(Map<String, Value>);

impl<S, W> tracing_subscriber::Layer<S> for JsonLines<W>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else { return };
        let mut fields = SpanFields::default();
        attrs.record(&mut fields);
        span.extensions_mut().insert(fields);
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(fields) => values.record(fields),
            None => {
                let mut fields = SpanFields::default();
                values.record(&mut fields);
                extensions.insert(fields);
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let metadata = event.metadata();
        let mut record = SpanFields::default();
        record.insert("timestamp", Value::String(timestamp()));
        record.insert("level", Value::String(metadata.level().as_str().to_lowercase()));
        record.insert("target", Value::String(metadata.target().to_string()));

        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    record.0.extend(fields.0.clone());
                }
            }
        }
        event.record(&mut record);

        let mut writer = self.make_writer.make_writer();
        if serde_json::to_writer(&mut writer, &Value::Object(record.0)).is_ok() {
            let _ = writer.write_all(b"\n");
        }
    }
}

impl SpanFields {
    fn insert(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }
}

impl Visit for SpanFields {
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field.name(), Value::Bool(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field.name(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field.name(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(number) = serde_json::Number::from_f64(value) {
            self.insert(field.name(), Value::Number(number));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field.name(), Value::String(value.to_string()));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field.name(), Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field.name(), Value::String(format!("{value:?}")));
    }
}

/// RFC 3339 UTC timestamp.
fn timestamp() -> String {
    let mut out = String::new();
    let _ = SystemTime.format_time(&mut Writer::new(&mut out));
    out
}
