//! Logging setup with identifier scrubbing.
//!
//! Platform authenticators put sensor ids, enrollment ids and similar device-specific
//! values into their error strings. The formatter installed here masks them before a
//! line is written, so diagnostic logs from the capability check and the challenge
//! callbacks can be shared without leaking device identity. Every BioAuth binary
//! installs logging through [`LoggerBuilder`].

use chrono::{SecondsFormat, Utc};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::fmt::{self, Write};
use std::sync::OnceLock;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{FormatFields, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::BioAuthConfig;

const IDENTIFIER_FIELDS: &[&str] = &[
    "sensor_id",
    "sensor-id",
    "device_id",
    "device-id",
    "enrollment_id",
    "enrollment-id",
    "template_id",
    "template-id",
    "user_id",
    "user-id",
    "serial",
];

const MASK: &str = "[SCRUBBED]";

/// Builder for installing the scrubbing tracing subscriber.
pub struct LoggerBuilder {
    level: tracing::Level,
    include_timestamp: bool,
    include_target: bool,
}

impl LoggerBuilder {
    pub fn new(level: tracing::Level) -> Self {
        Self {
            level,
            include_timestamp: true,
            include_target: true,
        }
    }

    /// Start from the `[logging]` section of a loaded configuration.
    pub fn from_config(config: &BioAuthConfig) -> crate::Result<Self> {
        Ok(Self::new(config.log_level()?)
            .include_timestamp(config.logging.include_timestamp)
            .include_target(config.logging.include_target))
    }

    pub fn include_timestamp(mut self, include: bool) -> Self {
        self.include_timestamp = include;
        self
    }

    /// Whether the target (e.g. `BiometricAuth`) is rendered (default: true).
    pub fn include_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }

    /// Install globally, writing to stderr. `RUST_LOG`, when set, takes precedence over
    /// the configured level.
    pub fn init(self) -> Result<(), tracing_subscriber::util::TryInitError> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.to_string()));
        let formatter = ScrubbingFormatter {
            include_timestamp: self.include_timestamp,
            include_target: self.include_target,
        };

        tracing_subscriber::util::SubscriberInitExt::try_init(
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(self.include_target)
                .event_format(formatter),
        )?;

        Ok(())
    }
}

fn identifier_rules() -> &'static [Regex; 2] {
    static RULES: OnceLock<[Regex; 2]> = OnceLock::new();
    RULES.get_or_init(|| {
        let keys = IDENTIFIER_FIELDS
            .iter()
            .map(|value| regex::escape(value))
            .collect::<Vec<_>>()
            .join("|");
        [
            Regex::new(&format!(
                r#"(?i)(?P<key>\b(?:{keys})\b)(?P<sep>\s*[:=]\s*)(?P<value>"[^"]*"|'[^']*'|[^\s,;]+)"#,
                keys = keys
            ))
            .expect("invalid identifier regex"),
            // Long hex or decimal runs that look like hardware identifiers.
            Regex::new(r"\b(?:0x)?[0-9A-Fa-f]{16,}\b").expect("invalid hex regex"),
        ]
    })
}

/// Mask device identifiers in a log line, borrowing when nothing matched.
pub fn scrub_identifiers(input: &str) -> Cow<'_, str> {
    let [keyed, bare] = identifier_rules();

    let keyed_pass = if keyed.is_match(input) {
        Cow::Owned(
            keyed
                .replace_all(input, |caps: &Captures| {
                    format!("{}{}{}", &caps["key"], &caps["sep"], MASK)
                })
                .into_owned(),
        )
    } else {
        Cow::Borrowed(input)
    };

    if !bare.is_match(keyed_pass.as_ref()) {
        return keyed_pass;
    }
    Cow::Owned(bare.replace_all(keyed_pass.as_ref(), MASK).into_owned())
}

#[derive(Default)]
struct EventFieldCollector {
    message: Option<String>,
    fields: Vec<(String, String)>,
}

impl EventFieldCollector {
    fn record_value(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl Visit for EventFieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_value(field, format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_value(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_value(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_value(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_value(field, value.to_string());
    }
}

#[derive(Clone)]
struct ScrubbingFormatter {
    include_timestamp: bool,
    include_target: bool,
}

impl ScrubbingFormatter {
    fn render(&self, level: &tracing::Level, target: &str, collector: EventFieldCollector) -> String {
        let mut line = String::new();

        if self.include_timestamp {
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            let _ = write!(line, "{} ", now);
        }

        let _ = write!(line, "{:<5} ", level);
        if self.include_target {
            let _ = write!(line, "{}: ", target);
        }

        if let Some(message) = collector.message.as_ref() {
            line.push_str(message);
        }

        for (key, value) in collector.fields {
            if !line.ends_with(' ') {
                line.push(' ');
            }
            let _ = write!(line, "{}={}", key, value);
        }

        scrub_identifiers(&line).into_owned()
    }
}

impl<S, N> FormatEvent<S, N> for ScrubbingFormatter
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut collector = EventFieldCollector::default();
        event.record(&mut collector);

        let metadata = event.metadata();
        let line = self.render(metadata.level(), metadata.target(), collector);
        writer.write_str(&line)?;
        writer.write_char('\n')
    }
}
