use dotenvy::dotenv;
use regex::Regex;
use slack_relay_core::config::RelaySettings;
use slack_relay_transport_slack::config::{BotSettings, SlackSettings};
use slack_relay_transport_slack::run_relay;
use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Credential patterns masked in every log line, with their replacements
struct SecretMask {
    rules: Vec<(Regex, &'static str)>,
}

impl SecretMask {
    /// Compile the Slack credential patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            rules: vec![
                (Regex::new(r"xox[abpr]-[A-Za-z0-9-]+")?, "[SLACK_TOKEN]"),
                (Regex::new(r"xapp-[A-Za-z0-9-]+")?, "[SLACK_APP_TOKEN]"),
                (Regex::new(r"(?i)(bearer\s+)[A-Za-z0-9._-]+")?, "${1}[MASKED]"),
                (
                    Regex::new(r"(?i)(slack_signing_secret\s*[=:]\s*)[^\s&,]+")?,
                    "${1}[MASKED]",
                ),
            ],
        })
    }

    /// Apply every rule; borrows the input when nothing matched.
    fn mask<'a>(&self, line: &'a str) -> Cow<'a, str> {
        let mut out = Cow::Borrowed(line);
        for (pattern, replacement) in &self.rules {
            let masked = match pattern.replace_all(&out, *replacement) {
                Cow::Owned(masked) => Some(masked),
                Cow::Borrowed(_) => None,
            };
            if let Some(masked) = masked {
                out = Cow::Owned(masked);
            }
        }
        out
    }
}

/// Stderr handle that masks credentials before writing.
struct MaskedStderr {
    stderr: io::Stderr,
    mask: Arc<SecretMask>,
}

impl Write for MaskedStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let line = String::from_utf8_lossy(buf);
        self.stderr.write_all(self.mask.mask(&line).as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stderr.flush()
    }
}

/// `MakeWriter` handing out [`MaskedStderr`] writers.
struct MaskedStderrWriter {
    mask: Arc<SecretMask>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for MaskedStderrWriter {
    type Writer = MaskedStderr;

    fn make_writer(&'a self) -> Self::Writer {
        MaskedStderr {
            stderr: io::stderr(),
            mask: Arc::clone(&self.mask),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Patterns must exist before the first log line
    let mask = Arc::new(SecretMask::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(mask);

    info!("Starting Slack relay...");

    let settings = init_settings();

    if let Err(e) = run_relay(settings).await {
        error!("Slack relay exited with error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(mask: Arc<SecretMask>) {
    let make_writer = MaskedStderrWriter { mask };

    let debug_mode = std::env::var("DEBUG_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let filter = if debug_mode {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "slack_relay_bot=info,slack_relay_core=info,slack_relay_runtime=info,slack_relay_transport_slack=info,hyper=warn,h2=error,reqwest=warn,tokio=warn,tower=warn,axum=warn",
            )
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<BotSettings> {
    let relay_settings = match RelaySettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load relay configuration: {}", e);
            std::process::exit(1);
        }
    };
    let slack_settings = match SlackSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load Slack configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration loaded successfully.");
    Arc::new(BotSettings::new(relay_settings, slack_settings))
}
