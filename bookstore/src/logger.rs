use std::{fmt::Write, io::IsTerminal, str::FromStr};

use anyhow::Context;
use jiff::{Zoned, tz::TimeZone};
use log::{LevelFilter, Record};
use logforth::{
    append::Stdout,
    filter::EnvFilter,
    layout::{JsonLayout, Layout},
};

use crate::args::{Args, LogStyle};

const SERVICE_CRATES: [&str; 5] = ["bookstore", "server", "identity", "telemetry", "config"];

/// One line per record: UTC timestamp, level, emitting module and message.
#[derive(Debug, Clone, Copy)]
struct LineLayout {
    color: bool,
}

impl Layout for LineLayout {
    fn format(
        &self,
        record: &Record<'_>,
        _diagnostics: &[Box<dyn logforth::diagnostic::Diagnostic>],
    ) -> anyhow::Result<Vec<u8>> {
        let mut output = String::new();
        let now = Zoned::now().with_time_zone(TimeZone::UTC);

        write!(output, "{} ", now.strftime("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = record.level();

        if self.color {
            let code = match level {
                log::Level::Error => 31,
                log::Level::Warn => 33,
                log::Level::Info => 32,
                log::Level::Debug => 34,
                log::Level::Trace => 35,
            };

            write!(output, "\x1b[{code}m{level:>5}\x1b[0m ")?;
        } else {
            write!(output, "{level:>5} ")?;
        }

        write!(output, "{}: {}", record.target(), record.args())?;

        Ok(output.into_bytes())
    }
}

fn env_filter(level: LevelFilter) -> anyhow::Result<EnvFilter> {
    let directives = match level {
        LevelFilter::Off => "off".to_string(),
        level => {
            let level = level.as_str().to_lowercase();

            SERVICE_CRATES
                .iter()
                .fold(String::from("warn"), |acc, name| format!("{acc},{name}={level}"))
        }
    };

    EnvFilter::from_str(&directives).with_context(|| format!("invalid log filter `{directives}`"))
}

pub(super) fn init(args: &Args) -> anyhow::Result<()> {
    let filter = env_filter(args.log_level)?;

    let style = args.log_style.unwrap_or(if std::io::stdout().is_terminal() {
        LogStyle::Color
    } else {
        LogStyle::Text
    });

    logforth::builder()
        .dispatch(|d| {
            let d = d.filter(filter);

            match style {
                LogStyle::Color => d.append(Stdout::default().with_layout(LineLayout { color: true })),
                LogStyle::Text => d.append(Stdout::default().with_layout(LineLayout { color: false })),
                LogStyle::Json => d.append(Stdout::default().with_layout(JsonLayout::default())),
            }
        })
        .apply();

    Ok(())
}
