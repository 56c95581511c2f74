use std::fmt;
use tracing::{Level, Subscriber};
use tracing_subscriber::{
    fmt::{
        self as fmt_subscriber, format::Writer, time::FormatTime, FmtContext, FormatEvent,
        FormatFields,
    },
    registry::LookupSpan,
    EnvFilter,
};

/// Event formatter that tags each line with the module it came from
pub struct ComponentFormatter {
    timer: fmt_subscriber::time::SystemTime,
    ansi: bool,
}

impl ComponentFormatter {
    pub fn new(ansi: bool) -> Self {
        Self {
            timer: fmt_subscriber::time::SystemTime,
            ansi,
        }
    }

    fn paint(&self, writer: &mut Writer<'_>, color: &str, text: &str) -> fmt::Result {
        if self.ansi {
            write!(writer, "\x1b[{}m{}\x1b[0m", color, text)
        } else {
            write!(writer, "{}", text)
        }
    }
}

impl<S, N> FormatEvent<S, N> for ComponentFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        self.timer.format_time(&mut writer)?;
        writer.write_char(' ')?;

        let level = *event.metadata().level();
        let color = match level {
            Level::ERROR => "31",
            Level::WARN => "33",
            Level::INFO => "32",
            Level::DEBUG => "34",
            Level::TRACE => "90",
        };
        self.paint(&mut writer, color, level.as_str())?;
        writer.write_char(' ')?;

        if let Some(component) = event.metadata().target().split("::").last() {
            self.paint(&mut writer, "36", &format!("[{}]", component))?;
            writer.write_char(' ')?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Installs the global subscriber, logging to standard error.
///
/// Standard output carries protocol messages and must stay clean.
pub fn init_logging(filter: &str, ansi: bool) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|e| {
        eprintln!("Warning: invalid log filter {:?} ({}), using info", filter, e);
        EnvFilter::new("info")
    });

    let subscriber = fmt_subscriber::Subscriber::builder()
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_env_filter(env_filter)
        .event_format(ComponentFormatter::new(ansi))
        .try_init();

    if subscriber.is_err() {
        eprintln!("Warning: Failed to initialize logging, it might already be initialized");
    }
}
