use std::fmt;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// ANSI color codes for console output
const COLOR_RESET: &str = "\x1b[0m";
const COLOR_CYAN: &str = "\x1b[36m";
const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_BRIGHT_YELLOW: &str = "\x1b[93m";
const COLOR_BRIGHT_RED: &str = "\x1b[91m";
const COLOR_BRIGHT_GRAY: &str = "\x1b[90m";

/// Column widths for alignment
const SERVICE_NAME_WIDTH: usize = 16;
const LOG_LEVEL_WIDTH: usize = 7;

/// `[timestamp] [service/component] [level] message` formatter
pub struct RipLogFormatter {
    service_name: String,
    color_enabled: bool,
}

/// Log at info with a `component` tag
#[macro_export]
macro_rules! component_info {
    ($component:expr, $($arg:tt)*) => {
        tracing::info!(component = $component, $($arg)*)
    };
}

/// Log at warn with a `component` tag
#[macro_export]
macro_rules! component_warn {
    ($component:expr, $($arg:tt)*) => {
        tracing::warn!(component = $component, $($arg)*)
    };
}

impl RipLogFormatter {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            color_enabled: is_terminal(),
        }
    }

    fn format_service_name(&self, component: Option<&str>) -> String {
        let name = match component {
            Some(comp) => format!("{}-{}", self.service_name, comp),
            None => self.service_name.clone(),
        };

        if name.chars().count() > SERVICE_NAME_WIDTH {
            let truncated: String = name.chars().take(SERVICE_NAME_WIDTH - 1).collect();
            format!("{}…", truncated)
        } else {
            format!("{:<width$}", name, width = SERVICE_NAME_WIDTH)
        }
    }

    fn format_log_level(&self, level: &tracing::Level) -> String {
        let level_str = match *level {
            tracing::Level::ERROR => "✗ ERROR",
            tracing::Level::WARN => "⚠ WARN",
            tracing::Level::INFO => "ℹ INFO",
            tracing::Level::DEBUG => "◦ DEBUG",
            tracing::Level::TRACE => "◦ TRACE",
        };

        // +2 for the icon
        format!("{:<width$}", level_str, width = LOG_LEVEL_WIDTH + 2)
    }

    fn color_for_level(&self, level: &tracing::Level) -> &'static str {
        if !self.color_enabled {
            return "";
        }

        match *level {
            tracing::Level::ERROR => COLOR_BRIGHT_RED,
            tracing::Level::WARN => COLOR_BRIGHT_YELLOW,
            tracing::Level::INFO => COLOR_GREEN,
            tracing::Level::DEBUG | tracing::Level::TRACE => COLOR_BRIGHT_GRAY,
        }
    }
}

impl<S, N> FormatEvent<S, N> for RipLogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let level = event.metadata().level();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let service = self.format_service_name(visitor.component.as_deref());
        let formatted_level = self.format_log_level(level);

        let color = self.color_for_level(level);
        let reset = if self.color_enabled { COLOR_RESET } else { "" };
        let cyan = if self.color_enabled { COLOR_CYAN } else { "" };

        write!(
            writer,
            "{}[{}] [{}] [{}{}{}] ",
            cyan, timestamp, service, color, formatted_level, reset
        )?;
        writeln!(writer, "{}{}", visitor.message, reset)
    }
}

/// Pulls `message` and `component` out of an event
#[derive(Default)]
struct FieldVisitor {
    message: String,
    component: Option<String>,
}

fn strip_quotes(s: String) -> String {
    match s.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
        Some(inner) => inner.to_string(),
        None => s,
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = strip_quotes(format!("{:?}", value)),
            "component" => self.component = Some(strip_quotes(format!("{:?}", value))),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "component" => self.component = Some(value.to_string()),
            _ => {}
        }
    }
}

/// Check if we're outputting to a terminal (for color support)
fn is_terminal() -> bool {
    match std::env::var("TERM") {
        Ok(term) => term != "dumb",
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name_padding() {
        let formatter = RipLogFormatter {
            service_name: "rip".to_string(),
            color_enabled: false,
        };
        assert_eq!(formatter.format_service_name(None), format!("{:<16}", "rip"));
        assert_eq!(
            formatter.format_service_name(Some("network")).trim_end(),
            "rip-network"
        );
        let long = formatter.format_service_name(Some("a-very-long-component"));
        assert_eq!(long.chars().count(), SERVICE_NAME_WIDTH);
        assert!(long.ends_with('…'));
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"hello\"".to_string()), "hello");
        assert_eq!(strip_quotes("plain".to_string()), "plain");
    }
}
