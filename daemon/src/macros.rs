//! Custom macros for reducing code repetition in wave

/// Log an error and continue execution (non-fatal error handling)
///
/// # Example
/// ```ignore
/// log_and_continue!(adapter.pause(), "pause playback");
/// ```
#[macro_export]
macro_rules! log_and_continue {
    ($expr:expr, $context:expr) => {
        if let Err(e) = $expr {
            log::error!("Failed to {}: {:#}", $context, e);
        }
    };
}

/// Validate an enum-like string value
///
/// # Example
/// ```ignore
/// validate_enum!(level, "trace", "debug", "info", "warn", "error");
/// ```
#[macro_export]
macro_rules! validate_enum {
    ($value:expr, $($variant:expr),+) => {
        match $value {
            $($variant)|+ => Ok(()),
            _ => anyhow::bail!("Invalid value: {} (expected one of: {})", $value, [$($variant),+].join(", ")),
        }
    };
}

/// Check that a numeric setting lies in an inclusive range
///
/// # Example
/// ```ignore
/// validate_range!("playback.tick_interval_ms", self.playback.tick_interval_ms, 50..=5000);
/// ```
#[macro_export]
macro_rules! validate_range {
    ($name:expr, $value:expr, $range:expr) => {{
        let range = $range;
        if !range.contains(&$value) {
            anyhow::bail!(
                "Invalid {}: {} (expected {}..={})",
                $name,
                $value,
                range.start(),
                range.end()
            );
        }
    }};
}
