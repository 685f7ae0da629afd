//! Logging setup for the fan controller

use fern::colors::{Color, ColoredLevelConfig};
use fern::Dispatch;
use log::{Level, LevelFilter};

/// Glyph prefixed to log lines reporting a completed step
pub const SUCCESS_GLYPH: &str = "\u{2713}";

/// Map the 0-4 verbosity scale onto a level filter.
///
/// `log` has no critical level, so 0 silences logging entirely; fatal
/// errors still reach stderr through the binary.
pub fn level_filter(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

/// Status glyph shown in front of each message
pub fn level_glyph(level: Level) -> &'static str {
    match level {
        Level::Error => "\u{2622}", // ☢
        Level::Warn => "\u{2192}",  // →
        Level::Info => "\u{259E}",  // ▞
        Level::Debug => "\u{26A1}", // ⚡
        Level::Trace => "\u{00B7}", // ·
    }
}

/// Setup logging with the specified verbosity level
pub fn setup(verbosity: u8) -> Result<(), fern::InitError> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Cyan)
        .debug(Color::Yellow)
        .trace(Color::White);

    Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} {} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                level_glyph(record.level()),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level_filter(verbosity))
        .chain(std::io::stdout())
        .apply()?;

    Ok(())
}
