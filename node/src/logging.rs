use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

/// Colorized stdout plus a date-rotated file sink under `logs_path`
/// (SPEC_FULL §2 [AMBIENT]), grounded in the `fern` feature set the
/// workspace already declares (`colored`, `date-based`).
pub fn init(level: &str, logs_path: &str) -> anyhow::Result<()> {
    let level = level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    std::fs::create_dir_all(logs_path)?;
    let file_prefix = format!("{}/ferrochain-node.", logs_path.trim_end_matches('/'));

    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .chain(fern::DateBased::new(file_prefix, "%Y-%m-%d.log"))
        .apply()?;
    Ok(())
}
