use std::path::PathBuf;

use anyhow::bail;
use tracing_subscriber::EnvFilter;

/// 初始化日志
pub fn init_log(log: Option<PathBuf>) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let subscriber_builder = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(true);
    let (non_blocking, guard) = if let Some(log) = log {
        // output to file，daily rotate, non-blocking
        if !log.is_dir() {
            bail!("log path {} is not a directory", log.display());
        }
        let file_appender = tracing_appender::rolling::daily(log, "lms_analytics.log");
        tracing_appender::non_blocking(file_appender)
    } else {
        // output to stdout
        tracing_appender::non_blocking(std::io::stdout())
    };
    tracing::subscriber::set_global_default(
        subscriber_builder.with_writer(non_blocking).finish(),
    )?;
    Ok(guard)
}

/// Round to two decimals, the precision every percentage is reported with.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `"1h 2m"`, `"3m 20s"` or `"45s"`
pub fn format_watch_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let (h, m, s) = (total / 3600, total % 3600 / 60, total % 60);
    if h > 0 {
        format!("{h}h {m}m")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}

#[test]
fn test_round2() {
    assert_eq!(round2(200.0 / 3.0), 66.67);
    assert_eq!(round2(80.0), 80.0);
    assert_eq!(round2(0.005), 0.01);
}

#[test]
fn test_format_watch_time() {
    assert_eq!(format_watch_time(0.0), "0s");
    assert_eq!(format_watch_time(45.9), "45s");
    assert_eq!(format_watch_time(200.0), "3m 20s");
    assert_eq!(format_watch_time(3725.0), "1h 2m");
    assert_eq!(format_watch_time(-3.0), "0s");
}
