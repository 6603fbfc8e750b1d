use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

/// Install the global logger at `level`.
///
/// `RUST_LOG` directives, when set, are applied on top, so single modules can be turned up
/// without changing the command line.
pub fn init_logger(level: LevelFilter) {
    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .filter_level(level)
        // actix and reqwest are chatty at debug level
        .filter_module("actix_server", level.min(LevelFilter::Info))
        .filter_module("reqwest", level.min(LevelFilter::Info))
        .parse_env(Env::default());

    if builder.try_init().is_err() {
        log::warn!("Logger already initialized");
    }
}

/// Level named on the command line; unknown names fall back to `info`
pub fn get_log_level(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or(LevelFilter::Info)
}
