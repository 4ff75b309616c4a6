use std::path::Path;

use anyhow::anyhow;
use log::LevelFilter;

/// Verbosity scheme: 0 -> Warn, 1 -> Info, 2 -> Debug, 3+ -> Trace.
/// `OPENCL_LSP_LOG` overrides the computed level when set, for ad-hoc debugging.
pub fn setup_logging(log_file: Option<&Path>, verbosity: u64) -> anyhow::Result<()> {
    let dispatch = fern::Dispatch::new()
        .level(log_level(verbosity)?)
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} {} [{}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.target(),
                record.level(),
                message
            ))
        });

    let dispatch = match log_file {
        Some(path) => dispatch.chain(fern::log_file(path)?),
        None => dispatch.chain(std::io::stderr()),
    };

    dispatch.apply().map_err(|error| anyhow!(error))
}

fn log_level(verbosity: u64) -> anyhow::Result<LevelFilter> {
    if let Ok(env_level) = std::env::var("OPENCL_LSP_LOG") {
        return env_level.parse::<LevelFilter>().map_err(|error| anyhow!(error));
    }

    Ok(match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    })
}
