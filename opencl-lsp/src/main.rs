mod args;
mod config;
mod document_store;
mod handlers;
mod logging;

use std::io::Read;

use opencl_lsp_core::{DiagnosticsEngine, Endpoint, Opencl3Backend};

fn main() -> anyhow::Result<()> {
    let args = args::Args::parse_args()?;

    if args.display_version {
        println!("opencl-lsp {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    if args.display_help {
        print!("{}", args::HELP_TEXT);
        return Ok(());
    }

    logging::setup_logging(args.log_file.as_deref(), args.verbosity)?;
    log::info!("opencl-lsp {} starting", env!("CARGO_PKG_VERSION"));

    let endpoint = Endpoint::new();
    endpoint.register_output(|bytes| {
        use std::io::Write;
        let mut stdout = std::io::stdout().lock();
        if let Err(err) = stdout.write_all(bytes).and_then(|_| stdout.flush()) {
            log::error!("failed to write to stdout: {err}");
        }
    });

    let engine = DiagnosticsEngine::new(Box::new(Opencl3Backend));
    handlers::register_handlers(&endpoint, engine);

    run_byte_pump(endpoint);
    Ok(())
}

/// Reads stdin synchronously on a dedicated thread, feeding every byte to the endpoint.
/// Kept off the main thread so `main` stays free to join it and exit with the process
/// code a handler chose (`exit`'s handler calls `std::process::exit` directly).
fn run_byte_pump(endpoint: Endpoint) {
    let pump = std::thread::spawn(move || {
        let mut stdin = std::io::stdin().lock();
        let mut chunk = [0u8; 4096];
        loop {
            match stdin.read(&mut chunk) {
                Ok(0) => {
                    log::info!("stdin closed, shutting down");
                    break;
                }
                Ok(n) => endpoint.consume_bytes(&chunk[..n]),
                Err(err) => {
                    log::error!("error reading stdin: {err}");
                    break;
                }
            }
        }
    });

    let _ = pump.join();
}
