//! Tracing setup: console on stderr plus a log file under `~/.simroute/logs/`.

use std::io::{self, Write};
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE: &str = "simroute.log";

/// Returns the logs directory (`~/.simroute/logs/`), creating it if needed.
pub fn logs_dir() -> Option<PathBuf> {
    let dir = dirs::home_dir()?.join(".simroute").join("logs");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `verbose`. The returned guard flushes the file writer
/// on drop and must live until exit.
pub fn init(verbose: bool) -> Option<WorkerGuard> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let console = fmt::layer().with_target(false).with_writer(|| CrlfStderr);

    let (file, guard) = match logs_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();

    guard
}

/// Stderr writer that ends lines with `\r\n`.
///
/// The terminal is in raw mode while the cancel listener runs, and raw mode
/// turns off the tty's own newline translation.
pub struct CrlfStderr;

impl Write for CrlfStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut out = io::stderr().lock();
        write_crlf(&mut out, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

fn write_crlf(out: &mut impl Write, buf: &[u8]) -> io::Result<()> {
    for line in buf.split_inclusive(|b| *b == b'\n') {
        match line.strip_suffix(b"\n") {
            Some(body) => {
                out.write_all(body.strip_suffix(b"\r").unwrap_or(body))?;
                out.write_all(b"\r\n")?;
            }
            None => out.write_all(line)?,
        }
    }
    Ok(())
}
