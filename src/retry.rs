use std::fmt::Display;
use std::io;
use std::thread;
use std::time::Duration;
use tracing::warn;

const BACKOFF_STEP: Duration = Duration::from_millis(100);

/// Errors that may succeed when the same operation is simply tried again.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for io::Error {
    fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            io::ErrorKind::Interrupted
                | io::ErrorKind::TimedOut
                | io::ErrorKind::WouldBlock
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::ConnectionRefused
                | io::ErrorKind::BrokenPipe
        )
    }
}

/// Runs `op` up to `retries + 1` times, retrying only transient failures.
pub fn with_retry<T, E, F>(retries: u32, what: &str, mut op: F) -> Result<T, E>
where
    E: Transient + Display,
    F: FnMut() -> Result<T, E>,
{
    let mut attempt = 0u32;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < retries => {
                attempt += 1;
                warn!(%err, attempt, retries, "{what} failed, retrying");
                thread::sleep(BACKOFF_STEP * attempt);
            }
            Err(err) => return Err(err),
        }
    }
}
