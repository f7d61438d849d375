//! Stdin command source for loopback runs.
//!
//! Each line is `<topic> <payload>`; the payload is the rest of the line.
//! Blank lines and lines starting with `#` are skipped.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use transport::LoopbackBus;

/// Split a console line into topic and payload
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    match line.split_once(char::is_whitespace) {
        Some((topic, payload)) => Some((topic, payload.trim_start())),
        None => Some((line, "")),
    }
}

/// Forward stdin lines into the bus until EOF
pub fn spawn_console(bus: LoopbackBus) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("reading control messages from stdin as '<topic> <payload>'");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let Some((topic, payload)) = parse_line(&line) else {
                        continue;
                    };
                    if !bus.inject(topic, payload.to_string()).await {
                        warn!(topic = %topic, "no subscription for console topic");
                    }
                }
                Ok(None) => {
                    debug!("stdin closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "failed to read stdin");
                    break;
                }
            }
        }
    })
}
