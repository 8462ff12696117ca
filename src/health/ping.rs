//! ICMP echo fallback via the system `ping` binary

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Extra time allowed on top of ping's own wait before the process is killed
const PROCESS_GRACE: Duration = Duration::from_secs(1);

/// Build the argument list for a single echo request on the given OS.
///
/// Windows takes a count of `-n` and a wait in milliseconds; the BSD family
/// takes `-c` and an overall `-t` timeout in seconds; Linux and other Unix
/// variants take `-c` and a `-W` reply wait in seconds.
pub fn ping_args(os: &str, host: &str, wait: Duration) -> Vec<String> {
    let wait_ms = wait.as_millis().max(1);
    let wait_secs = wait_ms.div_ceil(1000).max(1);

    let mut args: Vec<String> = match os {
        "windows" => vec!["-n".into(), "1".into(), "-w".into(), wait_ms.to_string()],
        "macos" | "ios" | "freebsd" | "dragonfly" => {
            vec!["-c".into(), "1".into(), "-t".into(), wait_secs.to_string()]
        }
        _ => vec!["-c".into(), "1".into(), "-W".into(), wait_secs.to_string()],
    };
    args.push(host.to_string());
    args
}

/// Send one echo request to `host`; true only if ping exits successfully
pub async fn ping_once(host: &str, wait: Duration) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');

    // Hosts come from untrusted descriptors and must never be read as flags.
    if host.is_empty() || host.starts_with('-') {
        return false;
    }

    let mut cmd = Command::new("ping");
    cmd.args(ping_args(std::env::consts::OS, host, wait))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    match timeout(wait + PROCESS_GRACE, cmd.status()).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(e)) => {
            debug!("ping {} could not run: {}", host, e);
            false
        }
        Err(_) => {
            debug!("ping {} timed out", host);
            false
        }
    }
}
