use std::process::{Command, Stdio};

/// True when a process whose image name starts with `name` is running.
/// Linux only; other platforms report false and the caller skips the
/// close-the-game prompt.
#[cfg(target_os = "linux")]
pub fn is_running(name: &str) -> bool {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return false;
    };
    let needle = name.to_ascii_lowercase();
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let pid = file_name.to_string_lossy();
        if pid.is_empty() || !pid.bytes().all(|byte| byte.is_ascii_digit()) {
            continue;
        }
        // comm is truncated to 15 bytes, so prefix-match the name.
        let Ok(comm) = std::fs::read_to_string(entry.path().join("comm")) else {
            continue;
        };
        if comm.trim().to_ascii_lowercase().starts_with(&needle) {
            return true;
        }
    }
    false
}

#[cfg(not(target_os = "linux"))]
pub fn is_running(_name: &str) -> bool {
    false
}

/// Terminates every matching process. Only called after the user has
/// explicitly agreed.
pub fn kill(name: &str) -> bool {
    Command::new("pkill")
        .arg("-9")
        .arg(name)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonexistent_process_is_not_running() {
        assert!(!is_running("palsmith-no-such-process"));
    }
}
