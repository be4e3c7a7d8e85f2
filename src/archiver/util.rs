use anyhow::{Context, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Return the current Unix epoch in seconds.
pub fn now_epoch_secs() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Truncate `input` to at most `max_chars` Unicode characters, stripping
/// control characters and appending `…` when truncated.
pub fn truncate_with_ellipsis(input: &str, max_chars: usize) -> String {
    let clean: String = input.chars().filter(|c| !c.is_control()).collect();
    if clean.chars().count() > max_chars {
        let mut s: String = clean.chars().take(max_chars).collect();
        s.push('…');
        s
    } else {
        clean
    }
}

/// Keep only the last `max_chars` characters, joined onto one line.
pub fn tail_one_line(input: &str, max_chars: usize) -> String {
    let joined = input
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" | ");
    let count = joined.chars().count();
    if count <= max_chars {
        return truncate_with_ellipsis(&joined, max_chars);
    }
    let tail: String = joined.chars().skip(count - max_chars).collect();
    format!("…{}", truncate_with_ellipsis(&tail, max_chars))
}

#[derive(Debug)]
pub enum CommandOutcome {
    Exited {
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
    TimedOut,
}

fn read_back(mut file: File) -> String {
    let mut buf = Vec::new();
    if file.seek(SeekFrom::Start(0)).is_ok() {
        let _ = file.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// Put the child at the head of its own process group so a timeout can take
/// down wrappers like `npx` together with the browser they start.
#[cfg(unix)]
fn isolate_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
fn kill_process_tree(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = Pid::from_raw(child.id() as i32);
    if let Err(err) = killpg(pgid, Signal::SIGKILL) {
        log::debug!("killpg({pgid}) failed: {err}; killing the direct child only");
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut Child) {
    let _ = child.kill();
}

/// Run `cmd` to completion or kill it, with its whole process group, after
/// `timeout`.
///
/// Output goes to anonymous temp files rather than pipes, so a chatty child
/// (or a grandchild still holding the descriptors) can never block the wait.
pub fn run_command_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<CommandOutcome> {
    let stdout = tempfile::tempfile().context("failed to create stdout capture file")?;
    let stderr = tempfile::tempfile().context("failed to create stderr capture file")?;
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::from(stdout.try_clone()?));
    cmd.stderr(Stdio::from(stderr.try_clone()?));
    isolate_process_group(cmd);

    let mut child = cmd.spawn()?;
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(CommandOutcome::Exited {
                status,
                stdout: read_back(stdout),
                stderr: read_back(stderr),
            });
        }
        if started.elapsed() >= timeout {
            kill_process_tree(&mut child);
            let _ = child.wait();
            log::debug!("killed process group {} after {:?}", child.id(), started.elapsed());
            return Ok(CommandOutcome::TimedOut);
        }
        thread::sleep(Duration::from_millis(50));
    }
}
