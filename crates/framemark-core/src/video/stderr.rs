use std::io::{ErrorKind, Read};
use std::process::Child;
use std::thread::{self, JoinHandle};

/// Bytes of stderr kept for error messages.
const STDERR_TAIL: usize = 4096;

/// Read a child's stderr to EOF on a helper thread so it can never stall on a
/// full pipe. The handle yields the last [`STDERR_TAIL`] bytes.
pub(super) fn drain(child: &mut Child) -> Option<JoinHandle<String>> {
    let mut stderr = child.stderr.take()?;
    Some(thread::spawn(move || {
        let mut tail = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            match stderr.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    tail.extend_from_slice(&buf[..n]);
                    if tail.len() > STDERR_TAIL {
                        let excess = tail.len() - STDERR_TAIL;
                        tail.drain(..excess);
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }
        String::from_utf8_lossy(&tail).into_owned()
    }))
}

/// Wait for a drain thread and return what it collected.
pub(super) fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use std::process::{Command, Stdio};

    use super::*;

    #[test]
    fn keeps_only_the_tail_of_large_output() {
        let mut child = Command::new("sh")
            .args(["-c", "head -c 100000 /dev/zero >&2; printf done >&2"])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let handle = drain(&mut child);
        child.wait().unwrap();

        let text = collect(handle);
        assert_eq!(text.len(), STDERR_TAIL);
        assert!(text.ends_with("done"));
    }
}
