use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};

/// Clipboard writers we know how to drive, tried in order.
const HELPERS: &[&[&str]] = &[
    &["pbcopy"],
    &["wl-copy"],
    &["xclip", "-selection", "clipboard"],
];

/// Where copied text goes. Injected into [`crate::app::App`] like the chat
/// transport, so tests can substitute a recording fake or force a failure
/// without touching PATH.
pub trait Clipboard: Send + Sync {
    fn copy(&self, text: &str) -> Result<()>;
}

/// Production clipboard: pipes text to the first helper present on PATH.
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    /// The text is written exactly as given, with no trailing newline.
    fn copy(&self, text: &str) -> Result<()> {
        copy_with(HELPERS, text)
    }
}

fn copy_with(helpers: &[&[&str]], text: &str) -> Result<()> {
    let helper = helpers
        .iter()
        .find(|helper| which(helper[0]).is_some())
        .ok_or_else(|| anyhow!("No clipboard helper found (tried pbcopy, wl-copy, xclip)"))?;

    let mut child = Command::new(helper[0])
        .args(&helper[1..])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to start {}", helper[0]))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(text.as_bytes())
            .with_context(|| format!("Failed to write to {}", helper[0]))?;
    }

    let status = child
        .wait()
        .with_context(|| format!("Failed to wait for {}", helper[0]))?;
    if !status.success() {
        return Err(anyhow!("{} exited with {}", helper[0], status));
    }
    Ok(())
}

fn which(program: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Clipboard fake that records every copy, or fails on demand.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingClipboard {
    copied: std::sync::Mutex<Vec<String>>,
    fail: bool,
}

#[cfg(test)]
impl RecordingClipboard {
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::default())
    }

    /// A clipboard with no working helper behind it.
    pub fn failing() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn copied(&self) -> Vec<String> {
        self.copied.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Clipboard for RecordingClipboard {
    fn copy(&self, text: &str) -> Result<()> {
        if self.fail {
            return Err(anyhow!("no clipboard helper"));
        }
        self.copied.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
