pub mod pager;

pub use pager::{Pager, SystemPager};

use std::io::{ErrorKind, Write};

use thiserror::Error;
use tracing::{debug, instrument};

use crate::color::ColorMode;

const GREEN: &[u8] = b"\x1b[32m";
const RED: &[u8] = b"\x1b[31m";
const RESET: &[u8] = b"\x1b[m";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write output: {0}")]
    Write(#[from] std::io::Error),

    #[error("failed to start pager \"{command}\": {source}")]
    PagerLaunch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("pager \"{command}\" exited with {status}")]
    PagerExit { command: String, status: String },
}

/// Where the diff is going and what the terminal looks like.
#[derive(Debug, Clone, Default)]
pub struct OutputTarget {
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
    /// Pager command; `None` or blank disables paging
    pub pager: Option<String>,
}

/// The delivery path chosen for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Not a terminal: bytes go out exactly as received.
    Verbatim,
    /// Terminal without a pager.
    Direct,
    /// Terminal with a pager command.
    Paged(String),
}

impl OutputTarget {
    pub fn route(&self) -> Route {
        if !self.stdout_is_tty {
            return Route::Verbatim;
        }
        match self.pager.as_deref().map(str::trim) {
            Some(command) if !command.is_empty() => Route::Paged(command.to_string()),
            _ => Route::Direct,
        }
    }
}

/// Write the diff to `out`, or through `pager`, according to the target.
#[instrument(skip_all, fields(bytes = diff.len(), color = ?color))]
pub async fn write_diff(
    diff: &[u8],
    color: ColorMode,
    target: &OutputTarget,
    out: &mut (dyn Write + Send),
    pager: &dyn Pager,
) -> Result<(), OutputError> {
    let route = target.route();
    debug!(?route, stderr_is_tty = target.stderr_is_tty, "routing diff output");

    match route {
        Route::Verbatim => write_all(out, diff),
        Route::Direct if color.enabled() => write_all(out, &colorize(diff)),
        Route::Direct => write_all(out, diff),
        Route::Paged(command) => {
            let content = if color.enabled() {
                colorize(diff)
            } else {
                diff.to_vec()
            };
            pager.page(&command, &content, out).await
        }
    }
}

/// A closed stdout (e.g. `| head`) ends output quietly.
fn write_all(out: &mut (dyn Write + Send), bytes: &[u8]) -> Result<(), OutputError> {
    match out.write_all(bytes).and_then(|()| out.flush()) {
        Err(err) if err.kind() == ErrorKind::BrokenPipe => Ok(()),
        other => Ok(other?),
    }
}

/// Wrap added lines in green and removed lines in red.
///
/// Only the line prefix is inspected: `+`/`-` lines are colored unless they
/// are `+++`/`---` file headers. Line terminators stay outside the escape
/// sequences, so stripping the escapes gives back the input exactly.
pub fn colorize(diff: &[u8]) -> Vec<u8> {
    let mut colored = Vec::with_capacity(diff.len() + diff.len() / 4);
    for line in diff.split_inclusive(|&b| b == b'\n') {
        let (content, ending) = split_line_ending(line);
        match line_color(content) {
            Some(color) => {
                colored.extend_from_slice(color);
                colored.extend_from_slice(content);
                colored.extend_from_slice(RESET);
                colored.extend_from_slice(ending);
            }
            None => colored.extend_from_slice(line),
        }
    }
    colored
}

fn split_line_ending(line: &[u8]) -> (&[u8], &[u8]) {
    if line.ends_with(b"\r\n") {
        line.split_at(line.len() - 2)
    } else if line.ends_with(b"\n") {
        line.split_at(line.len() - 1)
    } else {
        (line, &[][..])
    }
}

fn line_color(line: &[u8]) -> Option<&'static [u8]> {
    if line.starts_with(b"+") && !line.starts_with(b"+++") {
        Some(GREEN)
    } else if line.starts_with(b"-") && !line.starts_with(b"---") {
        Some(RED)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::pager::RecordingPager;
    use super::*;

    const DIFF: &str = "diff --git a/Makefile b/Makefile
--- a/Makefile
+++ b/Makefile
@@ -22,8 +22,8 @@ test:
 .PHONY: test
-site:
+site: bin/gh
 site-docs: site
";

    fn target(stdout_is_tty: bool, pager: Option<&str>) -> OutputTarget {
        OutputTarget {
            stdout_is_tty,
            stderr_is_tty: stdout_is_tty,
            pager: pager.map(str::to_string),
        }
    }

    #[test]
    fn test_colorize_wraps_changed_lines() {
        let colored = String::from_utf8(colorize(DIFF.as_bytes())).unwrap();
        assert!(colored.contains("\x1b[32m+site: bin/gh\x1b[m\n"));
        assert!(colored.contains("\x1b[31m-site:\x1b[m\n"));
        assert!(colored.contains("\n--- a/Makefile\n+++ b/Makefile\n"));
        assert!(colored.contains("\n site-docs: site\n"));
    }

    #[test]
    fn test_colorize_keeps_line_endings() {
        assert_eq!(colorize(b"+a\r\n-b"), b"\x1b[32m+a\x1b[m\r\n\x1b[31m-b\x1b[m".to_vec());
        assert!(colorize(b"").is_empty());
        assert_eq!(colorize(b"\n\n"), b"\n\n".to_vec());
    }

    #[test]
    fn test_route_selection() {
        assert_eq!(target(false, Some("less")).route(), Route::Verbatim);
        assert_eq!(target(true, None).route(), Route::Direct);
        assert_eq!(target(true, Some("  ")).route(), Route::Direct);
        assert_eq!(target(true, Some(" less -R ")).route(), Route::Paged("less -R".to_string()));
    }

    #[tokio::test]
    async fn test_not_a_terminal_is_verbatim_even_with_color() {
        let pager = RecordingPager::default();
        let mut out = Vec::new();
        write_diff(DIFF.as_bytes(), ColorMode::Always, &target(false, Some("less")), &mut out, &pager)
            .await
            .unwrap();
        assert_eq!(out, DIFF.as_bytes());
        assert!(!out.contains(&0x1b));
        assert!(pager.commands.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_without_pager_colorizes() {
        let pager = RecordingPager::default();
        let mut out = Vec::new();
        write_diff(DIFF.as_bytes(), ColorMode::Always, &target(true, None), &mut out, &pager)
            .await
            .unwrap();
        assert_eq!(out, colorize(DIFF.as_bytes()));
    }

    #[tokio::test]
    async fn test_terminal_with_color_never_is_plain() {
        let pager = RecordingPager::default();
        let mut out = Vec::new();
        write_diff(DIFF.as_bytes(), ColorMode::Never, &target(true, None), &mut out, &pager)
            .await
            .unwrap();
        assert_eq!(out, DIFF.as_bytes());
    }

    #[tokio::test]
    async fn test_pager_gets_same_bytes_as_terminal() {
        let pager = RecordingPager::default();
        let mut paged = Vec::new();
        write_diff(DIFF.as_bytes(), ColorMode::Always, &target(true, Some("fakepager")), &mut paged, &pager)
            .await
            .unwrap();

        let mut direct = Vec::new();
        write_diff(DIFF.as_bytes(), ColorMode::Always, &target(true, None), &mut direct, &pager)
            .await
            .unwrap();

        assert_eq!(paged, direct);
        assert_eq!(*pager.commands.lock().unwrap(), vec!["fakepager".to_string()]);
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_broken_stdout_pipe_is_not_an_error() {
        let pager = RecordingPager::default();
        write_diff(DIFF.as_bytes(), ColorMode::Never, &target(false, None), &mut ClosedPipe, &pager)
            .await
            .unwrap();
    }
}
