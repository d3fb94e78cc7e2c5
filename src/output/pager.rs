use std::io::{ErrorKind, Write};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::debug;

use super::OutputError;

/// Hands finished output to an external pager.
#[async_trait]
pub trait Pager: Send + Sync {
    /// Deliver `content` to the pager named by `command` and wait for it
    /// to finish. `out` is where output would have gone without a pager.
    async fn page(&self, command: &str, content: &[u8], out: &mut (dyn Write + Send)) -> Result<(), OutputError>;
}

/// Runs the pager command through the platform shell. The child inherits
/// the terminal; its stdin receives the content.
pub struct SystemPager;

#[async_trait]
impl Pager for SystemPager {
    async fn page(&self, command: &str, content: &[u8], out: &mut (dyn Write + Send)) -> Result<(), OutputError> {
        // Anything buffered for the terminal must land before the pager takes it over.
        out.flush()?;

        let mut shell = shell_command(command);
        if std::env::var_os("LESS").is_none() {
            shell.env("LESS", "FRX");
        }
        if std::env::var_os("LV").is_none() {
            shell.env("LV", "-c");
        }

        debug!(command, bytes = content.len(), "starting pager");
        let mut child = shell
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| OutputError::PagerLaunch {
                command: command.to_string(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(content).await {
                // The user quit the pager before reading everything.
                Err(err) if err.kind() == ErrorKind::BrokenPipe => {}
                Err(err) => return Err(abort(&mut child, err).await),
                Ok(()) => {}
            }
            // Dropping stdin closes the pipe so the pager sees end of input.
            drop(stdin);
        }

        let status = child.wait().await?;
        debug!(%status, "pager exited");
        if !status.success() {
            return Err(OutputError::PagerExit {
                command: command.to_string(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

/// Stop a pager whose input could not be delivered and reap it, keeping
/// the write error as the result.
async fn abort(child: &mut Child, err: std::io::Error) -> OutputError {
    if let Err(kill_err) = child.kill().await {
        debug!(error = %kill_err, "failed to stop pager");
    }
    OutputError::Write(err)
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut shell = Command::new("sh");
    shell.arg("-c").arg(command);
    shell
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut shell = Command::new("cmd");
    shell.arg("/C").arg(command);
    shell
}

/// Test pager that copies its input to `out` and remembers the command.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingPager {
    pub commands: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
#[async_trait]
impl Pager for RecordingPager {
    async fn page(&self, command: &str, content: &[u8], out: &mut (dyn Write + Send)) -> Result<(), OutputError> {
        self.commands.lock().unwrap().push(command.to_string());
        out.write_all(content)?;
        Ok(())
    }
}
