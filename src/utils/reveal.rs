//! Showing a finished workbook in the platform file browser.

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

use super::process::std_command;

/// Opens the host file browser with a file selected.
///
/// Callers treat this as best-effort; an error is only ever logged.
pub trait FileRevealer: Send + Sync {
    fn reveal(&self, path: &Path) -> io::Result<()>;
}

/// Reveals files by launching the platform file manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRevealer;

impl FileRevealer for SystemRevealer {
    fn reveal(&self, path: &Path) -> io::Result<()> {
        launch(reveal_command(path))
    }
}

/// Runs a launcher to completion. Its exit code means nothing (explorer
/// returns 1 on success), but waiting reaps it.
fn launch(mut cmd: Command) -> io::Result<()> {
    cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
    let status = cmd.spawn()?.wait()?;
    if !status.success() {
        debug!("{:?} exited with {}", cmd.get_program(), status);
    }
    Ok(())
}

#[cfg(windows)]
fn reveal_command(path: &Path) -> Command {
    use std::os::windows::process::CommandExt;

    let mut cmd = std_command("explorer");
    cmd.raw_arg(select_arg(path));
    cmd
}

/// Explorer ignores `/select` when the whole switch is quoted, so only the
/// path gets quotes.
#[cfg(windows)]
fn select_arg(path: &Path) -> String {
    format!("/select,\"{}\"", path.display())
}

#[cfg(target_os = "macos")]
fn reveal_command(path: &Path) -> Command {
    let mut cmd = std_command("open");
    cmd.arg("-R").arg(path);
    cmd
}

// Most Linux file managers have no portable "select" flag, so open the folder.
#[cfg(not(any(windows, target_os = "macos")))]
fn reveal_command(path: &Path) -> Command {
    let mut cmd = std_command("xdg-open");
    cmd.arg(path.parent().unwrap_or(path));
    cmd
}

/// Reveals files through `tauri-plugin-opener`.
#[cfg(feature = "desktop")]
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenerRevealer;

#[cfg(feature = "desktop")]
impl FileRevealer for OpenerRevealer {
    fn reveal(&self, path: &Path) -> io::Result<()> {
        tauri_plugin_opener::reveal_item_in_dir(path).map_err(io::Error::other)
    }
}

/// Revealer that does nothing, for headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRevealer;

impl FileRevealer for NoopRevealer {
    fn reveal(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(any(windows, target_os = "macos")))]
    #[test]
    fn linux_opens_the_parent_folder() {
        let cmd = reveal_command(Path::new("/data/out/report.xlsx"));
        assert_eq!(cmd.get_program(), "xdg-open");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, vec![std::ffi::OsStr::new("/data/out")]);
    }

    #[cfg(windows)]
    #[test]
    fn explorer_switch_quotes_only_the_path() {
        assert_eq!(
            select_arg(Path::new(r"C:\Users\Ann\My Files\q3 report.xlsx")),
            r#"/select,"C:\Users\Ann\My Files\q3 report.xlsx""#
        );
    }

    #[cfg(unix)]
    #[test]
    fn launch_waits_and_ignores_exit_code() {
        assert!(launch(std_command("true")).is_ok());
        assert!(launch(std_command("false")).is_ok());
        assert!(launch(std_command("/nonexistent/file-manager")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn launch_reaps_the_launcher() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("done");
        let mut cmd = std_command("sh");
        cmd.arg("-c").arg(format!("sleep 0.2; touch '{}'", marker.display()));

        launch(cmd).unwrap();
        // Returned only after the launcher exited.
        assert!(marker.exists());
    }

    #[test]
    fn noop_revealer_always_succeeds() {
        assert!(NoopRevealer.reveal(Path::new("/nowhere.xlsx")).is_ok());
    }
}
