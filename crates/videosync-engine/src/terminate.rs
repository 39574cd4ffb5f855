use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};

pub trait TerminateTree: Send + Sync {
    fn name(&self) -> &'static str;
    fn terminate_tree(&self, pid: u32) -> Result<()>;
}

pub struct TaskkillTree;

impl TerminateTree for TaskkillTree {
    fn name(&self) -> &'static str {
        "taskkill"
    }

    fn terminate_tree(&self, pid: u32) -> Result<()> {
        let mut cmd = Command::new("taskkill");
        cmd.args(["/PID", &pid.to_string(), "/T", "/F"])
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        hide_console(&mut cmd);
        let status = cmd.status().context("taskkill failed")?;
        if !status.success() {
            return Err(anyhow!("taskkill exit={status}"));
        }
        Ok(())
    }
}

// SIGKILL to the worker's process group. The supervisor spawns the worker
// as a group leader, so the group id equals its pid. Falls back to the
// single pid when the group is already gone.
#[cfg(unix)]
pub struct ProcessGroupKill;

#[cfg(unix)]
impl TerminateTree for ProcessGroupKill {
    fn name(&self) -> &'static str {
        "kill_process_group"
    }

    fn terminate_tree(&self, pid: u32) -> Result<()> {
        let pid = i32::try_from(pid).context("pid out of range")?;
        // SAFETY: kill(2) takes plain integers and touches no memory of ours.
        if unsafe { libc::kill(-pid, libc::SIGKILL) } == 0 {
            return Ok(());
        }
        // SAFETY: as above.
        if unsafe { libc::kill(pid, libc::SIGKILL) } == 0 {
            return Ok(());
        }
        Err(std::io::Error::last_os_error()).with_context(|| format!("kill {pid} failed"))
    }
}

#[cfg(unix)]
pub fn platform_default() -> Box<dyn TerminateTree> {
    Box::new(ProcessGroupKill)
}

#[cfg(not(unix))]
pub fn platform_default() -> Box<dyn TerminateTree> {
    Box::new(TaskkillTree)
}

#[cfg(windows)]
pub(crate) fn hide_console(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    cmd.creation_flags(windows_sys::Win32::System::Threading::CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
pub(crate) fn hide_console(_cmd: &mut Command) {}
