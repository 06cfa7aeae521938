//! Hand-off to the privileged action that mounts or unlocks a device once its
//! certificate exists.
//!
//! Commands are executed as an argument vector through a [`CommandExecutor`];
//! no shell string is ever built.

use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use bon::Builder;
use tracing::{info, warn};

use crate::error::{Result, UsbCertError};

/// Runs a command and reports how it exited.
pub trait CommandExecutor {
    /// Executes `argv[0]` with the remaining arguments and waits for it.
    ///
    /// Returns the exit code, or `None` if the process was killed by a signal.
    fn execute(&self, argv: &[OsString]) -> io::Result<Option<i32>>;
}

/// Executes commands directly with [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl CommandExecutor for SystemExecutor {
    fn execute(&self, argv: &[OsString]) -> io::Result<Option<i32>> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;
        let status = Command::new(program).args(args).status()?;
        Ok(status.code())
    }
}

/// The downstream script invoked as `[elevate] script <device> <certificate>`.
///
/// # Fields
/// * `script` - Path of the script or binary.
/// * `elevate` - Optional privilege wrapper such as `sudo`.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct PartitionAction {
    #[builder(into)]
    pub script: PathBuf,
    #[builder(into)]
    pub elevate: Option<String>,
}

impl PartitionAction {
    /// Builds the argument vector for `device` and `cert_path`.
    pub fn argv(&self, device: &Path, cert_path: &Path) -> Vec<OsString> {
        self.elevate
            .iter()
            .map(OsString::from)
            .chain([
                self.script.clone().into_os_string(),
                device.as_os_str().to_owned(),
                cert_path.as_os_str().to_owned(),
            ])
            .collect()
    }

    /// Runs the action once the certificate at `cert_path` is readable.
    ///
    /// Fails with [`UsbCertError::IoError`] if the certificate cannot be opened
    /// or the command cannot be started, and with
    /// [`UsbCertError::ExternalActionError`] on a non-zero or signal exit.
    pub fn run(
        &self,
        executor: &impl CommandExecutor,
        device: &Path,
        cert_path: &Path,
    ) -> Result<()> {
        File::open(cert_path).map_err(|e| UsbCertError::io(cert_path, e))?;

        let argv = self.argv(device, cert_path);
        let status = executor
            .execute(&argv)
            .map_err(|e| UsbCertError::io(&self.script, e))?;

        let program = display_program(self.script.as_os_str());
        match status {
            Some(0) => {
                info!(program = %program, device = %device.display(), "partition action succeeded");
                Ok(())
            }
            status => {
                warn!(program = %program, ?status, "partition action failed");
                Err(UsbCertError::ExternalActionError { program, status })
            }
        }
    }
}

fn display_program(program: &OsStr) -> String {
    program.to_string_lossy().into_owned()
}
