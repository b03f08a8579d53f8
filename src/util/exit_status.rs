use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::process::ExitCode;

#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    /// The run was aborted, devices may need attention
    Fatal = 1,
    /// Bad command line, nothing was touched
    Usage = 2,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(u8::from(status))
    }
}

impl From<&clap::Error> for ExitStatus {
    fn from(e: &clap::Error) -> Self {
        if e.use_stderr() {
            Self::Usage
        } else {
            // --help and --version
            Self::Success
        }
    }
}
