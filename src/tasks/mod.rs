//! Single purpose end-of-night and logging tasks.

pub mod camera;
pub mod end_session;
pub mod mount;
pub mod power_box;
pub mod report;

use crate::indi::IndiError;
use crate::rpc::RpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0} not connected")]
    NotConnected(&'static str),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Indi(#[from] IndiError),
}

pub type TaskResult<T> = Result<T, TaskError>;
