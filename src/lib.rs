#[cfg(test)]
#[macro_use]
extern crate assert_float_eq;

pub mod calibration;
pub mod config;
pub mod indi;
pub mod positioning;
pub mod rpc;
pub mod runner;
pub mod tasks;
pub mod util;

pub use config::Config;
pub use rpc::{Ccdciel, RemoteControl, SessionLog};
