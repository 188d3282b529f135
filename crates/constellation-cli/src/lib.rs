//! The Constellation CLI: runs a simulation and speaks line-delimited JSON over STDIN and STDOUT,
//! so that any host that can spawn a process can draw particles.

pub mod cli_args;
pub mod config;
pub mod run;
