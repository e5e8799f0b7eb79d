//! Side-effecting operations: filesystem, processes, HTTP.

pub mod cache;
pub mod cmd;
pub mod completion;
pub mod config;
pub mod context;
pub mod init;
pub mod process;
pub mod reporter;
pub mod script;
pub mod system;
pub mod trust;
