//! CLI Commands

pub mod cert;
pub mod console;
pub mod rp_port;
