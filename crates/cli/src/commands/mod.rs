//! CLI commands

pub mod auth;
pub mod checkout;
pub mod init;
pub mod status;
