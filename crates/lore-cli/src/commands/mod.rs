//! Command handlers

pub mod config;
pub mod doc;
pub mod init;
pub mod project;
pub mod status;
pub mod sync;
