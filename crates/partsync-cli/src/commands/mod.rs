//! Command handlers

pub mod config;
pub mod data;
pub mod part;
pub mod status;
pub mod sync;
