//! Command handlers

pub mod config;
pub mod delete;
pub mod push;
pub mod run;
