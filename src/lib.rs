#![forbid(unsafe_code)]

pub mod acquire;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
mod document;
pub mod error;
pub mod formats;
pub mod logging;
pub mod retry;
pub mod schema;
pub mod session;
pub mod site;
pub mod store;
