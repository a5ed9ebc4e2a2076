pub mod action;
pub mod checker;
pub mod config;
pub mod extract;
pub mod harness;
pub mod lang;
pub mod report;
pub mod str_interp;
pub mod style;

pub use crate::config::Config;
