//! Memoir: guided life-story interviews compiled into an autobiography.

pub mod autobiography;
pub mod catalog;
pub mod config;
pub mod error;
pub mod interview;
pub mod llm;
pub mod store;
