pub mod config;
pub mod engine;
pub mod error;
pub mod keypool;
pub mod llm;
pub mod observer;
pub mod planner;
pub mod resilience;
pub mod schemas;
pub mod session;
pub mod tools;
pub extern crate url;
