mod client;
pub use client::*;

pub(crate) mod models;
