// src/config/mod.rs
mod ingest;

pub use ingest::*;
