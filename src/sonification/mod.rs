//! # Sonification
//!
//! Fetches a web page, cuts a centered window out of it and hands that window
//! to an external script that renders it as audio.
//!
//! ## Components:
//! - `fetcher`: single-attempt HTTP retrieval
//! - `slice`: centered window selection
//! - `naming`: deterministic artifact names
//! - `render`: subprocess delegation with captured output
//! - `sweeper`: retention cleanup of old artifacts
//! - `service`: the request pipeline tying it all together

pub mod fetcher;
pub mod metadata;
pub mod naming;
pub mod render;
pub mod service;
pub mod slice;
pub mod sweeper;
pub mod variant;

pub use metadata::ProcessingMetadata;
pub use service::SonificationService;
pub use sweeper::RetentionSweeper;
