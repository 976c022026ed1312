//! proedge-export - export crawler for ProEdge-style web applications.
//!
//! Attaches to an already-authenticated Chromium over the DevTools
//! Protocol, walks the configured sections and writes JSON, CSV, HTML
//! snapshots, downloaded files and a run manifest.

pub mod browser;
pub mod cli;
pub mod config;
pub mod extract;
pub mod models;
pub mod scrapers;
pub mod services;
pub mod storage;
