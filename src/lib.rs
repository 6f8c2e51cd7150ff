//! `bsl-mcp` — MCP bridge to BSL Language Server.
//!
//! Exposes static analysis and formatting of 1C:Enterprise BSL and
//! OneScript sources as Model Context Protocol tools over stdio
//! (JSON-RPC 2.0, newline-delimited). The analyzer itself is an external
//! Java program driven through its command line.
//!
//! # Tools
//!
//! - `bsl_analyze` — run the analyzer with the JSON reporter, return a
//!   Markdown summary and every diagnostic as structured content
//! - `bsl_format` — format sources in place
//!
//! # Architecture
//!
//! ```text
//! stdin (JSON-RPC) → server → ToolRouter → BslService → BslRunner → java -jar
//!                                              ↓              ↓
//! stdout (JSON-RPC) ← summary/result ← analysis::parse ← ProcessOutcome
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod logging;
pub mod runner;
pub mod server;
pub mod service;
pub mod tools;
pub mod util;

pub use config::BslConfig;
pub use error::{BslError, BslResult};
pub use server::run_mcp_server;
pub use service::BslService;
