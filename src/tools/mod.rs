//! Tool router — registers and dispatches MCP tool calls.
//!
//! Each tool takes JSON arguments and returns a [`ToolCallResult`] built
//! from a [`BslService`] response. Validation failures come back as
//! `isError` results, never as protocol errors.

pub mod analyze;
pub mod format;

use anyhow::Result;
use tracing::debug;

use crate::config::BslConfig;
use crate::runner::{ProcessRunner, SystemRunner};
use crate::server::{ToolCallResult, ToolDefinition};
use crate::service::BslService;

/// Tool router that dispatches MCP tool calls to the service.
#[derive(Debug)]
pub struct ToolRouter<R = SystemRunner> {
    service: BslService<R>,
}

impl ToolRouter<SystemRunner> {
    /// Create a router running real processes.
    pub fn new(config: BslConfig) -> Self {
        Self::with_service(BslService::new(config))
    }
}

impl<R: ProcessRunner> ToolRouter<R> {
    pub const fn with_service(service: BslService<R>) -> Self {
        Self { service }
    }

    pub const fn service(&self) -> &BslService<R> {
        &self.service
    }

    /// List all available tools with their JSON Schema definitions.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        vec![
            analyze::tool_definition(self.service.config().default_memory_mb),
            format::tool_definition(),
        ]
    }

    /// Call a tool by name with the given JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments do not match the tool's schema or
    /// the run could not be set up at all.
    pub fn call_tool(&self, name: &str, arguments: serde_json::Value) -> Result<ToolCallResult> {
        debug!(tool = name, "dispatching tool call");

        match name {
            "bsl_analyze" => analyze::execute(&self.service, arguments),
            "bsl_format" => format::execute(&self.service, arguments),
            _ => Ok(ToolCallResult::text(format!("Unknown tool: {name}"), true)),
        }
    }
}
