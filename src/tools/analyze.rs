//! `bsl_analyze` — static analysis of BSL/OneScript sources.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::runner::ProcessRunner;
use crate::server::{ToolCallResult, ToolDefinition};
use crate::service::{AnalysisRequest, BslService};

/// Parameters for the analyze tool.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeParams {
    /// File or directory to analyze.
    pub src_dir: String,
    /// Analyzer configuration (`.bsl-language-server.json`).
    #[serde(default)]
    pub config_path: Option<String>,
    /// JVM heap in MB.
    #[serde(default)]
    pub memory_mb: Option<i64>,
}

pub fn tool_definition(default_memory_mb: u32) -> ToolDefinition {
    ToolDefinition {
        name: "bsl_analyze".to_owned(),
        description: "Analyze 1C:Enterprise BSL / OneScript sources with BSL Language Server. \
            Accepts a directory or a single .bsl/.os file. Returns a Markdown summary \
            with counts by severity and the top issues, plus every diagnostic as \
            structured content."
            .to_owned(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "srcDir": {
                    "type": "string",
                    "description": "Directory or .bsl/.os file to analyze"
                },
                "configPath": {
                    "type": "string",
                    "description": "Path to a .bsl-language-server.json configuration"
                },
                "memoryMb": {
                    "type": "integer",
                    "description": format!("JVM heap in MB (default: {default_memory_mb})"),
                    "default": default_memory_mb,
                    "minimum": 1
                }
            },
            "required": ["srcDir"]
        }),
    }
}

/// Execute the analyze tool.
pub fn execute<R: ProcessRunner>(service: &BslService<R>, arguments: serde_json::Value) -> Result<ToolCallResult> {
    let params: AnalyzeParams =
        serde_json::from_value(arguments).context("invalid bsl_analyze parameters")?;

    let request = AnalysisRequest {
        source_path: PathBuf::from(params.src_dir),
        config_path: params.config_path.filter(|p| !p.trim().is_empty()).map(PathBuf::from),
        memory_limit_mb: params.memory_mb,
    };

    match service.analyze(&request) {
        Ok(response) => ToolCallResult::structured(
            response.summary,
            &response.result,
            !response.result.success,
        ),
        Err(e) if e.is_validation() => Ok(ToolCallResult::text(format!("Error: {e}"), true)),
        Err(e) => Err(e).context("bsl_analyze failed"),
    }
}
