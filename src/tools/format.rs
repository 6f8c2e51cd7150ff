//! `bsl_format` — in-place formatting of BSL/OneScript sources.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::runner::ProcessRunner;
use crate::server::{ToolCallResult, ToolDefinition};
use crate::service::{BslService, FormatRequest};

/// Parameters for the format tool.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatParams {
    /// File or directory to format.
    pub src_dir: String,
}

pub fn tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "bsl_format".to_owned(),
        description: "Format 1C:Enterprise BSL / OneScript sources in place with \
            BSL Language Server. Accepts a directory or a single .bsl/.os file."
            .to_owned(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "srcDir": {
                    "type": "string",
                    "description": "Directory or .bsl/.os file to format"
                }
            },
            "required": ["srcDir"]
        }),
    }
}

/// Execute the format tool.
pub fn execute<R: ProcessRunner>(service: &BslService<R>, arguments: serde_json::Value) -> Result<ToolCallResult> {
    let params: FormatParams =
        serde_json::from_value(arguments).context("invalid bsl_format parameters")?;

    let request = FormatRequest {
        source_path: PathBuf::from(params.src_dir),
    };

    match service.format(&request) {
        Ok(response) => ToolCallResult::structured(
            response.status,
            &response.result,
            !response.result.success,
        ),
        Err(e) if e.is_validation() => Ok(ToolCallResult::text(format!("Error: {e}"), true)),
        Err(e) => Err(e).context("bsl_format failed"),
    }
}
