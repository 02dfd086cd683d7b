use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sitepipe::transform::tools::{ToolFuture, ToolOp, ToolOutput, ToolRequest, Toolchain};
use sitepipe::transform::ToolError;

const PREFIX_MARKER: &str = "/* prefixed */\n";

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub op: ToolOp,
    pub inputs: Vec<PathBuf>,
    pub output_name: String,
}

/// A fake toolchain that:
/// - records every call
/// - produces deterministic text from its inputs (reading real files)
/// - fails on demand for a given operation, with a fixed diagnostic
#[derive(Clone, Default)]
pub struct FakeToolchain {
    calls: Arc<Mutex<Vec<ToolCall>>>,
    failures: Arc<Mutex<HashMap<ToolOp, String>>>,
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future call of `op` fail with `message`.
    pub fn fail_on(&self, op: ToolOp, message: &str) {
        self.failures.lock().unwrap().insert(op, message.to_string());
    }

    pub fn succeed_on(&self, op: ToolOp) {
        self.failures.lock().unwrap().remove(&op);
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn ops(&self) -> Vec<ToolOp> {
        self.calls().into_iter().map(|c| c.op).collect()
    }
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

fn fake_map(request: &ToolRequest<'_>) -> Option<String> {
    request
        .source_map
        .then(|| format!("{{\"version\":3,\"file\":\"{}\",\"mappings\":\"\"}}", request.output_name))
}

impl Toolchain for FakeToolchain {
    fn run<'a>(&'a self, op: ToolOp, request: ToolRequest<'a>) -> ToolFuture<'a> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(ToolCall {
                op,
                inputs: request.inputs.to_vec(),
                output_name: request.output_name.to_string(),
            });

            let failure = self.failures.lock().unwrap().get(&op).cloned();
            if let Some(message) = failure {
                return Err(ToolError(message));
            }

            let input = request.inputs.first().map(|p| read(p)).unwrap_or_default();
            let code = request.joined_code().unwrap_or_default();

            let out = match op {
                ToolOp::CompileStylesheet => ToolOutput {
                    code: format!("/* compiled {} */\n{}", request.output_name, input.trim()),
                    map: fake_map(&request),
                },
                ToolOp::PostProcess if code.starts_with(PREFIX_MARKER) => ToolOutput {
                    code,
                    map: fake_map(&request),
                },
                ToolOp::PostProcess => ToolOutput {
                    code: format!("{PREFIX_MARKER}{code}"),
                    map: fake_map(&request),
                },
                ToolOp::MinifyCss => ToolOutput {
                    code: code.split_whitespace().collect::<Vec<_>>().join(""),
                    map: fake_map(&request),
                },
                ToolOp::MinifyJs => ToolOutput {
                    code: request
                        .inputs
                        .iter()
                        .map(|p| read(p).trim().to_string())
                        .collect::<Vec<_>>()
                        .join(";"),
                    map: fake_map(&request),
                },
                ToolOp::RenderTemplate => ToolOutput {
                    code: format!("<!-- {} -->\n{}", request.output_name, input.trim()),
                    map: None,
                },
            };
            Ok(out)
        })
    }
}
