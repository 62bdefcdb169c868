use crate::errors::ProviderError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{BufRead, Write};
use thiserror::Error;
use tracing::{debug, warn};

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC 2.0 request structure
#[derive(Debug, Deserialize)]
struct Request {
    // Required by JSON-RPC 2.0, never read
    #[allow(dead_code)]
    jsonrpc: String,
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

/// JSON-RPC 2.0 response structure
#[derive(Debug, Serialize)]
struct Response {
    jsonrpc: &'static str,
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

/// JSON-RPC 2.0 error structure
#[derive(Debug, Serialize)]
struct RpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

/// Raised by handlers when the request params are unusable.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct InvalidParams(pub String);

/// Method handler type
type MethodHandler = Box<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Line-delimited JSON-RPC server: one request per input line, one response per
/// output line.
#[derive(Default)]
pub struct RpcServer {
    methods: HashMap<String, MethodHandler>,
}

impl RpcServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method handler
    pub fn register_method<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.methods.insert(name.to_string(), Box::new(handler));
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Handle one raw request line and produce the serialized response.
    pub fn handle_line(&self, line: &str) -> String {
        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => self.dispatch(request),
            Err(e) => Response {
                jsonrpc: "2.0",
                id: None,
                result: None,
                error: Some(RpcError {
                    code: PARSE_ERROR,
                    message: "Parse error".to_string(),
                    data: Some(Value::String(e.to_string())),
                }),
            },
        };
        // Response only holds JSON values, so serialization cannot fail
        serde_json::to_string(&response).unwrap_or_default()
    }

    fn dispatch(&self, request: Request) -> Response {
        let Some(handler) = self.methods.get(&request.method) else {
            return Response {
                jsonrpc: "2.0",
                id: request.id,
                result: None,
                error: Some(RpcError {
                    code: METHOD_NOT_FOUND,
                    message: "Method not found".to_string(),
                    data: Some(Value::String(request.method)),
                }),
            };
        };

        debug!(method = %request.method, "handling request");
        match handler(request.params) {
            Ok(result) => Response {
                jsonrpc: "2.0",
                id: request.id,
                result: Some(result),
                error: None,
            },
            Err(err) => {
                warn!(method = %request.method, error = %err, "request failed");
                Response {
                    jsonrpc: "2.0",
                    id: request.id,
                    result: None,
                    error: Some(error_for(&err)),
                }
            }
        }
    }

    /// Serve requests from `reader` until EOF, writing responses to `writer`.
    pub fn serve<R: BufRead, W: Write>(&self, reader: R, mut writer: W) -> Result<()> {
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            writer.write_all(self.handle_line(&line).as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        Ok(())
    }

    /// Run the RPC server, processing stdin and writing to stdout
    pub fn run(&self) -> Result<()> {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        self.serve(stdin.lock(), stdout.lock())
    }
}

fn error_for(err: &anyhow::Error) -> RpcError {
    if let Some(invalid) = err.downcast_ref::<InvalidParams>() {
        return RpcError {
            code: INVALID_PARAMS,
            message: "Invalid params".to_string(),
            data: Some(Value::String(invalid.0.clone())),
        };
    }
    if let Some(provider) = err.downcast_ref::<ProviderError>() {
        let code = match provider {
            ProviderError::InvalidInput(_) => INVALID_PARAMS,
            _ => INTERNAL_ERROR,
        };
        return RpcError {
            code,
            message: provider.to_string(),
            data: Some(json!({ "kind": provider.kind() })),
        };
    }
    RpcError {
        code: INTERNAL_ERROR,
        message: "Internal error".to_string(),
        data: Some(Value::String(err.to_string())),
    }
}
