//! JSON-lines control surface.
//!
//! Each input line is one call on the bus:
//!
//! ```json
//! {"method": "CreateConnection", "args": ["AA:BB:CC:DD:EE:FF", "nap"]}
//! {"method": "GetAddress", "path": "/org/bluez/network/connection0",
//!  "interface": "org.bluez.network.Connection"}
//! ```
//!
//! `path` and `interface` default to the management endpoint.  String
//! arguments map to `s`, non-negative integers that fit 32 bits to `u`, and
//! homogeneous arrays to `as` / `au`.
//!
//! Each call produces one output line, `{"ok": <value>}` or
//! `{"error": {"name": ..., "message": ...}}`.  A reply with no body renders
//! as `null`, one value as itself, several values as an array.  Manager
//! lifecycle signals are written as `{"signal": <member>, "path": <path>}`
//! between replies.

use std::sync::Arc;

use pan_core::{BusError, ManagerError, ManagerSignal, MethodCall, Signal, Value};
use pan_core::{NETWORK_MANAGER_INTERFACE, NETWORK_PATH};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::infrastructure::bus::{BusCallError, BusConnection};

/// Error type for the control loop.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The line is not a valid request object.
    #[error("malformed request: {0}")]
    Json(#[from] serde_json::Error),

    /// An argument has no bus representation.
    #[error("unsupported argument {index}: {value}")]
    UnsupportedArgument { index: usize, value: String },

    /// Reading input or writing output failed.
    #[error("control stream I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct ControlRequest {
    method: String,
    #[serde(default)]
    args: Vec<serde_json::Value>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    interface: Option<String>,
}

/// Parses one request line into a method call.
///
/// # Errors
///
/// [`ControlError::Json`] for malformed JSON or a missing `method`, and
/// [`ControlError::UnsupportedArgument`] for arguments with no bus type.
pub fn parse_request(line: &str) -> Result<MethodCall, ControlError> {
    let request: ControlRequest = serde_json::from_str(line)?;
    let mut call = MethodCall::new(
        request.path.unwrap_or_else(|| NETWORK_PATH.to_string()),
        request
            .interface
            .unwrap_or_else(|| NETWORK_MANAGER_INTERFACE.to_string()),
        request.method,
    );
    for (index, arg) in request.args.into_iter().enumerate() {
        let value = to_bus_value(&arg).ok_or_else(|| ControlError::UnsupportedArgument {
            index,
            value: arg.to_string(),
        })?;
        call = call.arg(value);
    }
    Ok(call)
}

fn to_bus_value(arg: &serde_json::Value) -> Option<Value> {
    match arg {
        serde_json::Value::String(s) => Some(Value::Str(s.clone())),
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()).map(Value::U32),
        serde_json::Value::Array(items) if items.iter().all(|i| i.is_string()) => Some(
            Value::StrArray(items.iter().filter_map(|i| i.as_str().map(String::from)).collect()),
        ),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|i| i.as_u64().and_then(|n| u32::try_from(n).ok()))
            .collect::<Option<Vec<u32>>>()
            .map(Value::U32Array),
        _ => None,
    }
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Str(s) => json!(s),
        Value::U32(n) => json!(n),
        Value::Bytes(b) => json!(b),
        Value::U32Array(v) => json!(v),
        Value::StrArray(v) => json!(v),
    }
}

/// Renders a call outcome as one output line.
pub fn render_response(result: Result<Vec<Value>, BusCallError>) -> String {
    match result {
        Ok(body) => {
            let ok = match body.as_slice() {
                [] => serde_json::Value::Null,
                [single] => to_json(single),
                many => serde_json::Value::Array(many.iter().map(to_json).collect()),
            };
            json!({ "ok": ok }).to_string()
        }
        Err(err) => render_error(&err.into_bus_error()),
    }
}

fn render_error(err: &BusError) -> String {
    json!({ "error": { "name": err.name, "message": err.message } }).to_string()
}

/// Renders a manager lifecycle signal; `None` for any other signal.
pub fn render_signal(signal: &Signal) -> Option<String> {
    ManagerSignal::from_signal(signal)
        .map(|s| json!({ "signal": s.member(), "path": s.path() }).to_string())
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Serves requests from `reader` until end of input.
///
/// Requests are handled one at a time; signals received while a call is in
/// flight are written after its reply.
///
/// # Errors
///
/// Returns [`ControlError::Io`] if reading or writing fails.  Malformed
/// requests are answered with an `InvalidArguments` error line instead.
pub async fn run_control_loop<R, W>(
    bus: Arc<dyn BusConnection>,
    reader: R,
    mut writer: W,
    mut signals: broadcast::Receiver<Signal>,
) -> Result<(), ControlError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut signals_open = true;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("control input closed");
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                let output = match parse_request(&line) {
                    Ok(call) => {
                        debug!(%call, "control request");
                        render_response(bus.call(call).await)
                    }
                    Err(e) => render_error(&BusError::new(ManagerError::INVALID_ARGUMENTS, e.to_string())),
                };
                write_line(&mut writer, &output).await?;
            }
            received = signals.recv(), if signals_open => match received {
                Ok(signal) => {
                    if let Some(output) = render_signal(&signal) {
                        write_line(&mut writer, &output).await?;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "control output fell behind; signals dropped");
                }
                Err(broadcast::error::RecvError::Closed) => signals_open = false,
            },
        }
    }
}
