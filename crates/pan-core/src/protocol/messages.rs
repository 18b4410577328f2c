//! Message-bus value model.
//!
//! The bus itself (marshalling, routing, delivery) is external.  These types
//! are the minimal typed view the manager needs of it: a method call with
//! positional arguments, a signal, an error reply, and the three ways a
//! handler can answer a call.

use std::fmt;

use thiserror::Error;

// ── Argument values ───────────────────────────────────────────────────────────

/// A single typed argument or return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// `s`
    Str(String),
    /// `u`
    U32(u32),
    /// `ay`
    Bytes(Vec<u8>),
    /// `au`
    U32Array(Vec<u32>),
    /// `as`
    StrArray(Vec<String>),
}

impl Value {
    /// Type signature of the value in bus notation.
    pub fn signature(&self) -> &'static str {
        match self {
            Value::Str(_) => "s",
            Value::U32(_) => "u",
            Value::Bytes(_) => "ay",
            Value::U32Array(_) => "au",
            Value::StrArray(_) => "as",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::U32(n)
    }
}

/// Error produced when extracting a positional argument.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgError {
    #[error("missing argument {index}, expected type {expected}")]
    Missing { index: usize, expected: &'static str },
    #[error("argument {index} has type {found}, expected {expected}")]
    WrongType {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
}

/// Typed positional accessor over a slice of values.
///
/// Used both for inbound call arguments and for outbound reply bodies.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a>(&'a [Value]);

impl<'a> Args<'a> {
    pub fn new(values: &'a [Value]) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn get(&self, index: usize, expected: &'static str) -> Result<&'a Value, ArgError> {
        self.0.get(index).ok_or(ArgError::Missing { index, expected })
    }

    pub fn string(&self, index: usize) -> Result<&'a str, ArgError> {
        match self.get(index, "s")? {
            Value::Str(s) => Ok(s),
            other => Err(wrong_type(index, "s", other)),
        }
    }

    pub fn uint32(&self, index: usize) -> Result<u32, ArgError> {
        match self.get(index, "u")? {
            Value::U32(n) => Ok(*n),
            other => Err(wrong_type(index, "u", other)),
        }
    }

    pub fn bytes(&self, index: usize) -> Result<&'a [u8], ArgError> {
        match self.get(index, "ay")? {
            Value::Bytes(b) => Ok(b),
            other => Err(wrong_type(index, "ay", other)),
        }
    }

    pub fn uint32_array(&self, index: usize) -> Result<&'a [u32], ArgError> {
        match self.get(index, "au")? {
            Value::U32Array(v) => Ok(v),
            other => Err(wrong_type(index, "au", other)),
        }
    }
}

fn wrong_type(index: usize, expected: &'static str, found: &Value) -> ArgError {
    ArgError::WrongType {
        index,
        expected,
        found: found.signature(),
    }
}

// ── Calls and signals ─────────────────────────────────────────────────────────

/// An addressed method invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub path: String,
    pub interface: String,
    pub member: String,
    pub args: Vec<Value>,
}

impl MethodCall {
    pub fn new(
        path: impl Into<String>,
        interface: impl Into<String>,
        member: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            interface: interface.into(),
            member: member.into(),
            args: Vec::new(),
        }
    }

    /// Appends an argument (builder style).
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn args(&self) -> Args<'_> {
        Args::new(&self.args)
    }
}

impl fmt::Display for MethodCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} on {}", self.interface, self.member, self.path)
    }
}

/// A broadcast notification emitted by an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub path: String,
    pub interface: String,
    pub member: String,
    pub args: Vec<Value>,
}

/// A named error reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct BusError {
    pub name: String,
    pub message: String,
}

impl BusError {
    pub const UNKNOWN_OBJECT: &'static str = "org.freedesktop.DBus.Error.UnknownObject";
    pub const UNKNOWN_METHOD: &'static str = "org.freedesktop.DBus.Error.UnknownMethod";
    pub const NO_REPLY: &'static str = "org.freedesktop.DBus.Error.NoReply";
    pub const OBJECT_PATH_IN_USE: &'static str = "org.freedesktop.DBus.Error.ObjectPathInUse";
    pub const DISCONNECTED: &'static str = "org.freedesktop.DBus.Error.Disconnected";

    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.name == name
    }
}

/// How a handler answered a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallResponse {
    /// Method return with its body.
    Return(Vec<Value>),
    /// Error reply.
    Error(BusError),
    /// The handler does not implement the call; outer layers may try their
    /// own handling.
    NotHandled,
}

impl CallResponse {
    /// Converts a handled outcome into a `Result`; `NotHandled` becomes an
    /// `UnknownMethod` error as the bus would report it to the caller.
    pub fn into_result(self) -> Result<Vec<Value>, BusError> {
        match self {
            CallResponse::Return(values) => Ok(values),
            CallResponse::Error(err) => Err(err),
            CallResponse::NotHandled => Err(BusError::new(
                BusError::UNKNOWN_METHOD,
                "Method is not implemented by the target object",
            )),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
