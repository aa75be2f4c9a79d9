use std::fmt;

use thiserror::Error;

use crate::encoding::tabular::TabularData;

/// Failure classes a management transport can report.
///
/// This crate never looks inside the transport. It only needs to tell these
/// three apart.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The named remote object is not registered on the target.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The channel to the target failed.
    #[error("communication failure: {0}")]
    Communication(String),

    /// The remote operation ran and raised.
    #[error("invocation failed: {0}")]
    Invocation(String),
}

/// A management object name of the form `domain:key=value[,key=value...]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectName {
    raw: String,
    domain_len: usize,
}

impl ObjectName {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let (domain, properties) = raw
            .split_once(':')
            .ok_or_else(|| format!("missing ':' in object name {raw:?}"))?;
        if domain.is_empty() {
            return Err(format!("empty domain in object name {raw:?}"));
        }
        if properties.is_empty() {
            return Err(format!("no key properties in object name {raw:?}"));
        }
        for property in properties.split(',') {
            match property.split_once('=') {
                Some((key, value)) if !key.is_empty() && !value.is_empty() => {}
                _ => return Err(format!("malformed key property {property:?} in {raw:?}")),
            }
        }
        Ok(Self {
            raw: raw.to_string(),
            domain_len: domain.len(),
        })
    }

    pub fn domain(&self) -> &str {
        &self.raw[..self.domain_len]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Typed argument or return value of a remote operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MgmtValue {
    Void,
    Long(i64),
    Bool(bool),
    Text(String),
    TextArray(Vec<String>),
    Bytes(Vec<u8>),
    Table(TabularData),
}

impl MgmtValue {
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short type tag used in log lines and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Long(_) => "long",
            Self::Bool(_) => "boolean",
            Self::Text(_) => "string",
            Self::TextArray(_) => "string[]",
            Self::Bytes(_) => "byte[]",
            Self::Table(_) => "table",
        }
    }
}

/// Connection to a remote management server.
///
/// Implemented by whatever carries management calls to the target process.
/// Calls block until the transport returns or fails; no deadline is imposed
/// at this layer.
pub trait ManagementTransport: Send + Sync {
    /// Resolve a registered object, returning its canonical name.
    fn resolve(&self, name: &ObjectName) -> Result<ObjectName, TransportError>;

    /// Invoke `operation` on `target` with positional arguments.
    fn invoke(
        &self,
        target: &ObjectName,
        operation: &str,
        args: &[MgmtValue],
    ) -> Result<MgmtValue, TransportError>;
}
