//! Scripted in-memory transport for backend tests.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use flight_recorder_core::{ManagementTransport, MgmtValue, ObjectName, TransportError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Invocation {
    pub target: String,
    pub operation: String,
    pub args: Vec<MgmtValue>,
}

/// Replies are queued per operation; an operation with nothing queued
/// answers `Void`.
#[derive(Default)]
pub(crate) struct FakeTransport {
    objects: Vec<String>,
    resolve_failure: Mutex<Option<TransportError>>,
    replies: Mutex<HashMap<String, VecDeque<Result<MgmtValue, TransportError>>>>,
    resolved: Mutex<Vec<String>>,
    invocations: Mutex<Vec<Invocation>>,
}

impl FakeTransport {
    pub fn with_objects(objects: &[&str]) -> Self {
        Self {
            objects: objects.iter().map(|o| o.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn reply(&self, operation: &str, value: MgmtValue) {
        self.push(operation, Ok(value));
    }

    pub fn fail(&self, operation: &str, error: TransportError) {
        self.push(operation, Err(error));
    }

    pub fn fail_resolve(&self, error: TransportError) {
        *self.resolve_failure.lock() = Some(error);
    }

    fn push(&self, operation: &str, result: Result<MgmtValue, TransportError>) {
        self.replies
            .lock()
            .entry(operation.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn resolved(&self) -> Vec<String> {
        self.resolved.lock().clone()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().clone()
    }

    pub fn operations(&self) -> Vec<String> {
        self.invocations.lock().iter().map(|i| i.operation.clone()).collect()
    }
}

impl ManagementTransport for FakeTransport {
    fn resolve(&self, name: &ObjectName) -> Result<ObjectName, TransportError> {
        self.resolved.lock().push(name.to_string());
        if let Some(err) = self.resolve_failure.lock().clone() {
            return Err(err);
        }
        if self.objects.iter().any(|o| o == name.as_str()) {
            Ok(name.clone())
        } else {
            Err(TransportError::NotFound(name.to_string()))
        }
    }

    fn invoke(
        &self,
        target: &ObjectName,
        operation: &str,
        args: &[MgmtValue],
    ) -> Result<MgmtValue, TransportError> {
        self.invocations.lock().push(Invocation {
            target: target.to_string(),
            operation: operation.to_string(),
            args: args.to_vec(),
        });
        self.replies
            .lock()
            .get_mut(operation)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(Ok(MgmtValue::Void))
    }
}
