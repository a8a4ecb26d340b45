use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::tracker::error::{accessor_failed, TrackerResult};
use crate::tracker::value::Arg;

/// The tracker object queued closures run against.
///
/// In the browser this wraps the object Matomo binds as `this` when it calls a queued function;
/// it is handed to the closure explicitly instead.
pub trait TrackerContext {
    /// Calls `method` with `args` and returns its result as JSON (`undefined` maps to `null`).
    fn invoke(&self, method: &str, args: &[Arg]) -> TrackerResult<Value>;

    /// Executes a named command whose result is discarded.
    fn apply(&self, method: &str, args: &[Arg]) -> TrackerResult<()> {
        self.invoke(method, args).map(|_| ())
    }
}

type Responder = Arc<dyn Fn(&[Arg]) -> TrackerResult<Value> + Send + Sync + 'static>;

/// In-memory tracker whose accessors return scripted values.
///
/// Named commands are recorded and always accepted; accessors without a responder fail the same
/// way a missing function on the real tracker would.
#[derive(Default)]
pub struct ScriptedTracker {
    responders: Mutex<HashMap<String, Responder>>,
    applied: Mutex<Vec<(String, Vec<Arg>)>>,
    invocations: Mutex<Vec<(String, Vec<Arg>)>>,
}

impl fmt::Debug for ScriptedTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut accessors: Vec<_> = self.responders.lock().unwrap().keys().cloned().collect();
        accessors.sort();
        f.debug_struct("ScriptedTracker")
            .field("accessors", &accessors)
            .field("applied", &self.applied.lock().unwrap().len())
            .finish()
    }
}

impl ScriptedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `method` return `value` regardless of its arguments.
    pub fn with_value(self, method: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.with_responder(method, move |_| Ok(value.clone()))
    }

    pub fn with_responder<F>(self, method: impl Into<String>, responder: F) -> Self
    where
        F: Fn(&[Arg]) -> TrackerResult<Value> + Send + Sync + 'static,
    {
        self.responders
            .lock()
            .unwrap()
            .insert(method.into(), Arc::new(responder));
        self
    }

    /// Named commands applied so far, in order.
    pub fn applied(&self) -> Vec<(String, Vec<Arg>)> {
        self.applied.lock().unwrap().clone()
    }

    /// Accessor calls made so far, in order, including failed ones.
    pub fn invocations(&self) -> Vec<(String, Vec<Arg>)> {
        self.invocations.lock().unwrap().clone()
    }
}

impl TrackerContext for ScriptedTracker {
    fn invoke(&self, method: &str, args: &[Arg]) -> TrackerResult<Value> {
        self.invocations
            .lock()
            .unwrap()
            .push((method.to_owned(), args.to_vec()));
        let responder = self.responders.lock().unwrap().get(method).cloned();
        match responder {
            Some(responder) => responder(args),
            None => Err(accessor_failed(method, "not a function")),
        }
    }

    fn apply(&self, method: &str, args: &[Arg]) -> TrackerResult<()> {
        self.applied
            .lock()
            .unwrap()
            .push((method.to_owned(), args.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::error::TrackerErrorCode;

    #[test]
    fn responders_see_arguments() {
        let tracker = ScriptedTracker::new().with_responder("getCustomDimension", |args| {
            Ok(Value::from(format!("dimension-{}", args[0].as_i64().unwrap_or(-1))))
        });

        let value = tracker
            .invoke("getCustomDimension", &[Arg::from(4)])
            .unwrap();
        assert_eq!(value, "dimension-4");
        assert_eq!(tracker.invocations()[0].1, vec![Arg::Int(4)]);
    }

    #[test]
    fn missing_accessor_is_an_error() {
        let tracker = ScriptedTracker::new();
        let err = tracker.invoke("getVisitorId", &[]).unwrap_err();
        assert_eq!(err.code, TrackerErrorCode::AccessorFailed);
        assert!(tracker.apply("trackPageView", &[]).is_ok());
        assert_eq!(tracker.applied().len(), 1);
    }
}
