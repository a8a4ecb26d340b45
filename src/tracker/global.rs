//! The process-wide command queue.
//!
//! In the browser (`wasm32` with the `wasm-web` feature) the queue is the `window[<name>]` array
//! created by the Matomo snippet. Everywhere else it is whatever queue was installed under that
//! name with [`install_global_queue`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, RwLock};

#[cfg(not(all(target_arch = "wasm32", feature = "wasm-web")))]
use crate::tracker::context::TrackerContext;
use crate::tracker::error::TrackerResult;
use crate::tracker::queue::{CommandQueue, QueueEntry};

static REGISTRY: LazyLock<RwLock<HashMap<String, Arc<dyn CommandQueue>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Registers `queue` as the global queue named `name`, returning the one it replaces.
pub fn install_global_queue(
    name: impl Into<String>,
    queue: Arc<dyn CommandQueue>,
) -> Option<Arc<dyn CommandQueue>> {
    REGISTRY.write().unwrap().insert(name.into(), queue)
}

pub fn uninstall_global_queue(name: &str) -> Option<Arc<dyn CommandQueue>> {
    REGISTRY.write().unwrap().remove(name)
}

pub fn global_queue(name: &str) -> Option<Arc<dyn CommandQueue>> {
    REGISTRY.read().unwrap().get(name).cloned()
}

/// Handle to the global queue, looked up on every push so a tracker created before the script
/// loaded starts working once it has.
#[derive(Clone, PartialEq, Eq)]
pub struct GlobalCommandQueue {
    name: String,
}

impl fmt::Debug for GlobalCommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalCommandQueue")
            .field("name", &self.name)
            .field("available", &self.is_available())
            .finish()
    }
}

impl GlobalCommandQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Creates an empty queue under this name unless one already exists, like the
    /// `_paq = _paq || []` line of the Matomo snippet.
    ///
    /// Natively the created queue is a [`RecordingQueue`](crate::tracker::RecordingQueue); replay
    /// it with [`CommandQueue::drain`] on this handle or on [`global_queue`].
    pub fn ensure(&self) -> TrackerResult<()> {
        #[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
        {
            web::ensure_queue(&self.name)
        }

        #[cfg(not(all(target_arch = "wasm32", feature = "wasm-web")))]
        {
            let mut registry = REGISTRY.write().unwrap();
            registry
                .entry(self.name.clone())
                .or_insert_with(|| Arc::new(crate::tracker::queue::RecordingQueue::new()));
            Ok(())
        }
    }
}

impl CommandQueue for GlobalCommandQueue {
    fn name(&self) -> &str {
        &self.name
    }

    #[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
    fn is_available(&self) -> bool {
        web::queue_object(&self.name).is_some()
    }

    #[cfg(not(all(target_arch = "wasm32", feature = "wasm-web")))]
    fn is_available(&self) -> bool {
        global_queue(&self.name).is_some_and(|queue| queue.is_available())
    }

    #[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
    fn push(&self, entry: QueueEntry) -> TrackerResult<()> {
        web::push(&self.name, entry)
    }

    #[cfg(not(all(target_arch = "wasm32", feature = "wasm-web")))]
    fn push(&self, entry: QueueEntry) -> TrackerResult<()> {
        use crate::tracker::error::missing_runtime;

        let queue = global_queue(&self.name).ok_or_else(|| missing_runtime(&self.name))?;
        queue.push(entry)
    }

    #[cfg(not(all(target_arch = "wasm32", feature = "wasm-web")))]
    fn drain(&self, context: &dyn TrackerContext) -> usize {
        global_queue(&self.name).map_or(0, |queue| queue.drain(context))
    }
}

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
pub(crate) mod web {
    use js_sys::{Array, Function, Object, Reflect};
    use serde_json::Value;
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;

    use crate::tracker::context::TrackerContext;
    use crate::tracker::error::{
        accessor_failed, internal_error, missing_runtime, unexpected_value, TrackerResult,
    };
    use crate::tracker::queue::{AccessorClosure, QueueEntry};
    use crate::tracker::value::Arg;

    pub(crate) fn queue_object(name: &str) -> Option<Object> {
        let value = Reflect::get(&js_sys::global(), &JsValue::from_str(name)).ok()?;
        if value.is_null() || value.is_undefined() {
            return None;
        }
        Some(value.unchecked_into())
    }

    pub(crate) fn ensure_queue(name: &str) -> TrackerResult<()> {
        if queue_object(name).is_some() {
            return Ok(());
        }
        Reflect::set(&js_sys::global(), &JsValue::from_str(name), &Array::new())
            .map_err(|err| internal_error(format!("Failed to create `{name}`: {err:?}")))?;
        Ok(())
    }

    pub(crate) fn push(name: &str, entry: QueueEntry) -> TrackerResult<()> {
        let queue = queue_object(name).ok_or_else(|| missing_runtime(name))?;
        let command = Array::new();
        match entry {
            QueueEntry::Method { name: method, args } => {
                command.push(&JsValue::from_str(&method));
                for arg in &args {
                    command.push(&to_js(arg));
                }
            }
            QueueEntry::Closure(closure) => {
                command.push(&bind_this(closure));
            }
        }

        // Once the tracker script has loaded, `_paq` is an object whose `push` runs the command.
        let push = Reflect::get(&queue, &JsValue::from_str("push"))
            .map_err(|err| internal_error(format!("Failed to access {name}.push: {err:?}")))?
            .dyn_into::<Function>()
            .map_err(|_| internal_error(format!("{name}.push is not a function")))?;
        push.call1(&queue, &command).map_err(|err| {
            internal_error(format!("{name}.push threw: {}", js_error_message(err)))
        })?;
        Ok(())
    }

    pub(crate) fn to_js(arg: &Arg) -> JsValue {
        match arg {
            Arg::Undefined => JsValue::UNDEFINED,
            Arg::Bool(flag) => JsValue::from_bool(*flag),
            Arg::Int(number) => JsValue::from_f64(*number as f64),
            Arg::Float(number) => JsValue::from_f64(*number),
            Arg::Str(text) => JsValue::from_str(text),
            Arg::List(items) => items
                .iter()
                .map(|item| JsValue::from_str(item))
                .collect::<Array>()
                .into(),
            Arg::Node(node) => web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.query_selector(node.selector()).ok().flatten())
                .map(JsValue::from)
                .unwrap_or(JsValue::NULL),
            Arg::Processor(processor) => {
                let processor = processor.clone();
                let callback = Closure::wrap(Box::new(move |query: String| -> String {
                    processor.process(&query)
                }) as Box<dyn FnMut(String) -> String>);
                callback.into_js_value()
            }
        }
    }

    // Matomo calls queued functions with its tracker as `this`; the shim passes it on as an
    // argument so the Rust side receives it explicitly. Shipped as a module so pages whose CSP
    // forbids `unsafe-eval` still accept it.
    #[wasm_bindgen(inline_js = r#"
export function bind_this(callback) {
    return function () { callback(this); };
}
"#)]
    extern "C" {
        #[wasm_bindgen(js_name = bind_this)]
        fn bind_this_shim(callback: &JsValue) -> Function;
    }

    pub(crate) fn bind_this(closure: AccessorClosure) -> Function {
        let callback = Closure::once_into_js(move |this: JsValue| {
            closure(&JsTrackerContext { this });
        });
        bind_this_shim(&callback)
    }

    /// The Matomo tracker object a queued function was invoked against.
    pub(crate) struct JsTrackerContext {
        pub(crate) this: JsValue,
    }

    impl TrackerContext for JsTrackerContext {
        fn invoke(&self, method: &str, args: &[Arg]) -> TrackerResult<Value> {
            let function = Reflect::get(&self.this, &JsValue::from_str(method))
                .map_err(|err| accessor_failed(method, js_error_message(err)))?
                .dyn_into::<Function>()
                .map_err(|_| accessor_failed(method, "not a function"))?;
            let js_args = args.iter().map(to_js).collect::<Array>();
            let result = function
                .apply(&self.this, &js_args)
                .map_err(|err| accessor_failed(method, js_error_message(err)))?;
            to_json(method, result)
        }
    }

    fn to_json(method: &str, value: JsValue) -> TrackerResult<Value> {
        if value.is_undefined() {
            return Ok(Value::Null);
        }
        let serialized = js_sys::JSON::stringify(&value)
            .map_err(|err| unexpected_value(method, js_error_message(err)))?
            .as_string()
            .ok_or_else(|| unexpected_value(method, "not serializable"))?;
        serde_json::from_str(&serialized).map_err(|err| unexpected_value(method, err))
    }

    pub(crate) fn js_error_message(value: JsValue) -> String {
        if let Some(error) = value.dyn_ref::<js_sys::Error>() {
            format!("{}", error.message())
        } else if let Some(string) = value.as_string() {
            string
        } else {
            format!("{value:?}")
        }
    }
}
