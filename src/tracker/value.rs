use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// One positional argument of a queued Matomo command.
///
/// Matomo's queue is loosely typed; this enum covers every shape the documented operations
/// accept. `Undefined` stands in for an omitted optional argument that is followed by a
/// supplied one.
#[derive(Clone)]
pub enum Arg {
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<String>),
    Node(DomNode),
    Processor(RequestProcessor),
}

impl Arg {
    /// JSON view of the argument, used for logging and by in-memory tracker contexts.
    ///
    /// DOM nodes render as their selector and callbacks as `null`.
    pub fn to_json(&self) -> Value {
        match self {
            Arg::Undefined | Arg::Processor(_) => Value::Null,
            Arg::Bool(flag) => Value::Bool(*flag),
            Arg::Int(number) => Value::from(*number),
            Arg::Float(number) => serde_json::Number::from_f64(*number)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Arg::Str(text) => Value::String(text.clone()),
            Arg::List(items) => Value::from(items.clone()),
            Arg::Node(node) => Value::String(node.selector().to_owned()),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Arg::Undefined)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Arg::Int(number) => Some(*number),
            _ => None,
        }
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Undefined => f.write_str("Undefined"),
            Arg::Bool(flag) => f.debug_tuple("Bool").field(flag).finish(),
            Arg::Int(number) => f.debug_tuple("Int").field(number).finish(),
            Arg::Float(number) => f.debug_tuple("Float").field(number).finish(),
            Arg::Str(text) => f.debug_tuple("Str").field(text).finish(),
            Arg::List(items) => f.debug_tuple("List").field(items).finish(),
            Arg::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Arg::Processor(_) => f.write_str("Processor(..)"),
        }
    }
}

impl PartialEq for Arg {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Arg::Undefined, Arg::Undefined) => true,
            (Arg::Bool(a), Arg::Bool(b)) => a == b,
            (Arg::Int(a), Arg::Int(b)) => a == b,
            (Arg::Float(a), Arg::Float(b)) => a == b,
            (Arg::Str(a), Arg::Str(b)) => a == b,
            (Arg::List(a), Arg::List(b)) => a == b,
            (Arg::Node(a), Arg::Node(b)) => a == b,
            (Arg::Processor(a), Arg::Processor(b)) => Arc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_owned())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(value)
    }
}

impl From<&String> for Arg {
    fn from(value: &String) -> Self {
        Arg::Str(value.clone())
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Bool(value)
    }
}

macro_rules! impl_int_arg {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::Int(value as i64)
                }
            }
        )*
    };
}

impl_int_arg!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Arg {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(number) => Arg::Int(number),
            Err(_) => Arg::Float(value as f64),
        }
    }
}

impl From<f32> for Arg {
    fn from(value: f32) -> Self {
        Arg::Float(value as f64)
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl From<Vec<String>> for Arg {
    fn from(value: Vec<String>) -> Self {
        Arg::List(value)
    }
}

impl From<Vec<&str>> for Arg {
    fn from(value: Vec<&str>) -> Self {
        Arg::List(value.into_iter().map(str::to_owned).collect())
    }
}

impl From<&[&str]> for Arg {
    fn from(value: &[&str]) -> Self {
        Arg::List(value.iter().map(|item| (*item).to_owned()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Arg {
    fn from(value: [&str; N]) -> Self {
        Arg::List(value.iter().map(|item| (*item).to_owned()).collect())
    }
}

impl From<DomNode> for Arg {
    fn from(value: DomNode) -> Self {
        Arg::Node(value)
    }
}

impl From<RequestProcessor> for Arg {
    fn from(value: RequestProcessor) -> Self {
        Arg::Processor(value)
    }
}

impl<T> From<Option<T>> for Arg
where
    T: Into<Arg>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Arg::Undefined)
    }
}

/// Drops trailing [`Arg::Undefined`] entries so optional parameters that were not supplied do
/// not appear in the queued command.
pub(crate) fn positional(mut args: Vec<Arg>) -> Vec<Arg> {
    while args.last().is_some_and(Arg::is_undefined) {
        args.pop();
    }
    args
}

/// A single name or a list of names, for options Matomo accepts as `string | string[]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NameList {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for NameList {
    fn from(value: &str) -> Self {
        NameList::One(value.to_owned())
    }
}

impl From<String> for NameList {
    fn from(value: String) -> Self {
        NameList::One(value)
    }
}

impl From<Vec<String>> for NameList {
    fn from(value: Vec<String>) -> Self {
        NameList::Many(value)
    }
}

impl From<Vec<&str>> for NameList {
    fn from(value: Vec<&str>) -> Self {
        NameList::Many(value.into_iter().map(str::to_owned).collect())
    }
}

impl From<&[&str]> for NameList {
    fn from(value: &[&str]) -> Self {
        NameList::Many(value.iter().map(|item| (*item).to_owned()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for NameList {
    fn from(value: [&str; N]) -> Self {
        NameList::Many(value.iter().map(|item| (*item).to_owned()).collect())
    }
}

impl From<NameList> for Arg {
    fn from(value: NameList) -> Self {
        match value {
            NameList::One(name) => Arg::Str(name),
            NameList::Many(names) => Arg::List(names),
        }
    }
}

/// Scope of a custom variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariableScope {
    Visit,
    Page,
}

impl VariableScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableScope::Visit => "visit",
            VariableScope::Page => "page",
        }
    }
}

impl From<VariableScope> for Arg {
    fn from(value: VariableScope) -> Self {
        Arg::Str(value.as_str().to_owned())
    }
}

/// HTTP method used for tracking requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestMethod {
    Get,
    Post,
}

impl RequestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
        }
    }
}

impl From<RequestMethod> for Arg {
    fn from(value: RequestMethod) -> Self {
        Arg::Str(value.as_str().to_owned())
    }
}

/// Reference to a DOM node, carried as a CSS selector and resolved when the command is queued
/// in the browser.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DomNode {
    selector: String,
}

impl DomNode {
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Node matching an arbitrary CSS selector.
    pub fn query(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    /// Node with the given element id.
    pub fn id(id: impl AsRef<str>) -> Self {
        Self {
            selector: format!("#{}", id.as_ref()),
        }
    }
}

type ProcessorFn = dyn Fn(&str) -> String + Send + Sync + 'static;

/// Callback for `setCustomRequestProcessing`: receives the prepared query string and returns
/// the request body to send.
#[derive(Clone)]
pub struct RequestProcessor(Arc<ProcessorFn>);

impl RequestProcessor {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    pub fn process(&self, query: &str) -> String {
        (self.0)(query)
    }
}

impl fmt::Debug for RequestProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RequestProcessor(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_values_become_undefined() {
        assert_eq!(Arg::from(None::<&str>), Arg::Undefined);
        assert_eq!(Arg::from(Some(4)), Arg::Int(4));
    }

    #[test]
    fn positional_trims_only_trailing_gaps() {
        let args = positional(vec![
            Arg::from("Videos"),
            Arg::Undefined,
            Arg::from(3),
            Arg::Undefined,
            Arg::Undefined,
        ]);
        assert_eq!(args, vec![Arg::from("Videos"), Arg::Undefined, Arg::Int(3)]);
        assert!(positional(vec![Arg::Undefined]).is_empty());
    }

    #[test]
    fn json_view_covers_nodes_and_lists() {
        assert_eq!(Arg::from(DomNode::id("hero")).to_json(), "#hero");
        assert_eq!(
            Arg::from(["doc", "xls"]).to_json(),
            serde_json::json!(["doc", "xls"])
        );
        assert_eq!(Arg::Float(f64::NAN).to_json(), Value::Null);
    }

    #[test]
    fn processors_compare_by_identity() {
        let processor = RequestProcessor::new(|query| format!("{query}&x=1"));
        assert_eq!(processor.process("a=b"), "a=b&x=1");
        let same = Arg::from(processor.clone());
        assert_eq!(same, Arg::Processor(processor));
        assert_ne!(same, Arg::from(RequestProcessor::new(str::to_owned)));
    }
}
