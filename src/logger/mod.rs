//! Named, level-filtered loggers shared by the tracker modules.
//!
//! Every logger starts at the global level and can be retuned individually. Output goes through a
//! replaceable log handler (stderr/stdout by default, the browser console with `wasm-web`), and an
//! optional user handler receives the same records before they are printed.

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, LazyLock, Mutex, RwLock, Weak};

static GLOBAL_LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static INSTANCES: LazyLock<Mutex<Vec<Weak<LoggerInner>>>> =
    LazyLock::new(|| Mutex::new(Vec::new()));

type SharedLogHandler = Arc<dyn Fn(&Logger, LogLevel, &[LogArgument]) + Send + Sync + 'static>;

#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.inner.name)
            .field("level", &self.log_level())
            .finish()
    }
}

impl Logger {
    pub fn new(name: impl Into<String>) -> Self {
        let inner = Arc::new(LoggerInner::new(name.into()));
        INSTANCES.lock().unwrap().push(Arc::downgrade(&inner));
        Self { inner }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_u8(self.inner.log_level.load(Ordering::SeqCst))
    }

    pub fn set_log_level<L>(&self, level: L) -> Result<(), LogError>
    where
        L: IntoLogLevel,
    {
        let level = level.into_log_level()?;
        self.inner.log_level.store(level as u8, Ordering::SeqCst);
        Ok(())
    }

    pub fn set_log_handler<F>(&self, handler: F)
    where
        F: Fn(&Logger, LogLevel, &[LogArgument]) + Send + Sync + 'static,
    {
        *self.inner.log_handler.write().unwrap() = Arc::new(handler);
    }

    fn user_log_handler(&self) -> Option<SharedLogHandler> {
        self.inner.user_log_handler.read().unwrap().clone()
    }

    pub fn set_user_log_handler<F>(&self, handler: Option<F>)
    where
        F: Fn(&Logger, LogLevel, &[LogArgument]) + Send + Sync + 'static,
    {
        *self.inner.user_log_handler.write().unwrap() =
            handler.map(|f| Arc::new(f) as SharedLogHandler);
    }

    pub fn debug(&self, arg: impl Into<LogArgument>) {
        self.dispatch(LogLevel::Debug, vec![arg.into()]);
    }

    pub fn warn(&self, arg: impl Into<LogArgument>) {
        self.dispatch(LogLevel::Warn, vec![arg.into()]);
    }

    fn dispatch(&self, level: LogLevel, arguments: Vec<LogArgument>) {
        if let Some(handler) = self.user_log_handler() {
            handler(self, level, &arguments);
        }
        let handler = self.inner.log_handler.read().unwrap().clone();
        handler(self, level, &arguments);
    }
}

struct LoggerInner {
    name: String,
    log_level: AtomicU8,
    log_handler: RwLock<SharedLogHandler>,
    user_log_handler: RwLock<Option<SharedLogHandler>>,
}

impl LoggerInner {
    fn new(name: String) -> Self {
        Self {
            name,
            log_level: AtomicU8::new(GLOBAL_LOG_LEVEL.load(Ordering::SeqCst)),
            log_handler: RwLock::new(Arc::new(default_log_handler)),
            user_log_handler: RwLock::new(None),
        }
    }
}

fn default_log_handler(logger: &Logger, level: LogLevel, args: &[LogArgument]) {
    if level < logger.log_level() || level == LogLevel::Silent {
        return;
    }

    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let message = build_message(args);
    let line = if message.is_empty() {
        format!("[{}]  {}:", now, logger.name())
    } else {
        format!("[{}]  {}: {}", now, logger.name(), message)
    };
    emit_line(level, &line);
}

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
fn emit_line(level: LogLevel, line: &str) {
    let value = wasm_bindgen::JsValue::from_str(line);
    match level {
        LogLevel::Warn => web_sys::console::warn_1(&value),
        LogLevel::Error => web_sys::console::error_1(&value),
        LogLevel::Debug => web_sys::console::debug_1(&value),
        _ => web_sys::console::log_1(&value),
    }
}

#[cfg(not(all(target_arch = "wasm32", feature = "wasm-web")))]
fn emit_line(level: LogLevel, line: &str) {
    match level {
        LogLevel::Warn | LogLevel::Error => eprintln!("{line}"),
        _ => println!("{line}"),
    }
}

pub(crate) fn build_message(args: &[LogArgument]) -> String {
    args.iter()
        .filter_map(LogArgument::to_message_fragment)
        .collect::<Vec<_>>()
        .join(" ")
}

fn with_instances<F>(mut f: F)
where
    F: FnMut(Logger),
{
    let mut instances = INSTANCES.lock().unwrap();
    instances.retain(|weak| match weak.upgrade() {
        Some(inner) => {
            f(Logger { inner });
            true
        }
        None => false,
    });
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    Debug = 0,
    Verbose = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Silent = 5,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Verbose => "verbose",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Silent => "silent",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Debug,
            1 => LogLevel::Verbose,
            2 => LogLevel::Info,
            3 => LogLevel::Warn,
            4 => LogLevel::Error,
            _ => LogLevel::Silent,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

impl FromStr for LogLevel {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "verbose" => Ok(LogLevel::Verbose),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "silent" => Ok(LogLevel::Silent),
            other => Err(LogError::InvalidLogLevel(other.to_string())),
        }
    }
}

pub trait IntoLogLevel {
    fn into_log_level(self) -> Result<LogLevel, LogError>;
}

impl IntoLogLevel for LogLevel {
    fn into_log_level(self) -> Result<LogLevel, LogError> {
        Ok(self)
    }
}

impl IntoLogLevel for &str {
    fn into_log_level(self) -> Result<LogLevel, LogError> {
        LogLevel::from_str(self)
    }
}

impl IntoLogLevel for String {
    fn into_log_level(self) -> Result<LogLevel, LogError> {
        LogLevel::from_str(&self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogArgument {
    Text(String),
    Value(Value),
}

impl LogArgument {
    pub fn to_message_fragment(&self) -> Option<String> {
        match self {
            LogArgument::Text(text) => Some(text.clone()),
            LogArgument::Value(Value::Null) => None,
            LogArgument::Value(Value::String(text)) => Some(text.clone()),
            LogArgument::Value(other) => Some(other.to_string()),
        }
    }
}

impl From<String> for LogArgument {
    fn from(value: String) -> Self {
        LogArgument::Text(value)
    }
}

impl From<&str> for LogArgument {
    fn from(value: &str) -> Self {
        LogArgument::Text(value.to_owned())
    }
}

impl From<Value> for LogArgument {
    fn from(value: Value) -> Self {
        LogArgument::Value(value)
    }
}

#[derive(Debug, Clone)]
pub enum LogError {
    InvalidLogLevel(String),
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogError::InvalidLogLevel(level) => {
                write!(f, "Invalid value \"{level}\" assigned to `logLevel`")
            }
        }
    }
}

impl std::error::Error for LogError {}

/// Sets the level of every live logger and of loggers created afterwards.
pub fn set_log_level<L>(level: L) -> Result<(), LogError>
where
    L: IntoLogLevel,
{
    let level = level.into_log_level()?;
    GLOBAL_LOG_LEVEL.store(level as u8, Ordering::SeqCst);
    with_instances(|logger| {
        let _ = logger.set_log_level(level);
    });
    Ok(())
}

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub logger_name: String,
}

/// Installs `callback` as the user handler of every live logger, or clears it with `None`.
///
/// Records below the logger's own level are not delivered.
pub fn set_user_log_handler<F>(callback: Option<F>)
where
    F: Fn(LogRecord) + Send + Sync + 'static,
{
    match callback {
        Some(cb) => {
            let cb = Arc::new(cb);
            with_instances(|logger| {
                let cb = Arc::clone(&cb);
                logger.set_user_log_handler(Some(
                    move |instance: &Logger, level, args: &[LogArgument]| {
                        if level < instance.log_level() {
                            return;
                        }
                        cb(LogRecord {
                            level,
                            message: build_message(args),
                            logger_name: instance.name().to_owned(),
                        });
                    },
                ));
            });
        }
        None => with_instances(|logger| {
            logger.set_user_log_handler(None::<fn(&Logger, LogLevel, &[LogArgument])>);
        }),
    }
}

// Tests that swap handlers or levels on shared loggers hold this lock.
#[cfg(test)]
pub(crate) static LOG_TEST_GUARD: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn reset_logging() {
        set_log_level(LogLevel::Info).unwrap();
        set_user_log_handler(None::<fn(LogRecord)>);
    }

    fn capture(logger: &Logger) -> Arc<Mutex<Vec<(LogLevel, String)>>> {
        let records = Arc::new(Mutex::new(Vec::new()));
        let handler_records = Arc::clone(&records);
        logger.set_log_handler(move |instance, level, args| {
            if level < instance.log_level() {
                return;
            }
            handler_records
                .lock()
                .unwrap()
                .push((level, build_message(args)));
        });
        records
    }

    #[test]
    fn global_level_applies_to_existing_loggers() {
        let _guard = LOG_TEST_GUARD.lock().unwrap();
        reset_logging();
        let logger = Logger::new("@matomo/logger-level-test");
        let records = capture(&logger);

        set_log_level("warn").unwrap();
        logger.debug("debug message");
        logger.warn("warn message");
        set_log_level(LogLevel::Debug).unwrap();
        logger.debug("debug again");

        let stored = records.lock().unwrap();
        let levels: Vec<_> = stored.iter().map(|(level, _)| *level).collect();
        assert_eq!(levels, [LogLevel::Warn, LogLevel::Debug]);
        assert_eq!(stored[0].1, "warn message");
        assert_eq!(stored[1].1, "debug again");
        drop(stored);
        reset_logging();
    }

    #[test]
    fn rejects_unknown_level_names() {
        let err = set_log_level("loud").unwrap_err();
        assert_eq!(err.to_string(), "Invalid value \"loud\" assigned to `logLevel`");
    }

    #[test]
    fn user_handler_receives_joined_message() {
        let _guard = LOG_TEST_GUARD.lock().unwrap();
        reset_logging();
        let logger = Logger::new("@matomo/logger-user-test");
        let _silenced = capture(&logger);

        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);
        let name = logger.name().to_owned();
        set_user_log_handler(Some(move |record: LogRecord| {
            if record.logger_name == name {
                sink.lock().unwrap().push(record);
            }
        }));

        logger.warn("queue missing");
        logger.warn(serde_json::json!({"site": 3}));
        logger.debug("below threshold");

        let records = captured.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].level, LogLevel::Warn);
        assert_eq!(records[0].message, "queue missing");
        assert_eq!(records[1].message, "{\"site\":3}");
        drop(records);
        reset_logging();
    }
}
