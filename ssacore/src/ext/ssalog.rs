use parking_lot::RwLock;
use strum::{Display, FromRepr};

/// Logger levels supported by the session log sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, FromRepr, Display)]
#[repr(u32)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::Level::Trace,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

/// Message structure for the session log sink.
#[derive(Debug, Clone)]
pub struct LogMessage {
    pub level: LogLevel,
    pub timepoint: chrono::NaiveDateTime,
    pub message: String,
    pub module: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub thread_name: Option<String>,
}

pub type LogCallback = Box<dyn Fn(&LogMessage) + Send + Sync>;

/// Replaceable destination of every message logged through a session.
///
/// The default callback forwards to the `log` facade, keeping the emitting
/// module as target.
pub struct LogSink {
    callback: RwLock<LogCallback>,
}

impl LogSink {
    pub fn new(callback: impl Fn(&LogMessage) + Send + Sync + 'static) -> Self {
        Self {
            callback: RwLock::new(Box::new(callback)),
        }
    }

    pub fn set_callback(&self, callback: impl Fn(&LogMessage) + Send + Sync + 'static) {
        *self.callback.write() = Box::new(callback);
    }

    pub fn emit(&self, message: LogMessage) {
        (self.callback.read())(&message);
    }

    fn forward_to_log(message: &LogMessage) {
        log::log!(
            target: message.module.as_str(),
            log::Level::from(message.level),
            "{}",
            message.message
        );
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(Self::forward_to_log)
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LogSink")
    }
}

/// Anything the logging macros can route a message through.
pub trait HasLogSink {
    fn log_sink(&self) -> &LogSink;
}

impl HasLogSink for LogSink {
    fn log_sink(&self) -> &LogSink {
        self
    }
}

impl HasLogSink for std::sync::Arc<LogSink> {
    fn log_sink(&self) -> &LogSink {
        self
    }
}

#[macro_export]
macro_rules! ssalog {
    (
        $session:expr,
        $level:expr,
        $( $arg:tt )*
    ) => {
        {
            let msg = $crate::ext::ssalog::LogMessage {
                level: $level,
                timepoint: $crate::chrono::Local::now().naive_local(),
                message: format!($($arg)*),
                module: module_path!().to_string(),
                file: Some(file!().to_string()),
                line: Some(line!()),
                thread_name: std::thread::current().name().map(|s| s.to_string()),
            };
            let session = &*$session;
            $crate::ext::ssalog::HasLogSink::log_sink(session).emit(msg);
        }
    };
}

#[macro_export]
macro_rules! ssatrace {
    (
        $session:expr,
        $( $arg:tt )*
    ) => {
        $crate::ssalog!(
            $session,
            $crate::ext::ssalog::LogLevel::Trace,
            $( $arg )*
        );
    };
}

#[macro_export]
macro_rules! ssadebug {
    (
        $session:expr,
        $( $arg:tt )*
    ) => {
        $crate::ssalog!(
            $session,
            $crate::ext::ssalog::LogLevel::Debug,
            $( $arg )*
        );
    };
}

#[macro_export]
macro_rules! ssainfo {
    (
        $session:expr,
        $( $arg:tt )*
    ) => {
        $crate::ssalog!(
            $session,
            $crate::ext::ssalog::LogLevel::Info,
            $( $arg )*
        );
    };
}

#[macro_export]
macro_rules! ssawarn {
    (
        $session:expr,
        $( $arg:tt )*
    ) => {
        $crate::ssalog!(
            $session,
            $crate::ext::ssalog::LogLevel::Warn,
            $( $arg )*
        );
    };
}

#[macro_export]
macro_rules! ssaerror {
    (
        $session:expr,
        $( $arg:tt )*
    ) => {
        $crate::ssalog!(
            $session,
            $crate::ext::ssalog::LogLevel::Error,
            $( $arg )*
        );
    };
}
