//! # 错误类型与诊断回调
//!
//! 解析和 ISD 生成过程中的问题分为四个等级：`info`、`warn`、`error` 和 `fatal`。
//! 前三者交给调用方提供的 [`ErrorHandler`] 处理，处理器可以通过返回 `true`
//! 来中止当前操作；`fatal` 总是中止。

use std::fmt;

use quick_xml::{encoding::EncodingError, events::attributes::AttrError};
use thiserror::Error;

/// 诊断消息的严重程度。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warn,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// 本库所有可失败操作的错误类型。
#[derive(Error, Debug)]
pub enum IsdError {
    /// XML 格式错误，由底层解析器报告。
    #[error("XML 解析错误: {0}")]
    Xml(#[from] quick_xml::Error),
    /// XML 属性格式错误。
    #[error("XML 属性错误: {0}")]
    Attribute(#[from] AttrError),
    /// 文本解码失败。
    #[error("文本编码或解码错误: {0}")]
    Encoding(#[from] EncodingError),
    /// CDATA 等原始字节不是合法的 UTF-8。
    #[error("无效的 UTF-8 内容: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    /// 文档结构违规，例如非法的父子关系或出现第二个 `<body>`。
    #[error("致命错误: {0}")]
    Fatal(String),
    /// 错误处理器在收到 `warn` 或 `error` 后要求中止。
    #[error("处理在 {severity} 级别被中止: {message}")]
    Aborted { severity: Severity, message: String },
    /// 输入中没有任何 `<tt>` 元素。
    #[error("文档中没有找到 <tt> 根元素")]
    MissingRoot,
}

pub type Result<T> = std::result::Result<T, IsdError>;

/// 由调用方实现的诊断回调。
///
/// `warn` 和 `error` 返回 `true` 表示中止当前操作。默认实现忽略所有消息。
pub trait ErrorHandler {
    fn info(&mut self, _message: &str) {}

    fn warn(&mut self, _message: &str) -> bool {
        false
    }

    fn error(&mut self, _message: &str) -> bool {
        false
    }

    fn fatal(&mut self, _message: &str) {}
}

/// 把诊断消息转发给 `tracing` 的处理器，从不中止。
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorHandler;

impl ErrorHandler for TracingErrorHandler {
    fn info(&mut self, message: &str) {
        tracing::info!(target: "ttml_isd", "{message}");
    }

    fn warn(&mut self, message: &str) -> bool {
        tracing::warn!(target: "ttml_isd", "{message}");
        false
    }

    fn error(&mut self, message: &str) -> bool {
        tracing::error!(target: "ttml_isd", "{message}");
        false
    }

    fn fatal(&mut self, message: &str) {
        tracing::error!(target: "ttml_isd", "[fatal] {message}");
    }
}

/// 记录所有诊断消息的处理器，主要用于测试和批量校验。
#[derive(Debug, Default, Clone)]
pub struct CollectingErrorHandler {
    pub diagnostics: Vec<(Severity, String)>,
    /// 为 `true` 时，第一条 `error` 会中止处理。
    pub abort_on_error: bool,
}

impl CollectingErrorHandler {
    #[must_use]
    pub fn aborting_on_error() -> Self {
        Self {
            diagnostics: Vec::new(),
            abort_on_error: true,
        }
    }

    /// 返回指定等级的所有消息。
    pub fn messages(&self, severity: Severity) -> impl Iterator<Item = &str> {
        self.diagnostics
            .iter()
            .filter(move |(s, _)| *s == severity)
            .map(|(_, m)| m.as_str())
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.messages(severity).count()
    }
}

impl ErrorHandler for CollectingErrorHandler {
    fn info(&mut self, message: &str) {
        self.diagnostics.push((Severity::Info, message.to_owned()));
    }

    fn warn(&mut self, message: &str) -> bool {
        self.diagnostics.push((Severity::Warn, message.to_owned()));
        false
    }

    fn error(&mut self, message: &str) -> bool {
        self.diagnostics.push((Severity::Error, message.to_owned()));
        self.abort_on_error
    }

    fn fatal(&mut self, message: &str) {
        self.diagnostics.push((Severity::Fatal, message.to_owned()));
    }
}

/// 包装调用方的处理器，把“是否中止”的布尔值转换成可以用 `?` 传播的 `Result`。
pub(crate) struct Reporter<'h> {
    handler: &'h mut dyn ErrorHandler,
}

impl<'h> Reporter<'h> {
    pub(crate) fn new(handler: &'h mut dyn ErrorHandler) -> Self {
        Self { handler }
    }

    pub(crate) fn warn(&mut self, message: &str) -> Result<()> {
        if self.handler.warn(message) {
            return Err(IsdError::Aborted {
                severity: Severity::Warn,
                message: message.to_owned(),
            });
        }
        Ok(())
    }

    pub(crate) fn error(&mut self, message: &str) -> Result<()> {
        if self.handler.error(message) {
            return Err(IsdError::Aborted {
                severity: Severity::Error,
                message: message.to_owned(),
            });
        }
        Ok(())
    }

    /// 通知处理器并返回应当向上传播的错误。
    pub(crate) fn fatal(&mut self, message: String) -> IsdError {
        self.handler.fatal(&message);
        IsdError::Fatal(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_continues_unless_handler_aborts() {
        let mut handler = CollectingErrorHandler::default();
        let mut reporter = Reporter::new(&mut handler);

        assert!(reporter.warn("w").is_ok());
        assert!(reporter.error("e").is_ok());

        assert_eq!(handler.count(Severity::Warn), 1);
        assert_eq!(handler.count(Severity::Error), 1);
        assert_eq!(handler.count(Severity::Info), 0);
    }

    #[test]
    fn test_reporter_aborts_on_error_when_requested() {
        let mut handler = CollectingErrorHandler::aborting_on_error();
        let mut reporter = Reporter::new(&mut handler);

        assert!(reporter.warn("still fine").is_ok());
        let err = reporter.error("stop here").unwrap_err();
        assert!(matches!(
            err,
            IsdError::Aborted {
                severity: Severity::Error,
                ref message
            } if message == "stop here"
        ));
    }

    #[test]
    fn test_fatal_is_always_reported_and_returned() {
        let mut handler = CollectingErrorHandler::default();
        let err = Reporter::new(&mut handler).fatal("boom".to_owned());

        assert!(matches!(err, IsdError::Fatal(ref m) if m == "boom"));
        assert_eq!(handler.messages(Severity::Fatal).collect::<Vec<_>>(), ["boom"]);
    }
}
