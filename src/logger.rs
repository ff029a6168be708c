//! 日志模块 - 结构化日志与性能指标
//!
//! 特性：
//! - 支持人类可读和 JSON 两种格式
//! - 敏感信息（bot token）自动脱敏
//! - 生成耗时的性能指标记录
//! - 通过 `RUST_LOG` / `LOG_FORMAT` 配置级别与格式

use std::fmt;
use std::time::Instant;
use tracing::{field, Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter,
};

/// 日志格式类型
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// 人类可读格式（带颜色）
    Pretty,
    /// 紧凑单行格式
    Compact,
    /// JSON 结构化格式（适合日志收集系统）
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Pretty
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 日志格式
    pub format: LogFormat,
    /// 是否启用颜色（仅 Pretty 格式有效）
    pub enable_color: bool,
    /// 是否显示目标模块
    pub show_target: bool,
    /// 是否显示时间
    pub show_time: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            enable_color: true,
            show_target: true,
            show_time: true,
        }
    }
}

/// 初始化日志系统
///
/// # 环境变量
/// - `RUST_LOG`: 日志级别过滤（如 `info`, `debug`, `fooocus_bot=trace`）
/// - `LOG_FORMAT`: 日志格式（`pretty`, `compact`, `json`）
pub fn init(config: LogConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .event_format(PrettyFormatter::new(config))
                .fmt_fields(PrettyFields);
            subscriber.with(fmt_layer).init();
        }
        LogFormat::Compact => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(config.show_target)
                .with_ansi(config.enable_color);
            subscriber.with(fmt_layer).init();
        }
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(config.show_target)
                .with_current_span(true)
                .with_span_list(true);
            subscriber.with(fmt_layer).init();
        }
    }
}

/// 性能计时器 - 自动记录执行时间
pub struct Timer {
    name: String,
    start: Instant,
    request_id: Option<String>,
}

impl Timer {
    /// 创建新的计时器
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
            request_id: None,
        }
    }

    /// 关联到一次请求
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;

        match &self.request_id {
            Some(req_id) => {
                tracing::info!(
                    target: "metrics",
                    request_id = %req_id,
                    operation = %self.name,
                    elapsed_ms = %format!("{:.2}", elapsed_ms),
                    "operation completed"
                );
            }
            None => {
                tracing::info!(
                    target: "metrics",
                    operation = %self.name,
                    elapsed_ms = %format!("{:.2}", elapsed_ms),
                    "operation completed"
                );
            }
        }
    }
}

/// 敏感信息脱敏工具
pub struct Sanitizer;

impl Sanitizer {
    /// 脱敏 bot token - 只保留前 6 位和后 4 位
    pub fn token(token: &str) -> String {
        if token.len() <= 12 {
            return "***".to_string();
        }
        format!("{}...{}", &token[..6], &token[token.len() - 4..])
    }
}

/// 自定义美观格式器
pub struct PrettyFormatter {
    config: LogConfig,
}

impl PrettyFormatter {
    pub fn new(config: LogConfig) -> Self {
        Self { config }
    }
}

impl<S, N> FormatEvent<S, N> for PrettyFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        // 时间戳
        if self.config.show_time {
            write!(writer, "{} ", chrono::Local::now().to_rfc3339())?;
        }

        // 日志级别（带颜色）
        let level = event.metadata().level();
        if self.config.enable_color {
            match *level {
                Level::ERROR => write!(writer, "\x1b[31m[ERROR]\x1b[0m ")?, // 红色
                Level::WARN => write!(writer, "\x1b[33m[WARN]\x1b[0m ")?,   // 黄色
                Level::INFO => write!(writer, "\x1b[32m[INFO]\x1b[0m ")?,   // 绿色
                Level::DEBUG => write!(writer, "\x1b[34m[DEBUG]\x1b[0m ")?, // 蓝色
                Level::TRACE => write!(writer, "\x1b[35m[TRACE]\x1b[0m ")?, // 紫色
            }
        } else {
            write!(writer, "[{}] ", level)?;
        }

        // 目标模块
        if self.config.show_target {
            write!(writer, "{} ", event.metadata().target())?;
        }

        // 消息内容
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// 自定义字段格式化
pub struct PrettyFields;

impl FormatFields<'_> for PrettyFields {
    fn format_fields<R: tracing_subscriber::field::RecordFields>(
        &self,
        writer: Writer<'_>,
        fields: R,
    ) -> std::fmt::Result {
        let mut visitor = FieldVisitor {
            writer,
            result: Ok(()),
        };
        fields.record(&mut visitor);
        visitor.result
    }
}

struct FieldVisitor<'a> {
    writer: Writer<'a>,
    result: std::fmt::Result,
}

impl field::Visit for FieldVisitor<'_> {
    fn record_debug(&mut self, field: &field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.result = write!(self.writer, "{:?}", value);
        } else {
            self.result = write!(self.writer, " {}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &field::Field, value: &str) {
        if field.name() == "message" {
            self.result = write!(self.writer, "{}", value);
        } else {
            self.result = write!(self.writer, " {}={}", field.name(), value);
        }
    }

    fn record_i64(&mut self, field: &field::Field, value: i64) {
        self.result = write!(self.writer, " {}={}", field.name(), value);
    }

    fn record_u64(&mut self, field: &field::Field, value: u64) {
        self.result = write!(self.writer, " {}={}", field.name(), value);
    }

    fn record_bool(&mut self, field: &field::Field, value: bool) {
        self.result = write!(self.writer, " {}={}", field.name(), value);
    }

    fn record_f64(&mut self, field: &field::Field, value: f64) {
        self.result = write!(self.writer, " {}={:.2}", field.name(), value);
    }
}
