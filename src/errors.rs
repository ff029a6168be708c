//! 标准化错误处理
//!
//! 定义项目专用的错误类型

use thiserror::Error;

/// 项目主要错误类型
#[derive(Error, Debug)]
pub enum BotError {
    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 浏览器会话错误（WebDriver 不可达、导航失败等）
    #[error("Browser session error: {0}")]
    BrowserError(String),

    /// 页面元素等待超时
    #[error("UI element timeout: {0}")]
    UiTimeoutError(String),

    /// 生成超时，未检测到任何图像
    #[error("Timed out waiting for generated image: {0}")]
    TimeoutError(String),

    /// Discord 平台错误
    #[error("Discord error: {0}")]
    DiscordError(String),

    /// 文件系统错误
    #[error("Filesystem error: {0}")]
    FsError(String),

    /// 未知错误
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for BotError {
    fn from(err: anyhow::Error) -> Self {
        BotError::Unknown(err.to_string())
    }
}

impl From<std::io::Error> for BotError {
    fn from(err: std::io::Error) -> Self {
        BotError::FsError(err.to_string())
    }
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        BotError::BrowserError(err.to_string())
    }
}

impl From<serenity::Error> for BotError {
    fn from(err: serenity::Error) -> Self {
        BotError::DiscordError(err.to_string())
    }
}

/// 项目结果类型别名
pub type Result<T> = std::result::Result<T, BotError>;
