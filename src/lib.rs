//! Fooocus Discord 机器人
//!
//! 提供单一 /imagine 斜杠命令：
//! - 通过 WebDriver 驱动本地 Fooocus UI 生成图像
//! - 从页面 `<img>` 的 `file=` 引用解析本地文件路径
//! - 回退为轮询输出目录中新出现的图像文件
//! - 以附件形式编辑延迟回复返回结果
//!
//! # 模块划分
//!
//! - `config`: 环境变量 / 命令行配置
//! - `discord`: 命令注册与交互处理
//! - `fooocus`: 图像获取流程（DOM 检测 + 目录轮询）
//! - `webdriver`: 精简的 W3C WebDriver 客户端
//! - `logger`: 结构化日志与性能指标

pub mod config;
pub mod discord;
pub mod errors;
pub mod fooocus;
pub mod logger;
pub mod webdriver;

pub use config::{AppConfig, DeployScope};
pub use discord::Bot;
pub use errors::{BotError, Result};
pub use fooocus::ImageGenerator;
pub use webdriver::{BrowserSession, WebDriverClient};

/// 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
