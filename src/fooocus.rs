//! Fooocus 图像获取
//!
//! 通过浏览器自动化驱动本地 Fooocus UI：填入提示词、点击生成，
//! 然后用两阶段策略定位生成的图像文件：
//!
//! 1. DOM 检测：等待页面出现 `<img>`，从其 src 的 `file=` 引用解析本地路径
//! 2. 回退：轮询输出目录（一层日期子目录）中新出现的图像文件
//!
//! 两个阶段不会合并：DOM 检测到的有效路径总是优先，
//! 即使目录轮询可能找到更新的文件。

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use scraper::{Html, Selector};
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::errors::{BotError, Result};
use crate::webdriver::{BrowserSession, WebDriverClient};

/// 提示词输入框选择器
const PROMPT_SELECTOR: &str = "textarea[data-testid=\"textbox\"]";
/// 生成按钮选择器
const GENERATE_SELECTOR: &str = "#generate_button";
/// 输入框出现的最长等待时间
const PROMPT_WAIT: Duration = Duration::from_secs(10);
/// DOM 检测阶段的等待上限（与总超时取较小值）
const DOM_WAIT_CAP: Duration = Duration::from_secs(60);
/// DOM 检测的页面轮询间隔
const DOM_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// 输出目录的轮询间隔
const OUTPUT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// 文件修改时间判定的容差窗口（时钟偏差容忍，可调）
const MTIME_GRACE: Duration = Duration::from_secs(1);
/// 识别为图像的扩展名
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// 图像生成器
///
/// 每次调用建立独立的浏览器会话，顺序使用，调用间不共享。
#[derive(Debug, Clone)]
pub struct ImageGenerator {
    webdriver: WebDriverClient,
    ui_url: String,
    outputs_dir: PathBuf,
    headless: bool,
}

impl ImageGenerator {
    pub fn new(
        webdriver_url: String,
        ui_url: String,
        outputs_dir: impl Into<PathBuf>,
        headless: bool,
    ) -> Self {
        Self {
            webdriver: WebDriverClient::new(webdriver_url),
            ui_url,
            outputs_dir: outputs_dir.into(),
            headless,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.webdriver_url.clone(),
            config.fooocus_url.clone(),
            config.outputs_dir.clone(),
            config.headless,
        )
    }

    /// 生成图像并返回其绝对路径
    ///
    /// 单次尝试，无重试。无论结果如何，浏览器会话都会被尽力清理，
    /// 清理失败不会覆盖已取得的结果。
    pub async fn generate(&self, prompt: &str, timeout: Duration) -> Result<PathBuf> {
        let started = SystemTime::now();
        let deadline = Instant::now() + timeout;

        let session = self
            .webdriver
            .new_session(self.headless)
            .await
            .map_err(browser_err)?;

        let result = self.drive(&session, prompt, started, deadline, timeout).await;
        session.close().await;
        result
    }

    async fn drive(
        &self,
        session: &BrowserSession,
        prompt: &str,
        started: SystemTime,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<PathBuf> {
        session.goto(&self.ui_url).await.map_err(browser_err)?;

        let prompt_box = session
            .wait_for_element(PROMPT_SELECTOR, PROMPT_WAIT)
            .await
            .map_err(browser_err)?
            .ok_or_else(|| {
                BotError::UiTimeoutError(format!(
                    "prompt textbox did not appear within {}s",
                    PROMPT_WAIT.as_secs()
                ))
            })?;

        session
            .send_keys(&prompt_box, prompt)
            .await
            .map_err(browser_err)?;

        let generate_button = session
            .find_element(GENERATE_SELECTOR)
            .await
            .map_err(browser_err)?
            .ok_or_else(|| BotError::UiTimeoutError("generate button not found".to_string()))?;
        session.click(&generate_button).await.map_err(browser_err)?;
        debug!("generation triggered");

        // 第一阶段：DOM 检测。有效结果立即返回，优先于目录轮询
        let dom_deadline = (Instant::now() + DOM_WAIT_CAP.min(timeout)).min(deadline);
        if let Some(path) = self.watch_page(session, dom_deadline).await {
            info!(path = %path.display(), "image detected in page");
            return Ok(path);
        }

        // 第二阶段：轮询输出目录中的新文件
        debug!(dir = %self.outputs_dir.display(), "falling back to output directory polling");
        if let Some(path) = poll_outputs(&self.outputs_dir, started, deadline).await {
            info!(path = %path.display(), "new output file detected");
            return Ok(path);
        }

        Err(BotError::TimeoutError(
            "no image detected in browser and no new output files".to_string(),
        ))
    }

    /// 轮询页面源码直到出现 `<img>`，随后只做一次提取尝试。
    /// 提取失败（无 `file=`、解码失败、文件不存在）或传输出错时
    /// 放弃本阶段，由调用方回退到目录轮询。
    async fn watch_page(&self, session: &BrowserSession, deadline: Instant) -> Option<PathBuf> {
        loop {
            match session.page_source().await {
                Ok(html) => {
                    if let Some(src) = first_image_src(&html) {
                        let path = src
                            .as_deref()
                            .and_then(extract_file_path)
                            .filter(|p| p.exists());
                        if path.is_none() {
                            debug!("image element unusable, abandoning page detection");
                        }
                        return path;
                    }
                }
                Err(err) => {
                    debug!("page source unavailable: {:#}", err);
                    return None;
                }
            }

            if Instant::now() >= deadline {
                return None;
            }
            sleep(DOM_POLL_INTERVAL).await;
        }
    }
}

fn browser_err(err: anyhow::Error) -> BotError {
    BotError::BrowserError(format!("{:#}", err))
}

/// 页面中第一个 `<img>` 元素的 src 属性。
/// 外层 None 表示页面尚无 `<img>`；内层 None 表示该元素缺少 src。
fn first_image_src(html: &str) -> Option<Option<String>> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("img").expect("valid img selector");

    document
        .select(&selector)
        .next()
        .map(|img| img.value().attr("src").map(str::to_string))
}

/// 从 img src 中取出 `file=` 之后的本地路径：
/// 截掉 `?` 查询串、百分号解码、相对路径按进程工作目录解析为绝对路径。
fn extract_file_path(src: &str) -> Option<PathBuf> {
    let (_, part) = src.split_once("file=")?;
    let part = part.split_once('?').map(|(p, _)| p).unwrap_or(part);

    let decoded = urlencoding::decode(part).ok()?;
    if decoded.is_empty() {
        return None;
    }

    let path = PathBuf::from(decoded.into_owned());
    if path.is_absolute() {
        Some(path)
    } else {
        std::env::current_dir().ok().map(|cwd| cwd.join(path))
    }
}

/// 扫描输出目录的一层子目录（Fooocus 按日期建目录），
/// 返回修改时间不早于 `after - 容差` 的最新图像文件。
/// 目录不存在视为无结果，不是错误。
pub fn find_newest_output(outputs_dir: &Path, after: SystemTime) -> Option<PathBuf> {
    let threshold = after.checked_sub(MTIME_GRACE).unwrap_or(after);
    let entries = std::fs::read_dir(outputs_dir).ok()?;

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let dir_path = entry.path();
        if !dir_path.is_dir() {
            continue;
        }
        let Ok(files) = std::fs::read_dir(&dir_path) else {
            continue;
        };

        for file in files.flatten() {
            let path = file.path();
            if !path.is_file() || !is_image_file(&path) {
                continue;
            }
            let Ok(metadata) = file.metadata() else {
                continue;
            };
            let Ok(mtime) = metadata.modified() else {
                continue;
            };
            if mtime < threshold {
                continue;
            }

            match &newest {
                Some((best, _)) if *best >= mtime => {}
                _ => newest = Some((mtime, path)),
            }
        }
    }

    newest.map(|(_, path)| path)
}

/// 以固定间隔扫描输出目录，直到找到新文件或到达截止时间
pub async fn poll_outputs(
    outputs_dir: &Path,
    after: SystemTime,
    deadline: Instant,
) -> Option<PathBuf> {
    loop {
        if let Some(path) = find_newest_output(outputs_dir, after) {
            return Some(path);
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(OUTPUT_POLL_INTERVAL).await;
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
