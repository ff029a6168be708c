use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// 元素查找的轮询间隔
const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// 页面加载超时（eager 策略，等同 DOMContentLoaded）
const PAGE_LOAD_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Clone)]
pub struct WebDriverClient {
    base: String,
    http: reqwest::Client,
}

/// 一个已建立的浏览器会话
#[derive(Debug)]
pub struct BrowserSession {
    base: String,
    session_id: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct NewSessionValue {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct ElementValue {
    // W3C WebDriver 协议中元素引用的固定键名
    #[serde(rename = "element-6066-11e4-a52e-4f735466cecf")]
    element_id: String,
}

/// WebDriver 端点返回的协议级错误
#[derive(Debug, thiserror::Error)]
#[error("webdriver error: {code}: {message}")]
pub struct WdFailure {
    pub code: String,
    pub message: String,
}

impl WebDriverClient {
    pub fn new(base: String) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build http client");

        Self {
            base: base.trim_end_matches('/').to_string(),
            http,
        }
    }

    /// 建立一个新的（可选无头）Chrome 会话
    pub async fn new_session(&self, headless: bool) -> Result<BrowserSession> {
        let url = format!("{}/session", self.base);
        let res = self
            .http
            .post(url)
            .json(&session_payload(headless))
            .send()
            .await
            .context("failed to reach webdriver endpoint")?;

        let value = take_value(res).await.context("failed to create session")?;
        let session: NewSessionValue =
            serde_json::from_value(value).context("failed to deserialize session response")?;

        Ok(BrowserSession {
            base: self.base.clone(),
            session_id: session.session_id,
            http: self.http.clone(),
        })
    }
}

impl BrowserSession {
    /// 导航到指定 URL（阻塞至 DOMContentLoaded 或页面加载超时）
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.post("/url", json!({ "url": url }))
            .await
            .context("failed to navigate")?;
        Ok(())
    }

    /// 按 CSS 选择器查找元素，未找到时返回 None
    pub async fn find_element(&self, selector: &str) -> Result<Option<String>> {
        let body = json!({ "using": "css selector", "value": selector });
        match self.post("/element", body).await {
            Ok(value) => {
                let element: ElementValue = serde_json::from_value(value)
                    .context("failed to deserialize element reference")?;
                Ok(Some(element.element_id))
            }
            Err(err) => match err.downcast_ref::<WdFailure>() {
                Some(failure) if failure.code == "no such element" => Ok(None),
                _ => Err(err),
            },
        }
    }

    /// 轮询等待元素出现；超出时限仍未出现时返回 None
    pub async fn wait_for_element(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<String>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(element_id) = self.find_element(selector).await? {
                return Ok(Some(element_id));
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(ELEMENT_POLL_INTERVAL).await;
        }
    }

    /// 向元素输入文本
    pub async fn send_keys(&self, element_id: &str, text: &str) -> Result<()> {
        self.post(
            &format!("/element/{}/value", element_id),
            json!({ "text": text }),
        )
        .await
        .context("failed to send keys")?;
        Ok(())
    }

    /// 点击元素
    pub async fn click(&self, element_id: &str) -> Result<()> {
        self.post(&format!("/element/{}/click", element_id), json!({}))
            .await
            .context("failed to click element")?;
        Ok(())
    }

    /// 当前页面渲染后的 HTML 源码
    pub async fn page_source(&self) -> Result<String> {
        let url = format!("{}/session/{}/source", self.base, self.session_id);
        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("failed to fetch page source")?;

        let value = take_value(res).await.context("failed to read page source")?;
        value
            .as_str()
            .map(str::to_string)
            .context("page source was not a string")
    }

    /// 关闭会话。尽力而为：清理失败只记录日志，绝不影响调用方结果
    pub async fn close(self) {
        let url = format!("{}/session/{}", self.base, self.session_id);
        match self.http.delete(url).send().await {
            Ok(res) => {
                if let Err(err) = res.error_for_status() {
                    debug!("failed to close browser session: {}", err);
                }
            }
            Err(err) => debug!("failed to close browser session: {}", err),
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/session/{}{}", self.base, self.session_id, path);
        let res = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .context("webdriver request failed")?;
        take_value(res).await
    }
}

/// 新会话的 capabilities 载荷
fn session_payload(headless: bool) -> serde_json::Value {
    let mut args = vec!["--disable-gpu", "--no-sandbox", "--window-size=1280,800"];
    if headless {
        args.push("--headless=new");
    }

    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "pageLoadStrategy": "eager",
                "timeouts": { "pageLoad": PAGE_LOAD_TIMEOUT_MS },
                "goog:chromeOptions": { "args": args }
            }
        }
    })
}

/// 解包 WebDriver 响应的 value 字段，非 2xx 时转为 [`WdFailure`]
async fn take_value(res: reqwest::Response) -> Result<serde_json::Value> {
    let status = res.status();
    let mut body: serde_json::Value = res
        .json()
        .await
        .context("failed to decode webdriver response")?;

    let value = body
        .get_mut("value")
        .map(serde_json::Value::take)
        .unwrap_or(serde_json::Value::Null);

    if status.is_success() {
        return Ok(value);
    }

    let code = value
        .get("error")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown error")
        .to_string();
    let message = value
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    Err(WdFailure { code, message }.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = WebDriverClient::new("http://127.0.0.1:9515/".to_string());
        assert_eq!(client.base, "http://127.0.0.1:9515");
    }

    #[test]
    fn test_session_payload_headless() {
        let payload = session_payload(true);
        let caps = &payload["capabilities"]["alwaysMatch"];
        assert_eq!(caps["browserName"], "chrome");
        assert_eq!(caps["pageLoadStrategy"], "eager");

        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.iter().any(|a| a == "--headless=new"));
    }

    #[test]
    fn test_session_payload_headful() {
        let payload = session_payload(false);
        let args = payload["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap();
        assert!(!args.iter().any(|a| a == "--headless=new"));
    }

    #[test]
    fn test_new_session_value_deserialization() {
        let json_str = r#"{
            "sessionId": "f0d0e92a1b2c",
            "capabilities": { "browserName": "chrome" }
        }"#;

        let value: NewSessionValue = serde_json::from_str(json_str).unwrap();
        assert_eq!(value.session_id, "f0d0e92a1b2c");
    }

    #[test]
    fn test_element_value_deserialization() {
        let json_str = r#"{
            "element-6066-11e4-a52e-4f735466cecf": "deadbeef-0001"
        }"#;

        let value: ElementValue = serde_json::from_str(json_str).unwrap();
        assert_eq!(value.element_id, "deadbeef-0001");
    }

    #[test]
    fn test_wd_failure_display() {
        let failure = WdFailure {
            code: "no such element".to_string(),
            message: "Unable to locate element".to_string(),
        };
        let msg = failure.to_string();
        assert!(msg.contains("no such element"));
        assert!(msg.contains("Unable to locate element"));
    }
}
