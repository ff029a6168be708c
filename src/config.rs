use std::time::Duration;

use clap::Parser;

/// 斜杠命令部署范围
#[derive(Debug, Clone, PartialEq)]
pub enum DeployScope {
    /// 全局部署（所有服务器，传播最长约一小时）
    Global,
    /// 部署到指定的服务器列表
    Guilds(Vec<u64>),
}

impl std::str::FromStr for DeployScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("global") {
            return Ok(DeployScope::Global);
        }

        let ids = trimmed
            .split(',')
            .map(|part| {
                let part = part.trim();
                match part.parse::<u64>() {
                    Ok(0) | Err(_) => Err(format!("invalid guild id: {}", part)),
                    Ok(id) => Ok(id),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DeployScope::Guilds(ids))
    }
}

impl std::fmt::Display for DeployScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployScope::Global => write!(f, "global"),
            DeployScope::Guilds(ids) => {
                let list = ids
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "{}", list)
            }
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Discord /imagine bot driving a local Fooocus UI"
)]
pub struct AppConfig {
    /// Discord bot token
    #[arg(long, env = "DISCORD_TOKEN")]
    pub discord_token: String,

    /// Discord application (client) id
    #[arg(long, env = "CLIENT_ID")]
    pub client_id: u64,

    /// 部署范围: global 或逗号分隔的服务器 ID 列表
    #[arg(long, env = "GUILD_ID", default_value = "global")]
    pub deploy_scope: DeployScope,

    // Fooocus 配置
    /// Fooocus UI 地址
    #[arg(long, env = "FOOOCUS_URL", default_value = "http://127.0.0.1:7865/")]
    pub fooocus_url: String,

    /// Fooocus 输出目录（内含日期子目录）
    #[arg(long, env = "FOOOCUS_OUTPUTS_DIR", default_value = "./outputs")]
    pub outputs_dir: String,

    // 浏览器自动化配置
    /// WebDriver（chromedriver）地址
    #[arg(long, env = "WEBDRIVER_URL", default_value = "http://127.0.0.1:9515")]
    pub webdriver_url: String,

    /// 是否以无头模式启动浏览器
    #[arg(long, env = "BROWSER_HEADLESS", default_value_t = true, action = clap::ArgAction::Set)]
    pub headless: bool,

    /// 单次生成的超时时间（秒）
    #[arg(long, env = "GENERATION_TIMEOUT_SECS", default_value_t = 120)]
    pub generation_timeout_secs: u64,

    /// 仅注册斜杠命令，不启动网关
    #[arg(long, env = "DEPLOY_ONLY")]
    pub deploy_only: bool,
}

impl AppConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN is required");
        }
        if self.client_id == 0 {
            anyhow::bail!("CLIENT_ID must be a non-zero application id");
        }
        url::Url::parse(&self.fooocus_url)
            .map_err(|err| anyhow::anyhow!("FOOOCUS_URL is not a valid URL: {}", err))?;
        url::Url::parse(&self.webdriver_url)
            .map_err(|err| anyhow::anyhow!("WEBDRIVER_URL is not a valid URL: {}", err))?;
        if self.generation_timeout_secs == 0 {
            anyhow::bail!("GENERATION_TIMEOUT_SECS must be greater than zero");
        }

        Ok(())
    }

    /// 单次生成的超时预算
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}
