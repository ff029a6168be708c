use std::path::PathBuf;

use serenity::all::{
    ApplicationId, Client, Command, CommandDataOptionValue, CommandInteraction,
    CommandOptionType, Context, CreateAttachment, CreateCommand, CreateCommandOption,
    EditInteractionResponse, EventHandler, GatewayIntents, GuildId, Http, Interaction, Ready,
};
use serenity::async_trait;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{AppConfig, DeployScope};
use crate::errors::{BotError, Result};
use crate::fooocus::ImageGenerator;
use crate::logger::Timer;

/// 斜杠命令名称
pub const COMMAND_NAME: &str = "imagine";
/// 提示词参数名称
const PROMPT_OPTION: &str = "prompt";

/// Discord 机器人：注册 /imagine 命令并处理交互
pub struct Bot {
    config: AppConfig,
    generator: ImageGenerator,
}

impl Bot {
    pub fn new(config: AppConfig) -> Self {
        let generator = ImageGenerator::from_config(&config);
        Self { config, generator }
    }

    fn command_definition() -> CreateCommand {
        CreateCommand::new(COMMAND_NAME)
            .description("Generate an image with Fooocus")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    PROMPT_OPTION,
                    "Prompt to generate",
                )
                .required(true),
            )
    }

    async fn handle_imagine(&self, ctx: &Context, command: &CommandInteraction) {
        let request_id = Uuid::new_v4().to_string();

        // 先做延迟应答，避免平台 3 秒交互超时
        if let Err(err) = command.defer(&ctx.http).await {
            error!(request_id = %request_id, "failed to defer reply: {}", err);
            return;
        }

        let Some(prompt) = prompt_option(command) else {
            let edit = EditInteractionResponse::new()
                .content("Error generating image: missing prompt option.");
            if let Err(err) = command.edit_response(&ctx.http, edit).await {
                error!(request_id = %request_id, "failed to edit reply: {}", err);
            }
            return;
        };

        info!(request_id = %request_id, prompt = %prompt, "imagine requested");
        let timer = Timer::new("imagine").with_request_id(request_id.clone());

        let outcome = self
            .generator
            .generate(&prompt, self.config.generation_timeout())
            .await;
        drop(timer);

        match &outcome {
            Ok(path) => info!(request_id = %request_id, path = %path.display(), "image ready"),
            Err(err) => warn!(request_id = %request_id, "generation failed: {}", err),
        }

        let mut edit = EditInteractionResponse::new().content(reply_content(&prompt, &outcome));
        if let Ok(path) = &outcome {
            match CreateAttachment::path(path).await {
                Ok(attachment) => edit = edit.new_attachment(attachment),
                Err(err) => {
                    warn!(request_id = %request_id, "failed to read generated file: {}", err);
                    edit = EditInteractionResponse::new()
                        .content(format!("Error generating image: {}", err));
                }
            }
        }

        if let Err(err) = command.edit_response(&ctx.http, edit).await {
            error!(request_id = %request_id, "failed to edit reply: {}", err);
        }
    }
}

#[async_trait]
impl EventHandler for Bot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 Logged in as {}", ready.user.name);
        if let Err(err) = deploy_commands(&ctx.http, &self.config.deploy_scope).await {
            error!("command deployment failed: {}", err);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            match command.data.name.as_str() {
                COMMAND_NAME => self.handle_imagine(&ctx, &command).await,
                other => warn!("received unknown command: {}", other),
            }
        }
    }
}

/// 三种结果对应的回复文案：
/// 成功带附件回显提示词；超时未找到图像是软失败；其余错误附带描述。
fn reply_content(prompt: &str, outcome: &Result<PathBuf>) -> String {
    match outcome {
        Ok(_) => format!("Here is your image for: \"{}\"", prompt),
        Err(BotError::TimeoutError(_)) => {
            "No image was generated or it could not be found.".to_string()
        }
        Err(err) => format!("Error generating image: {}", err),
    }
}

fn prompt_option(command: &CommandInteraction) -> Option<String> {
    command
        .data
        .options
        .iter()
        .find(|option| option.name == PROMPT_OPTION)
        .and_then(|option| match &option.value {
            CommandDataOptionValue::String(value) if !value.trim().is_empty() => {
                Some(value.clone())
            }
            _ => None,
        })
}

/// 注册斜杠命令。global 范围整体注册；
/// 服务器列表逐个注册，单个失败只告警，不中断其余部署。
pub async fn deploy_commands(http: &Http, scope: &DeployScope) -> Result<()> {
    match scope {
        DeployScope::Global => {
            info!(
                "🌐 Deploying /{} globally (may take up to an hour to propagate)",
                COMMAND_NAME
            );
            Command::create_global_command(http, Bot::command_definition())
                .await
                .map_err(|err| {
                    BotError::DiscordError(format!("global deployment failed: {}", err))
                })?;
            info!("✅ Global command deployed");
        }
        DeployScope::Guilds(guild_ids) => {
            info!("Deploying /{} to {} guild(s)", COMMAND_NAME, guild_ids.len());
            for guild_id in guild_ids {
                match GuildId::new(*guild_id)
                    .create_command(http, Bot::command_definition())
                    .await
                {
                    Ok(_) => info!("✅ Deployed to guild {}", guild_id),
                    Err(err) => warn!("⚠️  Failed to deploy to guild {}: {}", guild_id, err),
                }
            }
        }
    }

    Ok(())
}

/// 仅通过 HTTP 注册命令（`--deploy-only` 模式，不连接网关）
pub async fn deploy_only(config: &AppConfig) -> Result<()> {
    let http = Http::new(&config.discord_token);
    http.set_application_id(ApplicationId::new(config.client_id));
    deploy_commands(&http, &config.deploy_scope).await
}

/// 启动网关客户端并阻塞运行（交互事件不需要任何 intent）
pub async fn run(config: AppConfig) -> Result<()> {
    let token = config.discord_token.clone();
    let bot = Bot::new(config);

    let mut client = Client::builder(&token, GatewayIntents::empty())
        .event_handler(bot)
        .await
        .map_err(|err| BotError::DiscordError(format!("failed to create client: {}", err)))?;

    client
        .start()
        .await
        .map_err(|err| BotError::DiscordError(format!("gateway client error: {}", err)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_content_success() {
        let outcome = Ok(PathBuf::from("/out/2024-05-01/img.png"));
        let content = reply_content("a red fox", &outcome);
        assert_eq!(content, "Here is your image for: \"a red fox\"");
    }

    #[test]
    fn test_reply_content_soft_failure_on_timeout() {
        let outcome = Err(BotError::TimeoutError(
            "no image detected in browser and no new output files".to_string(),
        ));
        let content = reply_content("a red fox", &outcome);
        assert_eq!(content, "No image was generated or it could not be found.");
    }

    #[test]
    fn test_reply_content_hard_failure_includes_description() {
        let outcome = Err(BotError::BrowserError("connection refused".to_string()));
        let content = reply_content("a red fox", &outcome);
        assert!(content.starts_with("Error generating image:"));
        assert!(content.contains("connection refused"));
    }

    #[test]
    fn test_command_definition_shape() {
        let value = serde_json::to_value(Bot::command_definition()).unwrap();
        assert_eq!(value["name"], COMMAND_NAME);

        let options = value["options"].as_array().unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0]["name"], PROMPT_OPTION);
        assert_eq!(options[0]["required"], true);
    }
}
