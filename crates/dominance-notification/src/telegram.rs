//! 텔레그램 알림 서비스.
//!
//! Telegram Bot API `sendMessage`로 수집기 알림을 전송합니다.

use crate::types::{
    Notification, NotificationError, NotificationEvent, NotificationPriority, NotificationResult,
    NotificationSender,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 텔레그램 알림 전송 설정.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// @BotFather에서 받은 봇 토큰
    pub bot_token: String,
    /// 메시지를 보낼 채팅 ID
    pub chat_id: String,
    /// 전송 활성화 여부
    pub enabled: bool,
    /// 파싱 모드 (HTML 또는 MarkdownV2)
    pub parse_mode: String,
    /// Bot API 기본 URL
    pub api_base: String,
    /// 요청 타임아웃
    pub timeout: Duration,
}

impl TelegramConfig {
    /// 새 텔레그램 설정을 생성합니다.
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            bot_token,
            chat_id,
            enabled: true,
            parse_mode: "HTML".to_string(),
            api_base: "https://api.telegram.org".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// 환경 변수에서 설정을 생성합니다.
    ///
    /// `TELEGRAM_BOT_TOKEN`과 `TELEGRAM_CHAT_ID`가 모두 있어야 합니다.
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok()?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID").ok()?;
        let enabled = std::env::var("TELEGRAM_ENABLED")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(true);

        Some(Self {
            enabled,
            ..Self::new(bot_token, chat_id)
        })
    }

    /// Bot API 기본 URL을 설정합니다.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// 요청 타임아웃을 설정합니다.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// 텔레그램 알림 전송기.
pub struct TelegramSender {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramSender {
    /// 새 텔레그램 전송기를 생성합니다.
    ///
    /// 응답이 없는 요청은 `config.timeout` 후 `NetworkError`로 끝납니다.
    pub fn new(config: TelegramConfig) -> NotificationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    /// 환경 변수에서 전송기를 생성합니다. 자격 증명이 없으면 `Ok(None)`입니다.
    pub fn from_env() -> NotificationResult<Option<Self>> {
        TelegramConfig::from_env().map(Self::new).transpose()
    }

    /// 알림을 텔레그램 메시지로 포맷합니다.
    fn format_message(&self, notification: &Notification) -> String {
        let priority_emoji = match notification.priority {
            NotificationPriority::Normal => "📊",
            NotificationPriority::High => "⚠️",
        };

        let content = match &notification.event {
            NotificationEvent::DataStale {
                symbol,
                last_update,
                stale_secs,
            } => {
                let last = last_update
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "-".to_string());
                format!(
                    "{priority_emoji} ⏸️ <b>데이터 갱신 중단</b>\n\n\
                     심볼: <code>{symbol}</code>\n\
                     마지막 갱신: {last}\n\
                     경과: {stale_secs}초"
                )
            }

            NotificationEvent::DataResumed {
                symbol,
                day,
                close,
                down_secs,
            } => {
                let close = close
                    .map(|c| format!("{c:.2}"))
                    .unwrap_or_else(|| "-".to_string());
                format!(
                    "{priority_emoji} ▶️ <b>데이터 갱신 재개</b>\n\n\
                     심볼: <code>{symbol}</code>\n\
                     일자: {day}\n\
                     종가: {close}\n\
                     중단 시간: {down_secs}초"
                )
            }
        };

        let timestamp = notification.timestamp.format("%Y-%m-%d %H:%M:%S UTC");
        format!("{content}\n\n<i>🕐 {timestamp}</i>")
    }

    /// 텔레그램에 원시 메시지를 전송합니다.
    async fn send_message(&self, text: &str) -> NotificationResult<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.config.api_base, self.config.bot_token
        );

        let params = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": text,
            "parse_mode": self.config.parse_mode,
            "disable_web_page_preview": true,
        });

        debug!(chat_id = %self.config.chat_id, "Sending Telegram message");

        let response = self.client.post(&url).json(&params).send().await?;

        if response.status().is_success() {
            info!("Telegram notification sent");
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            warn!("Telegram rate limited");
            return Err(NotificationError::RateLimited(60));
        }

        error!(%status, body = %body, "Failed to send Telegram message");
        Err(NotificationError::SendFailed(format!("HTTP {status}: {body}")))
    }
}

#[async_trait]
impl NotificationSender for TelegramSender {
    async fn send(&self, notification: &Notification) -> NotificationResult<()> {
        if !self.is_enabled() {
            debug!("Telegram notifications are disabled, skipping");
            return Ok(());
        }

        let message = self.format_message(notification);
        self.send_message(&message).await
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.bot_token.is_empty() && !self.config.chat_id.is_empty()
    }

    fn name(&self) -> &str {
        "telegram"
    }
}

/// 여러 전송기를 관리하는 알림 관리자.
#[derive(Default, Clone)]
pub struct NotificationManager {
    senders: Vec<Arc<dyn NotificationSender>>,
}

impl NotificationManager {
    /// 새 알림 관리자를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 알림 전송기를 추가합니다.
    pub fn add_sender<S: NotificationSender + 'static>(&mut self, sender: S) {
        self.senders.push(Arc::new(sender));
    }

    /// 활성화된 전송기가 있는지 확인합니다.
    pub fn has_enabled_sender(&self) -> bool {
        self.senders.iter().any(|s| s.is_enabled())
    }

    /// 활성화된 모든 전송기를 통해 알림을 전송합니다.
    ///
    /// 하나라도 성공하면 `Ok`, 모두 실패하면 마지막 에러를 반환합니다.
    pub async fn notify(&self, notification: &Notification) -> NotificationResult<()> {
        let mut last_error = None;
        let mut delivered = false;

        for sender in self.senders.iter().filter(|s| s.is_enabled()) {
            match sender.send(notification).await {
                Ok(()) => delivered = true,
                Err(e) => {
                    error!(sender = sender.name(), error = %e, "Failed to send notification");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !delivered => Err(e),
            _ => Ok(()),
        }
    }
}
