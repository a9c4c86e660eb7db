//! Telegram delivery adapter.
//!
//! Maps Bot API failures onto [`SendOutcome`] so the dispatcher can react to
//! flood control and blocked recipients without inspecting error strings.
//!
//! Requires the `telegram` feature.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{LinkPreviewOptions, ParseMode};
use teloxide::{ApiError, RequestError};
use tracing::{error, warn};

use crate::domain::SubscriberId;
use crate::port::{Messenger, SendOutcome};

pub struct TelegramMessenger {
    bot: Bot,
    /// Chat that receives cycle summaries and digests. Without one, operator
    /// traffic goes to the log only.
    operator_chat: Option<ChatId>,
}

impl TelegramMessenger {
    #[must_use]
    pub fn new(bot_token: &str, operator_chat_id: Option<i64>) -> Self {
        Self {
            bot: Bot::new(bot_token),
            operator_chat: operator_chat_id.map(ChatId),
        }
    }

    fn no_preview() -> LinkPreviewOptions {
        LinkPreviewOptions {
            is_disabled: true,
            url: None,
            prefer_small_media: false,
            prefer_large_media: false,
            show_above_text: false,
        }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send(&self, recipient: SubscriberId, text: &str) -> SendOutcome {
        let result = self
            .bot
            .send_message(ChatId(recipient.as_i64()), text)
            .parse_mode(ParseMode::Html)
            .link_preview_options(Self::no_preview())
            .await;

        match result {
            Ok(_) => SendOutcome::Sent,
            Err(RequestError::RetryAfter(seconds)) => {
                SendOutcome::RetryAfter(u64::from(seconds.seconds()))
            }
            Err(RequestError::Api(ApiError::BotBlocked)) => SendOutcome::Blocked,
            Err(e) => SendOutcome::Failed(e.to_string()),
        }
    }

    async fn send_operator(&self, text: &str) {
        let Some(chat) = self.operator_chat else {
            warn!(text, "no operator chat configured, dropping operator message");
            return;
        };
        if let Err(e) = self.bot.send_message(chat, text).await {
            error!(error = %e, "failed to deliver operator message");
        }
    }
}
