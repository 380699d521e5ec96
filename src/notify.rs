use teloxide::prelude::*;
use teloxide::types::Recipient;

use crate::config::AppSettings;

/// Sends run summaries to a Telegram chat when a token and chat id are configured.
pub struct Notifier {
    target: Option<(Bot, Recipient)>,
}

fn recipient(chat_id: &str) -> Recipient {
    match chat_id.trim().parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(chat_id.trim().to_string()),
    }
}

impl Notifier {
    pub fn from_settings(settings: &AppSettings) -> Self {
        let target = match (&settings.telegram_token, &settings.chat_id) {
            (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
                Some((Bot::new(token), recipient(chat_id)))
            }
            _ => None,
        };
        Self { target }
    }

    pub fn disabled() -> Self {
        Self { target: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Delivery failures are logged and otherwise ignored.
    pub async fn send(&self, text: impl Into<String>) {
        let Some((bot, chat)) = &self.target else {
            return;
        };
        if let Err(e) = bot.send_message(chat.clone(), text.into()).await {
            tracing::warn!(error = %e, "Failed to send Telegram notification");
        }
    }
}
