use std::{sync::Arc, time::Duration};

use anyhow::Result;
use crates::notifications::telegram::{InlineKeyboardMarkup, Message, TelegramClient, Update};
use tracing::{error, info, warn};

use super::{
    commands::{BotCommand, CommandError},
    messages,
};
use crate::usecases::invoices::{InvoiceError, InvoiceUseCase};

const POLL_TIMEOUT_SECS: u64 = 25;
const RETRY_PAUSE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct BotReply {
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl BotReply {
    fn text(text: String) -> Self {
        Self {
            text,
            keyboard: None,
        }
    }
}

pub struct BotWorker {
    client: Arc<TelegramClient>,
    usecase: Arc<InvoiceUseCase>,
    default_method: String,
}

impl BotWorker {
    pub fn new(
        client: Arc<TelegramClient>,
        usecase: Arc<InvoiceUseCase>,
        default_method: String,
    ) -> Self {
        Self {
            client,
            usecase,
            default_method,
        }
    }

    pub async fn run(&self) -> Result<()> {
        info!("telegram bot: polling for updates");
        let mut offset: Option<i64> = None;

        loop {
            let updates = match self.client.get_updates(offset, POLL_TIMEOUT_SECS).await {
                Ok(updates) => updates,
                Err(err) => {
                    error!(error = %err, "telegram bot: getUpdates failed");
                    tokio::time::sleep(RETRY_PAUSE).await;
                    continue;
                }
            };

            for update in updates {
                offset = Some(update.update_id + 1);
                self.handle_update(update).await;
            }
        }
    }

    async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let chat_id = message.chat.id;

        let Some(reply) = reply_for(&self.usecase, &self.default_method, &message).await else {
            return;
        };

        if let Err(err) = self
            .client
            .send_message(chat_id, &reply.text, reply.keyboard.as_ref())
            .await
        {
            warn!(chat_id, error = %err, "telegram bot: reply failed");
        }
    }
}

/// Maps one incoming chat message to the reply the bot should send, if any.
pub async fn reply_for(
    usecase: &InvoiceUseCase,
    default_method: &str,
    message: &Message,
) -> Option<BotReply> {
    let command = BotCommand::parse(message.text.as_deref()?)?;

    let reply = match command {
        Ok(BotCommand::Start) => BotReply::text(messages::help(default_method)),
        Ok(BotCommand::Methods) => match usecase.list_active_channels().await {
            Ok(channels) => BotReply::text(messages::channel_list(&channels)),
            Err(err) => BotReply::text(messages::channels_failed(&err.to_string())),
        },
        Ok(BotCommand::Buy { amount, method }) => {
            let Some(user) = message.from.as_ref() else {
                return Some(BotReply::text(messages::unknown_sender()));
            };
            let method = method.unwrap_or_else(|| default_method.to_string());

            match usecase
                .create_invoice(user.id, amount, &method, user.first_name.as_deref())
                .await
            {
                Ok(invoice) => {
                    let (text, keyboard) = messages::invoice_created(&invoice);
                    BotReply {
                        text,
                        keyboard: (!keyboard.is_empty()).then_some(keyboard),
                    }
                }
                Err(InvoiceError::InvalidAmount { minimum, .. }) => {
                    BotReply::text(messages::amount_too_small(minimum))
                }
                Err(err) => BotReply::text(messages::invoice_failed(&err.to_string())),
            }
        }
        Err(CommandError::MissingAmount) => BotReply::text(messages::buy_usage()),
        Err(CommandError::AmountNotNumber(_)) => BotReply::text(messages::amount_not_number()),
    };

    Some(reply)
}
