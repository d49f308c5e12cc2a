use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Methods,
    Buy { amount: i64, method: Option<String> },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("missing amount")]
    MissingAmount,
    #[error("amount is not a number: {0}")]
    AmountNotNumber(String),
}

impl BotCommand {
    /// `None` for plain text and commands this bot does not handle.
    /// A trailing `@botname` on the command word is ignored.
    pub fn parse(text: &str) -> Option<Result<Self, CommandError>> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?.strip_prefix('/')?;
        let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();

        let command = match name.as_str() {
            "start" | "help" => Ok(BotCommand::Start),
            "methods" => Ok(BotCommand::Methods),
            "buy" => match parts.next() {
                None => Err(CommandError::MissingAmount),
                Some(raw) => raw
                    .parse::<i64>()
                    .map(|amount| BotCommand::Buy {
                        amount,
                        method: parts.next().map(str::to_ascii_uppercase),
                    })
                    .map_err(|_| CommandError::AmountNotNumber(raw.to_string())),
            },
            _ => return None,
        };

        Some(command)
    }
}
