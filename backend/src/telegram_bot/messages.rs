use crates::{
    domain::entities::invoices::InvoiceEntity,
    notifications::telegram::{InlineKeyboardButton, InlineKeyboardMarkup},
    payments::tripay_client::PaymentChannel,
};

pub const MAX_LISTED_CHANNELS: usize = 30;

/// `10000` -> `Rp10.000`
pub fn rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if amount < 0 {
        format!("-Rp{grouped}")
    } else {
        format!("Rp{grouped}")
    }
}

/// Backslash-escapes the entity markers of Telegram's legacy Markdown so
/// free text (gateway errors, channel names) cannot break message parsing.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

pub fn help(default_method: &str) -> String {
    format!(
        "Tripay payment bot.\n\n\
         Commands:\n\
         /methods - list active payment methods\n\
         /buy <amount> [method] - create an invoice (default method `{default_method}`)\n\
         Example: /buy 10000 QRIS"
    )
}

pub fn buy_usage() -> String {
    "Usage: /buy <amount> [method]\nExample: /buy 10000 QRIS".to_string()
}

pub fn amount_not_number() -> String {
    "Amount must be a number. Example: /buy 10000 QRIS".to_string()
}

pub fn amount_too_small(minimum: i64) -> String {
    format!("Amount is too small. Minimum is {}.", rupiah(minimum))
}

pub fn unknown_sender() -> String {
    "Could not identify the sender.".to_string()
}

pub fn channel_list(channels: &[PaymentChannel]) -> String {
    if channels.is_empty() {
        return "No payment methods are active right now.".to_string();
    }

    let lines = channels
        .iter()
        .take(MAX_LISTED_CHANNELS)
        .map(|c| {
            format!(
                "- `{}` | {} ({})",
                c.code,
                escape_markdown(&c.name),
                escape_markdown(&c.group)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut text = format!("Active payment methods:\n{lines}");
    if channels.len() > MAX_LISTED_CHANNELS {
        text.push_str(&format!(
            "\n…and {} more",
            channels.len() - MAX_LISTED_CHANNELS
        ));
    }
    text
}

pub fn channels_failed(reason: &str) -> String {
    format!("Failed to load payment methods: {}", escape_markdown(reason))
}

pub fn invoice_failed(reason: &str) -> String {
    format!(
        "Failed to create the transaction: {}",
        escape_markdown(reason)
    )
}

pub fn invoice_created(invoice: &InvoiceEntity) -> (String, InlineKeyboardMarkup) {
    let text = format!(
        "Invoice created.\n\
         - Ref: `{}`\n\
         - Method: `{}`\n\
         - Amount: {}\n\
         - Tripay Ref: `{}`\n\n\
         Status: {}\n\
         You will get a message here once it is PAID.",
        invoice.merchant_ref,
        invoice.method,
        rupiah(invoice.amount),
        invoice.gateway_reference.as_deref().unwrap_or("-"),
        invoice.status,
    );

    let mut keyboard = InlineKeyboardMarkup::default();
    if let Some(pay_url) = &invoice.pay_url {
        keyboard
            .inline_keyboard
            .push(vec![InlineKeyboardButton::link("Open payment page", pay_url)]);
    }
    if let Some(qr_url) = &invoice.qr_url {
        keyboard
            .inline_keyboard
            .push(vec![InlineKeyboardButton::link("QR (image)", qr_url)]);
    }

    (text, keyboard)
}

pub fn payment_received(invoice: &InvoiceEntity) -> String {
    format!(
        "Payment received.\n\
         - Ref: `{}`\n\
         - Amount: {}\n\
         - Method: `{}`\n\
         Status: PAID",
        invoice.merchant_ref,
        rupiah(invoice.amount),
        invoice.method,
    )
}
