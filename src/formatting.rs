// src/formatting.rs

use crate::core::Message;

/// A trait for rendering a notification message as text.
pub trait TextFormatter: Send + Sync {
    fn format(&self, message: &Message) -> String;
}

/// Telegram-flavoured Markdown: one `*key*: value` line per entry.
///
/// A message that only carries a `status` renders as the bare status text.
pub struct MarkdownFormatter;

impl TextFormatter for MarkdownFormatter {
    fn format(&self, message: &Message) -> String {
        if let (1, Some(status)) = (message.len(), message.get("status")) {
            return escape_markdown(status);
        }

        message
            .iter()
            .map(|(key, value)| format!("*{}*: {}", title_case(key), escape_markdown(value)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Plain `key: value` lines.
pub struct PlainTextFormatter;

impl TextFormatter for PlainTextFormatter {
    fn format(&self, message: &Message) -> String {
        message
            .iter()
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Escapes the characters legacy Telegram Markdown treats as markup.
fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `api_server` -> `Api Server`
fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
