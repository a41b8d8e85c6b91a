use std::sync::Mutex;

use log::info;

/// Out-of-band channel for password reset tokens.
pub trait Notifier: Send + Sync {
    fn send_reset_token(&self, email: &str, token: &str);
}

/// Writes reset tokens to the server log instead of sending mail.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_reset_token(&self, email: &str, token: &str) {
        info!("Email simulation: reset token for {}: {}", email, token);
    }
}

/// Keeps every delivered token in memory; handy for tests and local tooling.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_token_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .ok()?
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|sent| sent.len()).unwrap_or(0)
    }
}

impl Notifier for RecordingNotifier {
    fn send_reset_token(&self, email: &str, token: &str) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((email.to_string(), token.to_string()));
        }
    }
}
