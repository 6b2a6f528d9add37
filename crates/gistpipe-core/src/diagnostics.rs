use crate::model::ExtractionAttempt;

/// Append-only trail of attempted strategies for one call.
///
/// Owned by the call; handed back to the caller once the call returns.
#[derive(Debug, Default)]
pub struct Diagnostics {
    attempts: Vec<ExtractionAttempt>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, attempt: ExtractionAttempt) {
        tracing::debug!(
            strategy = %attempt.strategy,
            succeeded = attempt.succeeded,
            words = attempt.word_count,
            status = ?attempt.status,
            error = attempt.error.as_deref().unwrap_or(""),
            "extraction attempt"
        );
        self.attempts.push(attempt);
    }

    pub fn attempts(&self) -> &[ExtractionAttempt] {
        &self.attempts
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn into_attempts(self) -> Vec<ExtractionAttempt> {
        self.attempts
    }
}

/// Failure messages in attempt order; a failed attempt without an error is named.
pub fn failure_messages(attempts: &[ExtractionAttempt]) -> Vec<String> {
    attempts
        .iter()
        .filter_map(|a| {
            a.error
                .clone()
                .or_else(|| (!a.succeeded).then(|| format!("{}: no text", a.strategy)))
        })
        .collect()
}

/// One human-readable line per attempt, for operator-facing output.
pub fn render_trail(attempts: &[ExtractionAttempt]) -> Vec<String> {
    attempts
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let mut line = format!(
                "{}. {} [{}] words={}",
                i + 1,
                a.strategy,
                if a.succeeded { "ok" } else { "fail" },
                a.word_count
            );
            if let Some(s) = a.status {
                line.push_str(&format!(" status={s}"));
            }
            if let Some(b) = a.bytes {
                line.push_str(&format!(" bytes={b}"));
            }
            if let Some(u) = &a.extra_url {
                line.push_str(&format!(" url={u}"));
            }
            if let Some(d) = &a.detail {
                line.push_str(&format!(" ({d})"));
            }
            if let Some(e) = &a.error {
                line.push_str(&format!(" error={e}"));
            }
            line
        })
        .collect()
}
