use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppResult;
use crate::mailer::OutboundEmail;
use crate::reminders::{self, DueReminder};
use crate::state::AppState;

#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
    pub examined: usize,
    pub sent: usize,
    pub failed: usize,
}

/// One batch pass over due reminders. Each row transitions to `sent` or
/// `failed` individually; the batch is deliberately not transactional,
/// so a crash mid-batch leaves the remaining rows `scheduled` for the
/// next invocation.
pub async fn process_due_reminders(state: &AppState) -> AppResult<BatchOutcome> {
    let batch = {
        let mut conn = state.db()?;
        reminders::due_reminders(&mut conn, state.config.reminder_batch_size)?
    };

    let mut outcome = BatchOutcome {
        examined: batch.len(),
        ..Default::default()
    };

    for due in batch {
        match dispatch_reminder(state, &due).await {
            Ok(()) => {
                let mut conn = state.db()?;
                reminders::mark_sent(&mut conn, due.reminder.id)?;
                info!(
                    reminder_id = %due.reminder.id,
                    resource_id = %due.reminder.resource_id,
                    "feedback reminder sent"
                );
                outcome.sent += 1;
            }
            Err(message) => {
                let mut conn = state.db()?;
                reminders::mark_failed(&mut conn, due.reminder.id, &message)?;
                warn!(
                    reminder_id = %due.reminder.id,
                    resource_id = %due.reminder.resource_id,
                    error = %message,
                    "feedback reminder failed"
                );
                outcome.failed += 1;
            }
        }
    }

    Ok(outcome)
}

/// Resolves the recipient, composes the feedback request, and attempts
/// delivery. Any failure is returned as the message recorded on the row.
async fn dispatch_reminder(state: &AppState, due: &DueReminder) -> Result<(), String> {
    let email = match &due.email {
        Some(email) => email.clone(),
        // A row with no resolvable address would otherwise be retried
        // forever; fail it terminally instead.
        None => return Err("no email address on file".to_string()),
    };

    let token = state
        .jwt
        .generate_rating_token(due.reminder.user_id, due.reminder.resource_id)
        .map_err(|err| format!("failed to generate rating token: {err}"))?;

    let mail = feedback_email(
        &email,
        &state.config.app_base_url,
        due.reminder.resource_id,
        &due.resource_title,
        &token,
    );

    state
        .mailer
        .send(&mail)
        .await
        .map_err(|err| err.to_string())
}

fn feedback_email(
    to: &str,
    base_url: &str,
    resource_id: Uuid,
    title: &str,
    token: &str,
) -> OutboundEmail {
    let base = base_url.trim_end_matches('/');
    let escaped_title = escape_html(title);
    let resource_link = format!("{base}/resources/{resource_id}");

    let stars: String = (1..=5)
        .map(|score| {
            format!(
                "<a href=\"{base}/api/ratings/submit?resource_id={resource_id}&score={score}&token={token}\">{score}&#9733;</a>"
            )
        })
        .collect::<Vec<_>>()
        .join(" ");

    let html_body = format!(
        "<p>You recently downloaded <a href=\"{resource_link}\"><strong>{escaped_title}</strong></a>.</p>\
         <p>How useful was it? Click a star to rate it:</p>\
         <p>{stars}</p>\
         <p>Your feedback helps other students find the right material.</p>"
    );

    OutboundEmail {
        to: to.to_string(),
        subject: format!("How was \"{title}\"?"),
        html_body,
    }
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
