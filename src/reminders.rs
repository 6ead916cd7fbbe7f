use std::collections::HashMap;

use chrono::{Duration as ChronoDuration, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{DownloadReminder, NewDownloadReminder};
use crate::schema::{download_reminders, profiles, resources};

pub const STATUS_SCHEDULED: &str = "scheduled";
pub const STATUS_SENT: &str = "sent";
pub const STATUS_FAILED: &str = "failed";

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub type ReminderResult<T> = Result<T, ReminderError>;

/// A due reminder joined with everything the processor needs: the
/// resource title for the email body and the profile email, which may
/// be absent when no profile row was ever materialized.
#[derive(Debug, Clone)]
pub struct DueReminder {
    pub reminder: DownloadReminder,
    pub resource_title: String,
    pub email: Option<String>,
}

/// Insert-if-absent on the (user, resource) unique key. Returns whether
/// a new row was created; an existing row is a no-op, not an error.
pub fn schedule_reminder(
    conn: &mut PgConnection,
    user_id: Uuid,
    resource_id: Uuid,
    delay: ChronoDuration,
) -> ReminderResult<bool> {
    let now = Utc::now().naive_utc();
    let new_reminder = NewDownloadReminder {
        id: Uuid::new_v4(),
        user_id,
        resource_id,
        first_downloaded_at: now,
        scheduled_send_at: now + delay,
        status: STATUS_SCHEDULED.to_string(),
    };

    let inserted = diesel::insert_into(download_reminders::table)
        .values(&new_reminder)
        .on_conflict_do_nothing()
        .execute(conn)?;

    Ok(inserted > 0)
}

/// Selects up to `limit` scheduled rows whose send time has passed.
/// Rows already `sent` or `failed` are excluded by the status filter,
/// which is what makes overlapping invocations safe to tolerate.
pub fn due_reminders(conn: &mut PgConnection, limit: i64) -> ReminderResult<Vec<DueReminder>> {
    let now = Utc::now().naive_utc();

    let rows: Vec<(DownloadReminder, String)> = download_reminders::table
        .inner_join(resources::table)
        .filter(download_reminders::status.eq(STATUS_SCHEDULED))
        .filter(download_reminders::scheduled_send_at.le(now))
        .order(download_reminders::scheduled_send_at.asc())
        .limit(limit)
        .select((download_reminders::all_columns, resources::title))
        .load(conn)?;

    let mut user_ids: Vec<Uuid> = rows.iter().map(|(reminder, _)| reminder.user_id).collect();
    user_ids.sort();
    user_ids.dedup();

    let emails: Vec<(Uuid, String)> = profiles::table
        .filter(profiles::user_id.eq_any(&user_ids))
        .select((profiles::user_id, profiles::email))
        .load(conn)?;
    let email_map: HashMap<Uuid, String> = emails.into_iter().collect();

    Ok(rows
        .into_iter()
        .map(|(reminder, resource_title)| {
            let email = email_map.get(&reminder.user_id).cloned();
            DueReminder {
                reminder,
                resource_title,
                email,
            }
        })
        .collect())
}

pub fn mark_sent(conn: &mut PgConnection, reminder_id: Uuid) -> ReminderResult<()> {
    let now = Utc::now().naive_utc();
    diesel::update(download_reminders::table.find(reminder_id))
        .set((
            download_reminders::status.eq(STATUS_SENT),
            download_reminders::sent_at.eq(Some(now)),
            download_reminders::last_error.eq::<Option<String>>(None),
            download_reminders::updated_at.eq(now),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn mark_failed(
    conn: &mut PgConnection,
    reminder_id: Uuid,
    error_message: &str,
) -> ReminderResult<()> {
    diesel::update(download_reminders::table.find(reminder_id))
        .set((
            download_reminders::status.eq(STATUS_FAILED),
            download_reminders::last_error.eq(Some(error_message.to_string())),
            download_reminders::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}

/// Operator intervention for terminal failures: reset `failed` rows to
/// `scheduled` with an immediate send time so the next batch picks them
/// up. Returns the number of rows requeued.
pub fn requeue_failed(conn: &mut PgConnection) -> ReminderResult<usize> {
    let now = Utc::now().naive_utc();
    let requeued = diesel::update(
        download_reminders::table.filter(download_reminders::status.eq(STATUS_FAILED)),
    )
    .set((
        download_reminders::status.eq(STATUS_SCHEDULED),
        download_reminders::scheduled_send_at.eq(now),
        download_reminders::last_error.eq::<Option<String>>(None),
        download_reminders::updated_at.eq(now),
    ))
    .execute(conn)?;
    Ok(requeued)
}
