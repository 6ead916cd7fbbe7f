use axum::extract::{Json, State};

use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::state::AppState;
use crate::workers::reminders::{process_due_reminders, BatchOutcome};

/// External trigger for the reminder batch, for deployments that drive
/// the processor from cron instead of the long-running worker.
pub async fn run_batch(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> AppResult<Json<BatchOutcome>> {
    let outcome = process_due_reminders(&state).await?;
    Ok(Json(outcome))
}
