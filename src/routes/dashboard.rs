use std::collections::HashMap;

use axum::extract::{Json, State};
use diesel::dsl::{count_star, sum};
use diesel::prelude::*;
use serde::Serialize;

use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::models::Resource;
use crate::schema::{bookmarks, download_reminders, ratings, resource_files, resources};
use crate::state::AppState;

use super::resources::{build_resource_responses, ResourceResponse};

#[derive(Serialize)]
pub struct DashboardTotals {
    pub resources: i64,
    pub files: i64,
    pub downloads: i64,
    pub views: i64,
    pub ratings: i64,
    pub bookmarks: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
}

#[derive(Serialize)]
pub struct DepartmentBreakdown {
    pub department: String,
    pub resources: i64,
    pub downloads: i64,
}

#[derive(Serialize)]
pub struct ReminderPipeline {
    pub scheduled: i64,
    pub sent: i64,
    pub failed: i64,
}

#[derive(Serialize)]
pub struct DashboardResponse {
    pub totals: DashboardTotals,
    pub departments: Vec<DepartmentBreakdown>,
    pub top_resources: Vec<ResourceResponse>,
    pub reminders: ReminderPipeline,
}

pub async fn dashboard(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> AppResult<Json<DashboardResponse>> {
    let mut conn = state.db()?;

    let resource_count: i64 = resources::table.select(count_star()).first(&mut conn)?;
    let file_count: i64 = resource_files::table.select(count_star()).first(&mut conn)?;
    let download_total: Option<i64> = resources::table
        .select(sum(resources::download_count))
        .first(&mut conn)?;
    let view_total: Option<i64> = resources::table
        .select(sum(resources::view_count))
        .first(&mut conn)?;
    let bookmark_count: i64 = bookmarks::table.select(count_star()).first(&mut conn)?;

    // Average computed from count and sum; Postgres AVG() would hand
    // back a numeric we have no other use for.
    let (rating_count, rating_sum): (i64, Option<i64>) = ratings::table
        .select((count_star(), sum(ratings::score)))
        .first(&mut conn)?;
    let average_rating = match (rating_count, rating_sum) {
        (count, Some(total)) if count > 0 => Some(total as f64 / count as f64),
        _ => None,
    };

    let department_rows: Vec<(String, i64, Option<i64>)> = resources::table
        .group_by(resources::department)
        .select((
            resources::department,
            count_star(),
            sum(resources::download_count),
        ))
        .load(&mut conn)?;
    let mut departments: Vec<DepartmentBreakdown> = department_rows
        .into_iter()
        .map(|(department, resources, downloads)| DepartmentBreakdown {
            department,
            resources,
            downloads: downloads.unwrap_or(0),
        })
        .collect();
    departments.sort_by(|a, b| b.resources.cmp(&a.resources));

    let top: Vec<Resource> = resources::table
        .order(resources::download_count.desc())
        .limit(5)
        .load(&mut conn)?;
    let top_resources = build_resource_responses(&mut conn, top)?;

    let reminder_rows: Vec<(String, i64)> = download_reminders::table
        .group_by(download_reminders::status)
        .select((download_reminders::status, count_star()))
        .load(&mut conn)?;
    let reminder_map: HashMap<String, i64> = reminder_rows.into_iter().collect();
    let reminders = ReminderPipeline {
        scheduled: *reminder_map
            .get(crate::reminders::STATUS_SCHEDULED)
            .unwrap_or(&0),
        sent: *reminder_map.get(crate::reminders::STATUS_SENT).unwrap_or(&0),
        failed: *reminder_map
            .get(crate::reminders::STATUS_FAILED)
            .unwrap_or(&0),
    };

    Ok(Json(DashboardResponse {
        totals: DashboardTotals {
            resources: resource_count,
            files: file_count,
            downloads: download_total.unwrap_or(0),
            views: view_total.unwrap_or(0),
            ratings: rating_count,
            bookmarks: bookmark_count,
            average_rating,
        },
        departments,
        top_resources,
        reminders,
    }))
}
