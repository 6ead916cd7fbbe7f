use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use diesel::dsl::exists;
use diesel::{prelude::*, select};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{NewBookmark, Resource};
use crate::schema::{bookmarks, resources};
use crate::state::AppState;

use super::resources::{build_resource_responses, ResourceResponse};

pub async fn add_bookmark(
    State(state): State<AppState>,
    Path(resource_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    let found: bool = select(exists(
        resources::table.filter(resources::id.eq(resource_id)),
    ))
    .get_result(&mut conn)?;
    if !found {
        return Err(AppError::not_found());
    }

    // Bookmarking twice is a no-op, not an error.
    diesel::insert_into(bookmarks::table)
        .values(&NewBookmark {
            user_id: user.user_id,
            resource_id,
        })
        .on_conflict_do_nothing()
        .execute(&mut conn)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_bookmark(
    State(state): State<AppState>,
    Path(resource_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    let removed = diesel::delete(
        bookmarks::table
            .filter(bookmarks::user_id.eq(user.user_id))
            .filter(bookmarks::resource_id.eq(resource_id)),
    )
    .execute(&mut conn)?;

    if removed == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_bookmarks(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<ResourceResponse>>> {
    let mut conn = state.db()?;

    let bookmarked: Vec<Resource> = bookmarks::table
        .inner_join(resources::table)
        .filter(bookmarks::user_id.eq(user.user_id))
        .order(bookmarks::created_at.desc())
        .select(resources::all_columns)
        .load(&mut conn)?;

    let responses = build_resource_responses(&mut conn, bookmarked)?;
    Ok(Json(responses))
}
