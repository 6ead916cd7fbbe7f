use axum::extract::{Json, Path, State};
use chrono::Utc;
use diesel::{prelude::*, PgConnection};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{NewProfile, Profile, User};
use crate::schema::{profiles, users};
use crate::state::AppState;
use crate::utils::json::{classify_nullable, NullableValue};

use super::resources::to_iso;

#[derive(Serialize)]
pub struct ProfileResponse {
    pub user_id: Uuid,
    pub display_name: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub email: String,
    pub updated_at: String,
}

pub async fn my_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ProfileResponse>> {
    let mut conn = state.db()?;
    let profile = ensure_profile(&mut conn, user.user_id)?;
    Ok(Json(to_profile_response(profile)))
}

pub async fn update_my_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<Value>,
) -> AppResult<Json<ProfileResponse>> {
    let mut conn = state.db()?;
    let existing = ensure_profile(&mut conn, user.user_id)?;

    let display_class =
        classify_nullable(body.get("display_name")).map_err(AppError::bad_request)?;
    let full_name_class = classify_nullable(body.get("full_name")).map_err(AppError::bad_request)?;
    let avatar_class = classify_nullable(body.get("avatar_url")).map_err(AppError::bad_request)?;

    if matches!(display_class, NullableValue::Omitted)
        && matches!(full_name_class, NullableValue::Omitted)
        && matches!(avatar_class, NullableValue::Omitted)
    {
        return Ok(Json(to_profile_response(existing)));
    }

    let mut new_display_name: Option<String> = None;
    match display_class {
        NullableValue::Omitted => {}
        NullableValue::Null => {
            return Err(AppError::bad_request("display_name cannot be null"));
        }
        NullableValue::String(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(AppError::bad_request("display_name must not be empty"));
            }
            if trimmed != existing.display_name {
                new_display_name = Some(trimmed.to_string());
            }
        }
    }

    let mut full_name_change: Option<Option<String>> = None;
    match full_name_class {
        NullableValue::Omitted => {}
        NullableValue::Null => full_name_change = Some(None),
        NullableValue::String(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(AppError::bad_request("full_name must not be empty"));
            }
            if existing.full_name.as_deref() != Some(trimmed) {
                full_name_change = Some(Some(trimmed.to_string()));
            }
        }
    }

    let mut avatar_change: Option<Option<String>> = None;
    match avatar_class {
        NullableValue::Omitted => {}
        NullableValue::Null => avatar_change = Some(None),
        NullableValue::String(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(AppError::bad_request("avatar_url must not be empty"));
            }
            if existing.avatar_url.as_deref() != Some(trimmed) {
                avatar_change = Some(Some(trimmed.to_string()));
            }
        }
    }

    if new_display_name.is_none() && full_name_change.is_none() && avatar_change.is_none() {
        return Ok(Json(to_profile_response(existing)));
    }

    let now = Utc::now().naive_utc();
    let changes = ProfileChangeset {
        display_name: new_display_name.as_deref(),
        full_name: full_name_change,
        avatar_url: avatar_change,
    };

    let updated: Profile = diesel::update(profiles::table.find(existing.id))
        .set((changes, profiles::updated_at.eq(now)))
        .get_result(&mut conn)?;

    Ok(Json(to_profile_response(updated)))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    _user: AuthenticatedUser,
) -> AppResult<Json<ProfileResponse>> {
    let mut conn = state.db()?;

    let profile: Profile = profiles::table
        .filter(profiles::user_id.eq(user_id))
        .first(&mut conn)?;

    Ok(Json(to_profile_response(profile)))
}

#[derive(AsChangeset)]
#[diesel(table_name = profiles)]
struct ProfileChangeset<'a> {
    display_name: Option<&'a str>,
    full_name: Option<Option<String>>,
    avatar_url: Option<Option<String>>,
}

/// Lazily materializes the denormalized identity row for a user,
/// refreshing the mirrored email when the auth record has drifted. The
/// reminder processor resolves recipient addresses only through this
/// table.
pub(crate) fn ensure_profile(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Profile, diesel::result::Error> {
    let user: User = users::table.find(user_id).first(conn)?;

    let existing: Option<Profile> = profiles::table
        .filter(profiles::user_id.eq(user_id))
        .first(conn)
        .optional()?;

    match existing {
        Some(profile) if profile.email == user.email => Ok(profile),
        Some(profile) => diesel::update(profiles::table.find(profile.id))
            .set((
                profiles::email.eq(&user.email),
                profiles::updated_at.eq(Utc::now().naive_utc()),
            ))
            .get_result(conn),
        None => {
            let new_profile = NewProfile {
                id: Uuid::new_v4(),
                user_id,
                display_name: user.username.clone(),
                full_name: None,
                avatar_url: None,
                email: user.email.clone(),
            };
            diesel::insert_into(profiles::table)
                .values(&new_profile)
                .on_conflict(profiles::user_id)
                .do_nothing()
                .execute(conn)?;
            profiles::table
                .filter(profiles::user_id.eq(user_id))
                .first(conn)
        }
    }
}

fn to_profile_response(profile: Profile) -> ProfileResponse {
    ProfileResponse {
        user_id: profile.user_id,
        display_name: profile.display_name,
        full_name: profile.full_name,
        avatar_url: profile.avatar_url,
        email: profile.email,
        updated_at: to_iso(profile.updated_at),
    }
}
