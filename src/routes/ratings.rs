use axum::extract::{Json, OriginalUri, Path, Query, State};
use axum::response::Redirect;
use chrono::Utc;
use diesel::dsl::exists;
use diesel::{prelude::*, result::DatabaseErrorKind, select, PgConnection};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{NewRating, Rating};
use crate::schema::{profiles, ratings, resources, users};
use crate::state::AppState;

use super::resources::{load_rating_summaries, to_iso, RatingSummary};

#[derive(Deserialize)]
pub struct SubmitRatingRequest {
    pub score: i32,
    pub review: Option<String>,
}

#[derive(Serialize)]
pub struct RatingResponse {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub score: i32,
    pub review: Option<String>,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct RatingEntry {
    pub score: i32,
    pub review: Option<String>,
    pub rater: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct RatingListResponse {
    pub summary: RatingSummary,
    pub entries: Vec<RatingEntry>,
}

/// Query shape of the email-link submission. `score` arrives as text so
/// a non-numeric value can be rejected as a 400 instead of a routing
/// rejection, and validation happens before any auth handling.
#[derive(Deserialize)]
pub struct RatingLinkQuery {
    pub resource_id: Uuid,
    pub score: String,
    pub review: Option<String>,
    pub token: Option<String>,
}

pub async fn submit_rating(
    State(state): State<AppState>,
    Path(resource_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<SubmitRatingRequest>,
) -> AppResult<Json<RatingResponse>> {
    validate_score(payload.score)?;

    let mut conn = state.db()?;
    let rating = upsert_rating(
        &mut conn,
        user.user_id,
        resource_id,
        payload.score,
        payload.review,
    )?;

    Ok(Json(to_rating_response(rating)))
}

pub async fn list_ratings(
    State(state): State<AppState>,
    Path(resource_id): Path<Uuid>,
) -> AppResult<Json<RatingListResponse>> {
    let mut conn = state.db()?;
    ensure_resource_exists(&mut conn, resource_id)?;

    let rows: Vec<Rating> = ratings::table
        .filter(ratings::resource_id.eq(resource_id))
        .order(ratings::updated_at.desc())
        .load(&mut conn)?;

    let mut user_ids: Vec<Uuid> = rows.iter().map(|rating| rating.user_id).collect();
    user_ids.sort();
    user_ids.dedup();

    // Prefer the profile display name; fall back to the auth username
    // for raters who never materialized a profile.
    let display_names: Vec<(Uuid, String)> = profiles::table
        .filter(profiles::user_id.eq_any(&user_ids))
        .select((profiles::user_id, profiles::display_name))
        .load(&mut conn)?;
    let usernames: Vec<(Uuid, String)> = users::table
        .filter(users::id.eq_any(&user_ids))
        .select((users::id, users::username))
        .load(&mut conn)?;

    let display_map: std::collections::HashMap<Uuid, String> = display_names.into_iter().collect();
    let username_map: std::collections::HashMap<Uuid, String> = usernames.into_iter().collect();

    let mut summary_map = load_rating_summaries(&mut conn, &[resource_id])?;
    let summary = summary_map.remove(&resource_id).unwrap_or(RatingSummary {
        count: 0,
        average: None,
    });

    let entries = rows
        .into_iter()
        .map(|rating| {
            let rater = display_map
                .get(&rating.user_id)
                .or_else(|| username_map.get(&rating.user_id))
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());
            RatingEntry {
                score: rating.score,
                review: rating.review,
                rater,
                updated_at: to_iso(rating.updated_at),
            }
        })
        .collect();

    Ok(Json(RatingListResponse { summary, entries }))
}

/// Entry point for the star links in reminder emails. A valid rating
/// token establishes the user without a session; without one the caller
/// is bounced to login with the original URL preserved for replay.
pub async fn submit_rating_link(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<RatingLinkQuery>,
) -> AppResult<Redirect> {
    let score: i32 = params
        .score
        .parse()
        .map_err(|_| AppError::bad_request("score must be an integer"))?;
    validate_score(score)?;

    let claims = match params.token.as_deref() {
        Some(token) => match state.jwt.verify_rating_token(token) {
            Ok(claims) if claims.resource_id == params.resource_id => Some(claims),
            Ok(_) => {
                warn!(resource_id = %params.resource_id, "rating token bound to a different resource");
                None
            }
            Err(err) => {
                warn!(error = %err, "invalid rating token on email link");
                None
            }
        },
        None => None,
    };

    let Some(claims) = claims else {
        return Ok(redirect_to_login(&state, &uri));
    };

    let mut conn = state.db()?;
    let rating = upsert_rating(
        &mut conn,
        claims.user_id,
        params.resource_id,
        score,
        params.review,
    )?;

    info!(
        resource_id = %params.resource_id,
        score = rating.score,
        "rating submitted via email link"
    );

    let base = state.config.app_base_url.trim_end_matches('/');
    Ok(Redirect::to(&format!(
        "{base}/resources/{}?rated={score}",
        params.resource_id
    )))
}

fn redirect_to_login(state: &AppState, uri: &axum::http::Uri) -> Redirect {
    let original = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or(uri.path());
    let next =
        percent_encoding::utf8_percent_encode(original, percent_encoding::NON_ALPHANUMERIC);
    let base = state.config.app_base_url.trim_end_matches('/');
    Redirect::to(&format!("{base}/login?next={next}"))
}

fn validate_score(score: i32) -> AppResult<()> {
    if !(1..=5).contains(&score) {
        return Err(AppError::bad_request("score must be between 1 and 5"));
    }
    Ok(())
}

/// Insert-or-overwrite on the (user, resource) unique key; a resubmission
/// replaces score and review and refreshes the modified timestamp.
fn upsert_rating(
    conn: &mut PgConnection,
    user_id: Uuid,
    resource_id: Uuid,
    score: i32,
    review: Option<String>,
) -> AppResult<Rating> {
    ensure_resource_exists(conn, resource_id)?;

    let review = review
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned);

    let new_rating = NewRating {
        id: Uuid::new_v4(),
        user_id,
        resource_id,
        score,
        review: review.clone(),
    };

    let rating = diesel::insert_into(ratings::table)
        .values(&new_rating)
        .on_conflict((ratings::user_id, ratings::resource_id))
        .do_update()
        .set((
            ratings::score.eq(score),
            ratings::review.eq(review),
            ratings::updated_at.eq(Utc::now().naive_utc()),
        ))
        .get_result::<Rating>(conn)
        .map_err(|err| match err {
            diesel::result::Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                AppError::not_found()
            }
            other => AppError::from(other),
        })?;

    Ok(rating)
}

fn ensure_resource_exists(conn: &mut PgConnection, resource_id: Uuid) -> AppResult<()> {
    let found: bool = select(exists(
        resources::table.filter(resources::id.eq(resource_id)),
    ))
    .get_result(conn)?;
    if !found {
        return Err(AppError::not_found());
    }
    Ok(())
}

fn to_rating_response(rating: Rating) -> RatingResponse {
    RatingResponse {
        id: rating.id,
        resource_id: rating.resource_id,
        score: rating.score,
        review: rating.review,
        updated_at: to_iso(rating.updated_at),
    }
}
