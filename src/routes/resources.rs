use std::{collections::HashMap, collections::HashSet, time::Duration};

use axum::extract::{Json, Multipart, Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use diesel::{prelude::*, result::DatabaseErrorKind, PgConnection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{NewResource, NewResourceFile, NewResourceTag, Resource, ResourceFile};
use crate::reminders::{self, ReminderError};
use crate::schema::{ratings, resource_files, resource_tags, resources};
use crate::state::AppState;
use crate::utils::json::trimmed_non_empty;

use super::profiles::ensure_profile;

const PRESIGNED_URL_EXPIRY_SECONDS: u64 = 300;

#[derive(Serialize, Clone)]
pub struct RatingSummary {
    pub count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
}

#[derive(Serialize, Clone)]
pub struct ResourceFileResponse {
    pub id: Uuid,
    pub position: i32,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
}

impl From<ResourceFile> for ResourceFileResponse {
    fn from(file: ResourceFile) -> Self {
        Self {
            id: file.id,
            position: file.position,
            file_name: file.file_name,
            content_type: file.content_type,
            size_bytes: file.size_bytes,
        }
    }
}

#[derive(Serialize)]
pub struct ResourceResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub department: String,
    pub level: String,
    pub title: String,
    pub description: Option<String>,
    pub cover_color: Option<String>,
    pub tags: Vec<String>,
    pub files: Vec<ResourceFileResponse>,
    pub file_count: i32,
    pub download_count: i32,
    pub view_count: i32,
    pub rating: RatingSummary,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct ResourceDetailResponse {
    pub resource: ResourceResponse,
}

#[derive(Deserialize)]
pub struct ResourceListQuery {
    pub department: Option<String>,
    pub level: Option<String>,
    pub q: Option<String>,
    pub tags: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct DownloadRequest {
    pub user_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct DownloadFileResponse {
    pub file_name: String,
    pub url: String,
    pub expires_in: u64,
}

#[derive(Serialize)]
pub struct DownloadResponse {
    pub files: Vec<DownloadFileResponse>,
    pub reminder_scheduled: bool,
}

struct UploadedFile {
    bytes: Vec<u8>,
    file_name: String,
    content_type: Option<String>,
}

struct CreateResourceFields {
    title: String,
    department: String,
    level: String,
    description: Option<String>,
    cover_color: Option<String>,
    tags: Vec<String>,
    files: Vec<UploadedFile>,
}

pub async fn create_resource(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ResourceDetailResponse>)> {
    let fields = collect_upload_fields(multipart).await?;
    let resource_id = Uuid::new_v4();

    // Object uploads happen before any row exists; an orphaned object is
    // harmless, a resource row without its files is not.
    let mut new_files = Vec::with_capacity(fields.files.len());
    for (index, file) in fields.files.iter().enumerate() {
        let position = index as i32;
        let file_id = Uuid::new_v4();
        let storage_key = format!("resources/{resource_id}/{position}/{file_id}");
        let checksum = hex::encode(Sha256::digest(&file.bytes));
        let content_type = file.content_type.clone().or_else(|| {
            mime_guess::from_path(&file.file_name)
                .first()
                .map(|mime| mime.to_string())
        });
        let content_disposition = inline_content_disposition(&file.file_name);

        state
            .storage
            .put_object(
                &storage_key,
                file.bytes.clone(),
                content_type.clone(),
                content_disposition,
            )
            .await
            .map_err(|err| {
                error!(error = %err, key = %storage_key, "failed to store resource file");
                AppError::internal(format!("failed to store resource file: {err}"))
            })?;

        new_files.push(NewResourceFile {
            id: file_id,
            resource_id,
            position,
            file_name: file.file_name.clone(),
            content_type,
            storage_key,
            size_bytes: file.bytes.len() as i64,
            checksum,
        });
    }

    let new_resource = NewResource {
        id: resource_id,
        owner_id: user.user_id,
        department: fields.department,
        level: fields.level,
        title: fields.title,
        description: fields.description,
        cover_color: fields.cover_color,
        file_count: new_files.len() as i32,
    };

    let tag_rows: Vec<NewResourceTag> = fields
        .tags
        .iter()
        .map(|tag| NewResourceTag {
            resource_id,
            tag: tag.clone(),
        })
        .collect();

    let resource = {
        let mut conn = state.db()?;
        conn.transaction::<Resource, diesel::result::Error, _>(|conn| {
            diesel::insert_into(resources::table)
                .values(&new_resource)
                .execute(conn)?;

            diesel::insert_into(resource_files::table)
                .values(&new_files)
                .execute(conn)?;

            if !tag_rows.is_empty() {
                diesel::insert_into(resource_tags::table)
                    .values(&tag_rows)
                    .on_conflict_do_nothing()
                    .execute(conn)?;
            }

            ensure_profile(conn, user.user_id)?;

            resources::table.find(resource_id).first(conn)
        })?
    };

    info!(
        resource_id = %resource.id,
        owner_id = %user.user_id,
        file_count = resource.file_count,
        "resource created"
    );

    let mut conn = state.db()?;
    let mut responses = build_resource_responses(&mut conn, vec![resource])?;
    let response = responses.remove(0);

    Ok((
        StatusCode::CREATED,
        Json(ResourceDetailResponse { resource: response }),
    ))
}

pub async fn list_resources(
    State(state): State<AppState>,
    Query(params): Query<ResourceListQuery>,
) -> AppResult<Json<Vec<ResourceResponse>>> {
    let mut conn = state.db()?;

    let mut query = resources::table.into_boxed();

    if let Some(department) = params.department.as_deref().and_then(trimmed_non_empty) {
        query = query.filter(resources::department.eq(department.to_owned()));
    }

    if let Some(level) = params.level.as_deref().and_then(trimmed_non_empty) {
        query = query.filter(resources::level.eq(level.to_owned()));
    }

    if let Some(search) = params.q.as_deref().and_then(trimmed_non_empty) {
        let pattern = format!("%{search}%");
        query = query.filter(
            resources::title
                .ilike(pattern.clone())
                .nullable()
                .or(resources::description.ilike(pattern)),
        );
    }

    if let Some(tags_param) = params.tags.as_deref().and_then(trimmed_non_empty) {
        let wanted: Vec<String> = tags_param
            .split(',')
            .filter_map(|tag| trimmed_non_empty(tag).map(str::to_owned))
            .collect();

        // A resource must carry every requested tag, so intersect the
        // id sets one tag at a time.
        let mut id_set: Option<HashSet<Uuid>> = None;
        for tag in &wanted {
            let ids_for_tag: Vec<Uuid> = resource_tags::table
                .filter(resource_tags::tag.eq(tag))
                .select(resource_tags::resource_id)
                .load(&mut conn)?;
            let set: HashSet<Uuid> = ids_for_tag.into_iter().collect();
            id_set = Some(match id_set {
                Some(existing) => existing.intersection(&set).copied().collect(),
                None => set,
            });

            if let Some(ref set) = id_set {
                if set.is_empty() {
                    return Ok(Json(vec![]));
                }
            }
        }

        if let Some(set) = id_set {
            let ids: Vec<Uuid> = set.into_iter().collect();
            query = query.filter(resources::id.eq_any(ids));
        }
    }

    let listed: Vec<Resource> = query.order(resources::created_at.desc()).load(&mut conn)?;
    let responses = build_resource_responses(&mut conn, listed)?;

    Ok(Json(responses))
}

pub async fn get_resource(
    State(state): State<AppState>,
    Path(resource_id): Path<Uuid>,
) -> AppResult<Json<ResourceDetailResponse>> {
    let mut conn = state.db()?;

    let resource: Resource = resources::table.find(resource_id).first(&mut conn)?;
    let mut responses = build_resource_responses(&mut conn, vec![resource])?;

    Ok(Json(ResourceDetailResponse {
        resource: responses.remove(0),
    }))
}

pub async fn record_view(
    State(state): State<AppState>,
    Path(resource_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    let updated = diesel::update(resources::table.find(resource_id))
        .set(resources::view_count.eq(resources::view_count + 1))
        .execute(&mut conn)?;

    if updated == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Download recorder: bumps the counter and schedules a feedback
/// reminder for a known downloader, all in one transaction. The email
/// itself is deferred to the reminder processor.
pub async fn record_download(
    State(state): State<AppState>,
    Path(resource_id): Path<Uuid>,
    user: Option<AuthenticatedUser>,
    body: Option<Json<DownloadRequest>>,
) -> AppResult<Json<DownloadResponse>> {
    let downloader_id = user
        .map(|user| user.user_id)
        .or_else(|| body.and_then(|Json(payload)| payload.user_id));

    let delay = ChronoDuration::hours(state.config.reminder_delay_hours);
    let mut conn = state.db()?;

    let reminder_scheduled = conn.transaction::<bool, AppError, _>(|conn| {
        let updated = diesel::update(resources::table.find(resource_id))
            .set(resources::download_count.eq(resources::download_count + 1))
            .execute(conn)?;

        if updated == 0 {
            return Err(AppError::not_found());
        }

        let Some(downloader_id) = downloader_id else {
            return Ok(false);
        };

        match reminders::schedule_reminder(conn, downloader_id, resource_id, delay) {
            Ok(created) => Ok(created),
            // Unknown user id: roll the counter bump back too.
            Err(ReminderError::Database(diesel::result::Error::DatabaseError(
                DatabaseErrorKind::ForeignKeyViolation,
                _,
            ))) => Err(AppError::not_found()),
            Err(ReminderError::Database(err)) => Err(AppError::from(err)),
        }
    })?;

    if reminder_scheduled {
        info!(
            resource_id = %resource_id,
            "scheduled download feedback reminder"
        );
    }

    let files: Vec<ResourceFile> = resource_files::table
        .filter(resource_files::resource_id.eq(resource_id))
        .order(resource_files::position.asc())
        .load(&mut conn)?;
    drop(conn);

    let mut file_responses = Vec::with_capacity(files.len());
    for file in files {
        let url = state
            .storage
            .presign_get_object(
                &file.storage_key,
                Duration::from_secs(PRESIGNED_URL_EXPIRY_SECONDS),
            )
            .await
            .map_err(|err| AppError::internal(format!("failed to generate download URL: {err}")))?;
        file_responses.push(DownloadFileResponse {
            file_name: file.file_name,
            url,
            expires_in: PRESIGNED_URL_EXPIRY_SECONDS,
        });
    }

    Ok(Json(DownloadResponse {
        files: file_responses,
        reminder_scheduled,
    }))
}

async fn collect_upload_fields(mut multipart: Multipart) -> AppResult<CreateResourceFields> {
    let mut title: Option<String> = None;
    let mut department: Option<String> = None;
    let mut level: Option<String> = None;
    let mut description: Option<String> = None;
    let mut cover_color: Option<String> = None;
    let mut tags: Vec<String> = Vec::new();
    let mut files: Vec<UploadedFile> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(|n| n.to_string())
                    .and_then(|n| trimmed_non_empty(&n).map(str::to_owned))
                    .ok_or_else(|| AppError::bad_request("file parts must carry a filename"))?;
                let content_type = field.content_type().map(|mime| mime.to_string());
                let data = field.bytes().await.map_err(|err| {
                    error!(error = %err, "failed to read file bytes");
                    AppError::bad_request(format!("failed to read file bytes: {err}"))
                })?;
                files.push(UploadedFile {
                    bytes: data.to_vec(),
                    file_name,
                    content_type,
                });
            }
            Some("title") => title = Some(read_text_field(field, "title").await?),
            Some("department") => department = Some(read_text_field(field, "department").await?),
            Some("level") => level = Some(read_text_field(field, "level").await?),
            Some("description") => {
                description = trimmed_non_empty(&read_text_field(field, "description").await?)
                    .map(str::to_owned);
            }
            Some("cover_color") => {
                cover_color = trimmed_non_empty(&read_text_field(field, "cover_color").await?)
                    .map(str::to_owned);
            }
            Some("tags") => {
                let raw = read_text_field(field, "tags").await?;
                tags = raw
                    .split(',')
                    .filter_map(|tag| trimmed_non_empty(tag).map(str::to_owned))
                    .collect();
                tags.sort();
                tags.dedup();
            }
            _ => {}
        }
    }

    let title = title
        .as_deref()
        .and_then(trimmed_non_empty)
        .map(str::to_owned)
        .ok_or_else(|| AppError::bad_request("title must not be empty"))?;
    let department = department
        .as_deref()
        .and_then(trimmed_non_empty)
        .map(str::to_owned)
        .ok_or_else(|| AppError::bad_request("department must not be empty"))?;
    let level = level
        .as_deref()
        .and_then(trimmed_non_empty)
        .map(str::to_owned)
        .ok_or_else(|| AppError::bad_request("level must not be empty"))?;

    if files.is_empty() {
        return Err(AppError::bad_request("at least one file is required"));
    }
    if files.iter().any(|file| file.bytes.is_empty()) {
        return Err(AppError::bad_request("file parts must not be empty"));
    }

    Ok(CreateResourceFields {
        title,
        department,
        level,
        description,
        cover_color,
        tags,
        files,
    })
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>, name: &str) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|err| AppError::bad_request(format!("invalid {name} field: {err}")))
}

fn inline_content_disposition(filename: &str) -> Option<String> {
    if filename.is_empty() {
        return None;
    }

    let sanitized: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            _ => ch,
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(&sanitized, percent_encoding::NON_ALPHANUMERIC);
    Some(format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    ))
}

pub(crate) fn build_resource_responses(
    conn: &mut PgConnection,
    listed: Vec<Resource>,
) -> AppResult<Vec<ResourceResponse>> {
    let ids: Vec<Uuid> = listed.iter().map(|resource| resource.id).collect();
    let mut tags_map = load_tags_for_resources(conn, &ids)?;
    let mut files_map = load_files_for_resources(conn, &ids)?;
    let mut ratings_map = load_rating_summaries(conn, &ids)?;

    Ok(listed
        .into_iter()
        .map(|resource| {
            let tags = tags_map.remove(&resource.id).unwrap_or_default();
            let files = files_map.remove(&resource.id).unwrap_or_default();
            let rating = ratings_map.remove(&resource.id).unwrap_or(RatingSummary {
                count: 0,
                average: None,
            });
            to_resource_response(resource, tags, files, rating)
        })
        .collect())
}

pub(crate) fn load_tags_for_resources(
    conn: &mut PgConnection,
    resource_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<String>>> {
    if resource_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(Uuid, String)> = resource_tags::table
        .filter(resource_tags::resource_id.eq_any(resource_ids))
        .order(resource_tags::tag.asc())
        .select((resource_tags::resource_id, resource_tags::tag))
        .load(conn)?;

    let mut map: HashMap<Uuid, Vec<String>> = HashMap::new();
    for (resource_id, tag) in rows {
        map.entry(resource_id).or_default().push(tag);
    }
    Ok(map)
}

pub(crate) fn load_files_for_resources(
    conn: &mut PgConnection,
    resource_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<ResourceFileResponse>>> {
    if resource_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<ResourceFile> = resource_files::table
        .filter(resource_files::resource_id.eq_any(resource_ids))
        .order((
            resource_files::resource_id.asc(),
            resource_files::position.asc(),
        ))
        .load(conn)?;

    let mut map: HashMap<Uuid, Vec<ResourceFileResponse>> = HashMap::new();
    for file in rows {
        map.entry(file.resource_id)
            .or_default()
            .push(ResourceFileResponse::from(file));
    }
    Ok(map)
}

pub(crate) fn load_rating_summaries(
    conn: &mut PgConnection,
    resource_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, RatingSummary>> {
    if resource_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(Uuid, i32)> = ratings::table
        .filter(ratings::resource_id.eq_any(resource_ids))
        .select((ratings::resource_id, ratings::score))
        .load(conn)?;

    let mut totals: HashMap<Uuid, (i64, i64)> = HashMap::new();
    for (resource_id, score) in rows {
        let entry = totals.entry(resource_id).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += score as i64;
    }

    Ok(totals
        .into_iter()
        .map(|(resource_id, (count, sum))| {
            let average = (count > 0).then(|| sum as f64 / count as f64);
            (resource_id, RatingSummary { count, average })
        })
        .collect())
}

fn to_resource_response(
    resource: Resource,
    tags: Vec<String>,
    files: Vec<ResourceFileResponse>,
    rating: RatingSummary,
) -> ResourceResponse {
    ResourceResponse {
        id: resource.id,
        owner_id: resource.owner_id,
        department: resource.department,
        level: resource.level,
        title: resource.title,
        description: resource.description,
        cover_color: resource.cover_color,
        tags,
        files,
        file_count: resource.file_count,
        download_count: resource.download_count,
        view_count: resource.view_count,
        rating,
        created_at: to_iso(resource.created_at),
    }
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}
