use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = profiles)]
#[diesel(belongs_to(User))]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub email: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = profiles)]
pub struct NewProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub email: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = resources)]
#[diesel(belongs_to(User, foreign_key = owner_id))]
pub struct Resource {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub department: String,
    pub level: String,
    pub title: String,
    pub description: Option<String>,
    pub cover_color: Option<String>,
    pub file_count: i32,
    pub download_count: i32,
    pub view_count: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = resources)]
pub struct NewResource {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub department: String,
    pub level: String,
    pub title: String,
    pub description: Option<String>,
    pub cover_color: Option<String>,
    pub file_count: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = resource_files)]
#[diesel(belongs_to(Resource))]
pub struct ResourceFile {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub position: i32,
    pub file_name: String,
    pub content_type: Option<String>,
    pub storage_key: String,
    pub size_bytes: i64,
    pub checksum: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = resource_files)]
pub struct NewResourceFile {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub position: i32,
    pub file_name: String,
    pub content_type: Option<String>,
    pub storage_key: String,
    pub size_bytes: i64,
    pub checksum: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = resource_tags)]
#[diesel(belongs_to(Resource))]
#[diesel(primary_key(resource_id, tag))]
pub struct ResourceTag {
    pub resource_id: Uuid,
    pub tag: String,
    pub assigned_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = resource_tags)]
pub struct NewResourceTag {
    pub resource_id: Uuid,
    pub tag: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = download_reminders)]
#[diesel(belongs_to(User))]
#[diesel(belongs_to(Resource))]
pub struct DownloadReminder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resource_id: Uuid,
    pub first_downloaded_at: NaiveDateTime,
    pub scheduled_send_at: NaiveDateTime,
    pub status: String,
    pub sent_at: Option<NaiveDateTime>,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = download_reminders)]
pub struct NewDownloadReminder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resource_id: Uuid,
    pub first_downloaded_at: NaiveDateTime,
    pub scheduled_send_at: NaiveDateTime,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = ratings)]
#[diesel(belongs_to(User))]
#[diesel(belongs_to(Resource))]
pub struct Rating {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resource_id: Uuid,
    pub score: i32,
    pub review: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = ratings)]
pub struct NewRating {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resource_id: Uuid,
    pub score: i32,
    pub review: Option<String>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = bookmarks)]
#[diesel(belongs_to(User))]
#[diesel(belongs_to(Resource))]
#[diesel(primary_key(user_id, resource_id))]
pub struct Bookmark {
    pub user_id: Uuid,
    pub resource_id: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = bookmarks)]
pub struct NewBookmark {
    pub user_id: Uuid,
    pub resource_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = refresh_tokens)]
#[diesel(belongs_to(User))]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub revoked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}
