mod common;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_json, body_to_vec, TestApp};
use coursify_backend::models::DownloadReminder;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize)]
struct ResourceDetail {
    resource: ResourceInfo,
}

#[derive(Deserialize)]
struct ResourceInfo {
    id: Uuid,
    title: String,
    department: String,
    tags: Vec<String>,
    file_count: i32,
    download_count: i32,
    view_count: i32,
    files: Vec<FileInfo>,
}

#[derive(Deserialize)]
struct FileInfo {
    position: i32,
    file_name: String,
}

#[derive(Deserialize)]
struct DownloadResponse {
    files: Vec<DownloadFile>,
    reminder_scheduled: bool,
}

#[derive(Deserialize)]
struct DownloadFile {
    file_name: String,
    url: String,
}

async fn reminder_rows(app: &TestApp) -> Result<Vec<DownloadReminder>> {
    app.with_conn(|conn| {
        use coursify_backend::schema::download_reminders::dsl::download_reminders;
        download_reminders
            .load::<DownloadReminder>(conn)
            .context("failed to load reminders")
    })
    .await
}

#[tokio::test]
async fn upload_and_fetch_resource() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let password = "uploadpass";
    app.insert_user("uploader", "uploader@example.com", password, "member")
        .await?;
    let token = app.login_token("uploader", password).await?;

    let upload = app
        .upload_resource(
            "Calculus Notes",
            "Mathematics",
            "100",
            Some("calculus, notes"),
            &[
                ("chapter1.pdf", "application/pdf", b"pdf bytes one"),
                ("chapter2.pdf", "application/pdf", b"pdf bytes two"),
            ],
            &token,
        )
        .await?;
    assert_eq!(upload.status(), StatusCode::CREATED);
    let body = body_to_vec(upload.into_body()).await?;
    let detail: ResourceDetail = serde_json::from_slice(&body)?;

    assert_eq!(detail.resource.title, "Calculus Notes");
    assert_eq!(detail.resource.department, "Mathematics");
    assert_eq!(detail.resource.tags, vec!["calculus", "notes"]);
    assert_eq!(detail.resource.file_count, 2);
    assert_eq!(detail.resource.files.len(), 2);
    assert_eq!(detail.resource.files[0].position, 0);
    assert_eq!(detail.resource.files[0].file_name, "chapter1.pdf");

    assert_eq!(app.storage().object_count().await, 2);

    let fetched = app
        .get(&format!("/api/resources/{}", detail.resource.id), None)
        .await?;
    assert_eq!(fetched.status(), StatusCode::OK);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn upload_without_files_is_rejected() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let password = "uploadpass";
    app.insert_user("emptyhanded", "empty@example.com", password, "member")
        .await?;
    let token = app.login_token("emptyhanded", password).await?;

    let upload = app
        .upload_resource("No Files", "Physics", "200", None, &[], &token)
        .await?;
    assert_eq!(upload.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn listing_supports_filters_and_search() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let password = "listpass";
    app.insert_user("lister", "lister@example.com", password, "member")
        .await?;
    let token = app.login_token("lister", password).await?;

    for (title, department, level, tags) in [
        ("Linear Algebra", "Mathematics", "200", "algebra, matrices"),
        ("Mechanics Primer", "Physics", "100", "mechanics"),
        ("Algebraic Topology", "Mathematics", "400", "algebra, topology"),
    ] {
        let upload = app
            .upload_resource(
                title,
                department,
                level,
                Some(tags),
                &[("notes.txt", "text/plain", b"content")],
                &token,
            )
            .await?;
        assert_eq!(upload.status(), StatusCode::CREATED);
    }

    let by_department = app
        .get("/api/resources?department=Mathematics", None)
        .await?;
    assert_eq!(by_department.status(), StatusCode::OK);
    let listed = body_to_json(by_department.into_body()).await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(2));

    let by_search = app.get("/api/resources?q=mechanics", None).await?;
    let listed = body_to_json(by_search.into_body()).await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["title"], "Mechanics Primer");

    let by_tags = app
        .get("/api/resources?tags=algebra,topology", None)
        .await?;
    let listed = body_to_json(by_tags.into_body()).await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["title"], "Algebraic Topology");

    let no_match = app
        .get("/api/resources?tags=algebra,mechanics", None)
        .await?;
    let listed = body_to_json(no_match.into_body()).await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(0));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn view_counter_increments() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let owner = app
        .insert_user("viewer", "viewer@example.com", "viewerpass", "member")
        .await?;
    let resource_id = app.insert_resource(owner, "Viewed Material").await?;

    for _ in 0..3 {
        let response = app
            .post_empty(&format!("/api/resources/{resource_id}/view"), None)
            .await?;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let fetched = app
        .get(&format!("/api/resources/{resource_id}"), None)
        .await?;
    let body = body_to_vec(fetched.into_body()).await?;
    let detail: ResourceDetail = serde_json::from_slice(&body)?;
    assert_eq!(detail.resource.view_count, 3);

    let missing = app
        .post_empty(&format!("/api/resources/{}/view", Uuid::new_v4()), None)
        .await?;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn download_schedules_exactly_one_reminder() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let password = "downloadpass";
    app.insert_user("owner", "owner@example.com", password, "member")
        .await?;
    let downloader = app
        .insert_user("student", "student@example.com", password, "member")
        .await?;
    let token = app.login_token("owner", password).await?;

    let upload = app
        .upload_resource(
            "Exam Prep",
            "Chemistry",
            "300",
            None,
            &[("prep.pdf", "application/pdf", b"prep")],
            &token,
        )
        .await?;
    assert_eq!(upload.status(), StatusCode::CREATED);
    let body = body_to_vec(upload.into_body()).await?;
    let detail: ResourceDetail = serde_json::from_slice(&body)?;
    let resource_id = detail.resource.id;

    let student_token = app.login_token("student", password).await?;
    let download = app
        .post_json(
            &format!("/api/resources/{resource_id}/download"),
            &json!({}),
            Some(&student_token),
        )
        .await?;
    assert_eq!(download.status(), StatusCode::OK);
    let body = body_to_vec(download.into_body()).await?;
    let parsed: DownloadResponse = serde_json::from_slice(&body)?;
    assert!(parsed.reminder_scheduled);
    assert_eq!(parsed.files.len(), 1);
    assert_eq!(parsed.files[0].file_name, "prep.pdf");
    assert!(parsed.files[0].url.starts_with("https://fake-storage/"));

    // The same user downloading again keeps the original reminder.
    let repeat = app
        .post_json(
            &format!("/api/resources/{resource_id}/download"),
            &json!({}),
            Some(&student_token),
        )
        .await?;
    assert_eq!(repeat.status(), StatusCode::OK);
    let body = body_to_vec(repeat.into_body()).await?;
    let parsed: DownloadResponse = serde_json::from_slice(&body)?;
    assert!(!parsed.reminder_scheduled);

    let rows = reminder_rows(&app).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, downloader);
    assert_eq!(rows[0].resource_id, resource_id);
    assert_eq!(rows[0].status, "scheduled");
    assert!(rows[0].scheduled_send_at > rows[0].first_downloaded_at);

    let fetched = app
        .get(&format!("/api/resources/{resource_id}"), None)
        .await?;
    let body = body_to_vec(fetched.into_body()).await?;
    let detail: ResourceDetail = serde_json::from_slice(&body)?;
    assert_eq!(detail.resource.download_count, 2);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn anonymous_download_counts_without_reminder() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let owner = app
        .insert_user("anonowner", "anonowner@example.com", "ownerpass", "member")
        .await?;
    let resource_id = app.insert_resource(owner, "Public Notes").await?;

    let download = app
        .post_empty(&format!("/api/resources/{resource_id}/download"), None)
        .await?;
    assert_eq!(download.status(), StatusCode::OK);
    let body = body_to_vec(download.into_body()).await?;
    let parsed: DownloadResponse = serde_json::from_slice(&body)?;
    assert!(!parsed.reminder_scheduled);

    assert!(reminder_rows(&app).await?.is_empty());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn download_with_unknown_user_rolls_back() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let owner = app
        .insert_user("rollowner", "rollowner@example.com", "ownerpass", "member")
        .await?;
    let resource_id = app.insert_resource(owner, "Guarded Notes").await?;

    let download = app
        .post_json(
            &format!("/api/resources/{resource_id}/download"),
            &json!({ "user_id": Uuid::new_v4() }),
            None,
        )
        .await?;
    assert_eq!(download.status(), StatusCode::NOT_FOUND);

    // The counter bump rolled back with the failed reminder insert.
    let fetched = app
        .get(&format!("/api/resources/{resource_id}"), None)
        .await?;
    let body = body_to_vec(fetched.into_body()).await?;
    let detail: ResourceDetail = serde_json::from_slice(&body)?;
    assert_eq!(detail.resource.download_count, 0);
    assert!(reminder_rows(&app).await?.is_empty());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn download_of_missing_resource_is_not_found() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let download = app
        .post_empty(&format!("/api/resources/{}/download", Uuid::new_v4()), None)
        .await?;
    assert_eq!(download.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}
