use actix_multipart::{Field, Multipart};
use actix_web::body::SizedStream;
use actix_web::http::header::{ACCEPT_RANGES, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use actix_web::{delete, get, post, web, HttpRequest, HttpResponse};
use futures::StreamExt;
use log::error;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use crate::error::{AppError, Result};
use crate::file_store::{parse_range, ByteRange, FileStore};
use crate::models::{
    CommentCreated, CommentRequest, ForgotPasswordRequest, LikedResponse, LoginRequest,
    LoginResponse, MessageResponse, NewVideo, RegisterRequest, ResetPasswordRequest,
    UploadResponse, User, UserProfile,
};
use crate::{accounts, auth, comments, likes, videos, AppState};

const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

#[post("/api/register")]
async fn register(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    accounts::register(&state.db_pool, &state.config, &req).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("User registered successfully")))
}

#[post("/api/login")]
async fn login(req: web::Json<LoginRequest>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let user =
        accounts::authenticate(&state.db_pool, &state.config, &req.username, &req.password).await?;
    let access_token = auth::issue_token(&user, &state.config)?;
    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

#[post("/api/forgot-password")]
async fn forgot_password(
    req: web::Json<ForgotPasswordRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let message = accounts::request_reset(
        &state.db_pool,
        &state.config,
        state.notifier.as_ref(),
        &req.email,
    )
    .await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new(message)))
}

#[post("/api/reset-password")]
async fn reset_password(
    req: web::Json<ResetPasswordRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    accounts::reset_password(&state.db_pool, &state.config, &req.token, &req.new_password).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "Password reset successfully. You can now login.",
    )))
}

#[get("/api/me")]
async fn me(http_req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    let token = auth::bearer_token(&http_req);
    let user = auth::require(&state.db_pool, &state.config, token.as_deref()).await?;
    Ok(HttpResponse::Ok().json(UserProfile::from(&user)))
}

#[get("/api/status")]
async fn status() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "running"
    }))
}

#[derive(Default)]
struct UploadForm {
    owner: Option<User>,
    video: NewVideo,
    token: Option<String>,
    stored_key: Option<String>,
}

#[post("/api/upload")]
async fn upload(
    http_req: HttpRequest,
    mut payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    // A header token is checked before any bytes reach the disk.
    let mut form = UploadForm::default();
    if let Some(token) = auth::bearer_token(&http_req) {
        let owner = auth::require(&state.db_pool, &state.config, Some(token.as_str())).await?;
        form.owner = Some(owner);
    }

    let result = match read_upload(&mut payload, &state, &mut form).await {
        Ok(()) => store_upload(&state, &form).await,
        Err(e) => Err(e),
    };

    // Nothing may stay on disk unless a row references it.
    if result.is_err() {
        if let Some(key) = &form.stored_key {
            if let Err(e) = state.file_store.remove(key).await {
                error!("Failed to clean up rejected upload {}: {:?}", key, e);
            }
        }
    }

    let video_id = result?;
    Ok(HttpResponse::Ok().json(UploadResponse {
        message: "Video uploaded successfully".to_string(),
        video_id,
    }))
}

async fn read_upload(payload: &mut Multipart, state: &AppState, form: &mut UploadForm) -> Result<()> {
    while let Some(field) = payload.next().await {
        let mut field = field?;
        let name = field.name().to_string();

        if name == "file" {
            let filename = field
                .content_disposition()
                .get_filename()
                .map(str::to_string)
                .unwrap_or_default();
            if filename.trim().is_empty() || form.stored_key.is_some() {
                drain(&mut field).await?;
                continue;
            }

            let key = FileStore::storage_key(&filename);
            let mut file = state.file_store.create(&key).await?;
            form.stored_key = Some(key);

            let mut written: u64 = 0;
            while let Some(chunk) = field.next().await {
                let chunk = chunk?;
                written += chunk.len() as u64;
                if written > state.config.max_upload_bytes {
                    return Err(AppError::Validation("File too large".to_string()));
                }
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            continue;
        }

        let value = read_text(&mut field).await?;
        match name.as_str() {
            "title" => form.video.title = value,
            "description" => form.video.description = value,
            "category" => form.video.category = Some(value),
            "duration" => form.video.duration = Some(value),
            "token" => form.token = Some(value),
            _ => {}
        }
    }
    Ok(())
}

async fn store_upload(state: &AppState, form: &UploadForm) -> Result<i64> {
    videos::validate(&form.video)?;
    let key = form
        .stored_key
        .as_deref()
        .ok_or_else(|| AppError::Validation("No file selected".to_string()))?;

    let user = match &form.owner {
        Some(user) => user.clone(),
        None => auth::require(&state.db_pool, &state.config, form.token.as_deref()).await?,
    };

    videos::create(&state.db_pool, &user, &form.video, key).await
}

async fn read_text(field: &mut Field) -> Result<String> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk?;
        if buf.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
            return Err(AppError::Validation(format!(
                "Field '{}' is too long",
                field.name()
            )));
        }
        buf.extend_from_slice(&chunk);
    }
    String::from_utf8(buf)
        .map_err(|_| AppError::Validation(format!("Field '{}' is not valid UTF-8", field.name())))
}

async fn drain(field: &mut Field) -> Result<()> {
    while let Some(chunk) = field.next().await {
        chunk?;
    }
    Ok(())
}

#[get("/api/videos")]
async fn get_videos(state: web::Data<AppState>) -> Result<HttpResponse> {
    let videos = videos::list_all(&state.db_pool).await?;
    Ok(HttpResponse::Ok().json(videos))
}

#[get("/api/video/{id}/info")]
async fn get_video_info(path: web::Path<i64>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let video = videos::get_summary(&state.db_pool, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(video))
}

#[get("/api/video/{id}")]
async fn stream_video(
    http_req: HttpRequest,
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let video = videos::find(&state.db_pool, path.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("Video not found".to_string()))?;

    let (mut file, size) = state
        .file_store
        .open(&video.file_path)
        .await?
        .ok_or_else(|| {
            error!("Video {} references missing file {}", video.id, video.file_path);
            AppError::FileMissing
        })?;

    let content_type = mime_guess::from_path(&video.file_path)
        .first()
        .filter(|mime| mime.type_().as_str() == "video")
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| "video/mp4".to_string());

    let range = parse_range(
        http_req.headers().get(RANGE).and_then(|v| v.to_str().ok()),
        size,
    );

    let response = match range {
        ByteRange::Unsatisfiable => HttpResponse::RangeNotSatisfiable()
            .insert_header((ACCEPT_RANGES, "bytes"))
            .insert_header((CONTENT_RANGE, format!("bytes */{}", size)))
            .finish(),
        ByteRange::Full => HttpResponse::Ok()
            .insert_header((ACCEPT_RANGES, "bytes"))
            .insert_header((CONTENT_TYPE, content_type))
            .body(SizedStream::new(size, ReaderStream::new(file))),
        ByteRange::Partial { start, end } => {
            FileStore::seek_to(&mut file, range).await?;
            let length = range.len(size);
            HttpResponse::PartialContent()
                .insert_header((ACCEPT_RANGES, "bytes"))
                .insert_header((CONTENT_TYPE, content_type))
                .insert_header((CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, size)))
                .body(SizedStream::new(length, ReaderStream::new(file.take(length))))
        }
    };
    Ok(response)
}

#[delete("/api/video/{id}")]
async fn delete_video(
    http_req: HttpRequest,
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let token = auth::bearer_token(&http_req);
    let user = auth::require(&state.db_pool, &state.config, token.as_deref()).await?;
    videos::delete(&state.db_pool, &state.file_store, path.into_inner(), &user).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Video deleted successfully")))
}

#[post("/api/like/{id}")]
async fn toggle_like(
    http_req: HttpRequest,
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let token = auth::bearer_token(&http_req);
    let user = auth::require(&state.db_pool, &state.config, token.as_deref()).await?;
    let like_status = likes::toggle(&state.db_pool, path.into_inner(), &user).await?;
    Ok(HttpResponse::Ok().json(like_status))
}

#[post("/api/liked/{id}")]
async fn check_liked(
    http_req: HttpRequest,
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let user = match auth::bearer_token(&http_req) {
        Some(token) => auth::resolve(&state.db_pool, &state.config, &token)
            .await
            .unwrap_or_else(|e| {
                error!("Error resolving token for like check: {:?}", e);
                None
            }),
        None => None,
    };
    let liked = likes::check(&state.db_pool, path.into_inner(), user.as_ref()).await;
    HttpResponse::Ok().json(LikedResponse { liked })
}

#[get("/api/comment/{id}")]
async fn get_comments(path: web::Path<i64>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let comments = comments::list(&state.db_pool, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(comments))
}

#[post("/api/comment/{id}")]
async fn post_comment(
    http_req: HttpRequest,
    path: web::Path<i64>,
    req: web::Json<CommentRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let token = auth::bearer_token(&http_req);
    let user = auth::require(&state.db_pool, &state.config, token.as_deref()).await?;
    let comment = comments::add(&state.db_pool, path.into_inner(), &user, &req.comment).await?;
    Ok(HttpResponse::Ok().json(CommentCreated {
        message: "Comment added successfully".to_string(),
        comment,
    }))
}

#[delete("/api/comment/{id}")]
async fn delete_comment(
    http_req: HttpRequest,
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let token = auth::bearer_token(&http_req);
    let user = auth::require(&state.db_pool, &state.config, token.as_deref()).await?;
    comments::delete(&state.db_pool, path.into_inner(), &user).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Comment deleted successfully")))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(register)
       .service(login)
       .service(forgot_password)
       .service(reset_password)
       .service(me)
       .service(status)
       .service(upload)
       .service(get_videos)
       .service(get_video_info)
       .service(stream_video)
       .service(delete_video)
       .service(toggle_like)
       .service(check_liked)
       .service(get_comments)
       .service(post_comment)
       .service(delete_comment);
}
