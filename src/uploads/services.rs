use std::collections::HashMap;

use axum::extract::Multipart;
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    storage::StorageClient,
};

pub const MAX_FILES_PER_REQUEST: usize = 10;

/// A validated file waiting to be written.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub ext: &'static str,
    pub content_type: String,
    pub body: Bytes,
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/quicktime" => Some("mov"),
        _ => None,
    }
}

fn ext_from_name(file_name: &str) -> Option<&'static str> {
    lazy_static! {
        static ref MEDIA_EXT_RE: Regex =
            Regex::new(r"(?i)\.(jpe?g|png|gif|mp4|webm|mov)$").unwrap();
    }
    let caps = MEDIA_EXT_RE.captures(file_name)?;
    match caps[1].to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        "gif" => Some("gif"),
        "mp4" => Some("mp4"),
        "webm" => Some("webm"),
        "mov" => Some("mov"),
        _ => None,
    }
}

/// Accepts images and short videos only. When both a file name and a MIME
/// type are given they must agree on the media family.
pub fn accept_file(
    file_name: Option<&str>,
    content_type: Option<&str>,
    body: Bytes,
    max_bytes: usize,
) -> AppResult<UploadItem> {
    let by_mime = content_type.and_then(ext_from_mime);
    let by_name = file_name.and_then(ext_from_name);

    let ext = match (by_name, by_mime) {
        (Some(n), Some(m)) if is_video(n) == is_video(m) => n,
        (Some(n), None) if content_type.is_none() => n,
        (None, Some(m)) if file_name.map_or(true, |f| !f.contains('.')) => m,
        _ => {
            warn!(?file_name, ?content_type, "rejected upload type");
            return Err(AppError::invalid("unsupported file type"));
        }
    };

    if body.is_empty() {
        return Err(AppError::invalid("empty file"));
    }
    if body.len() > max_bytes {
        return Err(AppError::invalid(format!(
            "file exceeds the {max_bytes} byte limit"
        )));
    }

    Ok(UploadItem {
        ext,
        content_type: content_type
            .map(str::to_string)
            .unwrap_or_else(|| default_mime(ext).to_string()),
        body,
    })
}

fn is_video(ext: &str) -> bool {
    matches!(ext, "mp4" | "webm" | "mov")
}

fn default_mime(ext: &str) -> &'static str {
    match ext {
        "jpg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

pub fn is_video_item(item: &UploadItem) -> bool {
    is_video(item.ext)
}

/// `<unix-millis>-<uuid>.<ext>`
pub fn object_key(ext: &str) -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    format!("{}-{}.{}", millis, Uuid::new_v4(), ext)
}

/// Writes every file and returns their reference paths in order. On failure
/// the files already written by this call are removed.
pub async fn store_all(
    storage: &dyn StorageClient,
    files: Vec<UploadItem>,
) -> AppResult<Vec<String>> {
    let mut paths = Vec::with_capacity(files.len());
    for f in files {
        let key = object_key(f.ext);
        if let Err(e) = storage.put_object(&key, f.body, &f.content_type).await {
            discard(storage, &paths).await;
            return Err(AppError::Internal(e));
        }
        paths.push(storage.public_path(&key));
    }
    info!(count = paths.len(), "stored uploads");
    Ok(paths)
}

/// Best-effort removal of files stored for a request that failed afterwards.
pub async fn discard(storage: &dyn StorageClient, paths: &[String]) {
    for path in paths {
        let key = path.rsplit('/').next().unwrap_or(path);
        if let Err(e) = storage.delete_object(key).await {
            warn!(error = %e, key, "failed to discard upload");
        }
    }
}

/// Multipart body split into file parts (by field name) and text parts.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub files: HashMap<String, Vec<UploadItem>>,
    pub text: HashMap<String, Vec<String>>,
}

impl MultipartForm {
    pub fn take_files(&mut self, names: &[&str]) -> Vec<UploadItem> {
        names
            .iter()
            .filter_map(|n| self.files.remove(*n))
            .flatten()
            .collect()
    }

    pub fn take_text(&mut self, names: &[&str]) -> Vec<String> {
        names
            .iter()
            .filter_map(|n| self.text.remove(*n))
            .flatten()
            .collect()
    }

    pub fn first_text(&mut self, names: &[&str]) -> Option<String> {
        self.take_text(names).into_iter().next()
    }
}

/// Reads the whole multipart body, validating file parts as they arrive.
pub async fn read_multipart(mut mp: Multipart, max_bytes: usize) -> AppResult<MultipartForm> {
    let mut form = MultipartForm::default();
    let mut file_count = 0usize;

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::invalid(e.body_text()))?
    {
        let name = field
            .name()
            .map(|n| n.trim_end_matches("[]").to_string())
            .unwrap_or_default();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::invalid(e.body_text()))?;

        if file_name.is_some() {
            file_count += 1;
            if file_count > MAX_FILES_PER_REQUEST {
                return Err(AppError::invalid(format!(
                    "at most {MAX_FILES_PER_REQUEST} files per request"
                )));
            }
            let item = accept_file(file_name.as_deref(), content_type.as_deref(), data, max_bytes)?;
            form.files.entry(name).or_default().push(item);
        } else {
            let value = String::from_utf8(data.to_vec())
                .map_err(|_| AppError::invalid(format!("field {name} is not valid UTF-8")))?;
            form.text.entry(name).or_default().push(value);
        }
    }
    Ok(form)
}
