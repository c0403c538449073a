use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Json,
};

use super::dto::DiaryInput;
use crate::{
    error::{AppError, AppResult},
    state::AppState,
    storage::StorageClient,
    uploads::services::{discard, is_video_item, read_multipart, store_all, UploadItem},
};

/// Diary create/update body. Accepts JSON with image paths, or multipart
/// with `title`, `content`, `images` files and an optional `video` file.
/// Files are only written once the caller is done with permission checks.
#[derive(Debug, Default)]
pub struct DiaryForm {
    pub input: DiaryInput,
    pub image_files: Vec<UploadItem>,
    pub video_file: Option<UploadItem>,
}

impl DiaryForm {
    /// Stores pending files and folds their paths into the input. Uploaded
    /// images replace any listed paths. Also returns the paths written by
    /// this call so they can be discarded if the write fails later on.
    pub async fn into_input(
        self,
        storage: &dyn StorageClient,
    ) -> AppResult<(DiaryInput, Vec<String>)> {
        let mut input = self.input;
        let mut stored = Vec::new();
        if !self.image_files.is_empty() {
            let images = store_all(storage, self.image_files).await?;
            stored.extend(images.iter().cloned());
            input.images = Some(images);
        }
        if let Some(video) = self.video_file {
            let paths = match store_all(storage, vec![video]).await {
                Ok(paths) => paths,
                Err(e) => {
                    discard(storage, &stored).await;
                    return Err(e);
                }
            };
            stored.extend(paths.iter().cloned());
            input.video_url = paths.into_iter().next();
        }
        Ok((input, stored))
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

#[async_trait]
impl FromRequest<AppState> for DiaryForm {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let Json(input) = Json::<DiaryInput>::from_request(req, state)
                .await
                .map_err(|e| AppError::invalid(e.body_text()))?;
            return Ok(DiaryForm {
                input,
                ..Default::default()
            });
        }

        let mp = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::invalid(e.body_text()))?;
        let mut form = read_multipart(mp, state.config.upload.max_file_bytes).await?;

        let image_files = form.take_files(&["images", "image"]);
        if image_files.iter().any(is_video_item) {
            return Err(AppError::invalid("images must be image files"));
        }
        let mut videos = form.take_files(&["video"]);
        if videos.len() > 1 || videos.iter().any(|v| !is_video_item(v)) {
            return Err(AppError::invalid("video must be a single video file"));
        }

        let listed_images = form.take_text(&["images", "image"]);
        let input = DiaryInput {
            title: form.first_text(&["title"]).unwrap_or_default(),
            content: form.first_text(&["content"]).unwrap_or_default(),
            images: (!listed_images.is_empty()).then_some(listed_images),
            video_url: form.first_text(&["videoUrl", "video"]),
            cover_image: form.first_text(&["coverImage"]),
        };

        Ok(DiaryForm {
            input,
            image_files,
            video_file: videos.pop(),
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request as HttpRequest};

    use super::*;
    use crate::state::testing::{self, FailingStorage, MemoryStorage};

    const BOUNDARY: &str = "XBOUNDARYX";

    fn multipart_body(parts: &[(&str, Option<(&str, &str)>, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, file, data) in parts {
            out.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file {
                Some((file_name, ct)) => out.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; \
                         filename=\"{file_name}\"\r\nContent-Type: {ct}\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => out.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            out.extend_from_slice(data.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        out
    }

    #[tokio::test]
    async fn parses_json_body() {
        let state = testing::fake();
        let req = HttpRequest::builder()
            .method("POST")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"title":"Guilin","content":"karst","images":["/uploads/a.jpg"]}"#,
            ))
            .unwrap();
        let form = DiaryForm::from_request(req, &state).await.unwrap();
        assert_eq!(form.input.title, "Guilin");
        assert_eq!(form.input.images.as_deref(), Some(&["/uploads/a.jpg".to_string()][..]));
        assert!(form.image_files.is_empty());
    }

    #[tokio::test]
    async fn parses_multipart_and_stores_files_on_demand() {
        let state = testing::fake();
        let body = multipart_body(&[
            ("title", None, "Chengdu"),
            ("content", None, "pandas"),
            ("images", Some(("a.jpg", "image/jpeg")), "jpeg-bytes"),
            ("images", Some(("b.png", "image/png")), "png-bytes"),
            ("video", Some(("v.mp4", "video/mp4")), "mp4-bytes"),
        ]);
        let req = HttpRequest::builder()
            .method("POST")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();

        let form = DiaryForm::from_request(req, &state).await.unwrap();
        assert_eq!(form.input.title, "Chengdu");
        assert_eq!(form.image_files.len(), 2);
        assert!(form.video_file.is_some());

        let storage = MemoryStorage::default();
        let (input, stored) = form.into_input(&storage).await.unwrap();
        assert_eq!(stored.len(), 3);
        let images = input.images.unwrap();
        assert_eq!(images.len(), 2);
        assert!(images[0].ends_with(".jpg") && images[1].ends_with(".png"));
        assert!(input.video_url.unwrap().ends_with(".mp4"));
        assert_eq!(storage.objects.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn rejects_video_in_images_field() {
        let state = testing::fake();
        let body = multipart_body(&[
            ("title", None, "t"),
            ("images", Some(("v.mp4", "video/mp4")), "mp4-bytes"),
        ]);
        let req = HttpRequest::builder()
            .method("POST")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        let err = DiaryForm::from_request(req, &state).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn failed_video_write_discards_stored_images() {
        let storage = FailingStorage::on_write(2);
        let form = DiaryForm {
            image_files: vec![UploadItem {
                ext: "jpg",
                content_type: "image/jpeg".into(),
                body: "jpeg-bytes".into(),
            }],
            video_file: Some(UploadItem {
                ext: "mp4",
                content_type: "video/mp4".into(),
                body: "mp4-bytes".into(),
            }),
            ..Default::default()
        };
        assert!(form.into_input(&storage).await.is_err());
        assert!(storage.inner.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn json_form_without_files_stores_nothing() {
        let storage = MemoryStorage::default();
        let form = DiaryForm {
            input: DiaryInput {
                images: Some(vec!["/uploads/x.jpg".into()]),
                ..Default::default()
            },
            ..Default::default()
        };
        let (input, stored) = form.into_input(&storage).await.unwrap();
        assert!(stored.is_empty());
        assert_eq!(input.images.unwrap(), vec!["/uploads/x.jpg".to_string()]);
        assert!(storage.objects.lock().unwrap().is_empty());
    }
}
