//! Request body decoding for create and update: JSON or multipart form.

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use bookshelf_http::AppError;

use crate::modules::books::models::{BookForm, BookPayload, ImageUpload};

const IMAGE_FIELD: &str = "image";

impl<S> FromRequest<S> for BookForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match body_kind(&req) {
            BodyKind::Multipart => {
                let multipart = Multipart::from_request(req, state)
                    .await
                    .map_err(|e| AppError::bad_request(e.body_text()))?;
                from_multipart(multipart).await
            }
            BodyKind::Json => from_json(req, state).await,
            // Bodies of any other type are not read, so no field counts as provided.
            BodyKind::Other => Ok(BookForm::default()),
        }
    }
}

enum BodyKind {
    Multipart,
    Json,
    Other,
}

fn body_kind(req: &Request) -> BodyKind {
    let Some(content_type) = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    else {
        return BodyKind::Other;
    };

    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if essence == "multipart/form-data" {
        BodyKind::Multipart
    } else if essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
    {
        BodyKind::Json
    } else {
        BodyKind::Other
    }
}

async fn from_json<S>(req: Request, state: &S) -> Result<BookForm, AppError>
where
    S: Send + Sync,
{
    let body = Bytes::from_request(req, state)
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(BookForm::default());
    }

    let payload: BookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_request(format!("Invalid JSON body: {e}")))?;
    Ok(payload.into())
}

async fn from_multipart(mut multipart: Multipart) -> Result<BookForm, AppError> {
    let mut form = BookForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name == IMAGE_FIELD {
            let file_name = field.file_name().unwrap_or_default().to_owned();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::bad_request(e.body_text()))?;
            // Browsers send an empty part when no file was picked.
            if !bytes.is_empty() {
                form.image = Some(ImageUpload { file_name, bytes });
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::bad_request(e.body_text()))?;
            form.set_text(&name, value);
        }
    }

    Ok(form)
}
