use axum::body::Bytes;
use serde::{Deserialize, Serialize};

/// A catalog entry, keyed by ISBN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Generated at creation when images are enabled; informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub author: String,
    pub publisher: String,
    /// Opaque date representation, never parsed
    pub published_date: String,
    /// Unique key, immutable after creation
    pub isbn: String,
    /// Stored name of the uploaded image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Book {
    /// Overwrite every field the form provides. ISBN is never touched.
    pub fn apply(&mut self, form: &BookForm) {
        if let Some(title) = &form.title {
            self.title.clone_from(title);
        }
        if let Some(author) = &form.author {
            self.author.clone_from(author);
        }
        if let Some(publisher) = &form.publisher {
            self.publisher.clone_from(publisher);
        }
        if let Some(published_date) = &form.published_date {
            self.published_date.clone_from(published_date);
        }
    }
}

/// Decoded create/update request.
///
/// Every text field is `None` unless the client sent a non-empty value: empty
/// strings and `null` mean "not provided". Creation rejects missing fields and
/// updates leave them unchanged, so a field can never be cleared.
#[derive(Debug, Clone, Default)]
pub struct BookForm {
    pub title: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub isbn: Option<String>,
    pub image: Option<ImageUpload>,
}

impl BookForm {
    pub(crate) fn set_text(&mut self, field: &str, value: String) {
        let value = provided(Some(value));
        match field {
            "title" => self.title = value,
            "author" => self.author = value,
            "publisher" => self.publisher = value,
            "publishedDate" => self.published_date = value,
            "isbn" => self.isbn = value,
            _ => {}
        }
    }
}

/// JSON request body. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPayload {
    pub title: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub isbn: Option<String>,
}

impl From<BookPayload> for BookForm {
    fn from(payload: BookPayload) -> Self {
        Self {
            title: provided(payload.title),
            author: provided(payload.author),
            publisher: provided(payload.publisher),
            published_date: provided(payload.published_date),
            isbn: provided(payload.isbn),
            image: None,
        }
    }
}

/// Uploaded file from the `image` multipart field.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Body of delete responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

fn provided(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
