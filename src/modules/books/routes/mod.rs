mod form;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use bookshelf_http::AppError;

use super::models::{Book, BookForm, MessageResponse};
use super::service::BookService;

/// Routes mounted under `/books`.
pub fn router(service: Arc<BookService>) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route(
            "/{isbn}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .with_state(service)
}

async fn list_books(State(service): State<Arc<BookService>>) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(service.list().await?))
}

async fn get_book(
    State(service): State<Arc<BookService>>,
    Path(isbn): Path<String>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(service.get(&isbn).await?))
}

async fn create_book(
    State(service): State<Arc<BookService>>,
    form: BookForm,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let book = service.create(form).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn update_book(
    State(service): State<Arc<BookService>>,
    Path(isbn): Path<String>,
    form: BookForm,
) -> Result<Json<Book>, AppError> {
    Ok(Json(service.update(&isbn, form).await?))
}

async fn delete_book(
    State(service): State<Arc<BookService>>,
    Path(isbn): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let message = service.delete(&isbn).await?;
    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}
