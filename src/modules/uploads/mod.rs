use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    routing::get,
    Router,
};
use bookshelf_http::AppError;
use bookshelf_kernel::{InitCtx, Module};

use crate::modules::books::service::BookService;
use crate::utils;

/// Serves stored book images under `/uploads`
pub struct UploadsModule {
    service: Arc<BookService>,
}

impl UploadsModule {
    pub fn new(service: Arc<BookService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Module for UploadsModule {
    fn name(&self) -> &'static str {
        "uploads"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        if let Some(images) = self.service.images() {
            tracing::info!(
                module = self.name(),
                dir = %images.dir().display(),
                "uploads module initialized"
            );
        }
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/{image_name}", get(serve_image))
            .with_state(Arc::clone(&self.service))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "paths": {
                "/{imageName}": {
                    "get": {
                        "summary": "Download a stored book image",
                        "tags": ["Uploads"],
                        "parameters": [{
                            "name": "imageName",
                            "in": "path",
                            "required": true,
                            "schema": { "type": "string" }
                        }],
                        "responses": {
                            "200": {
                                "description": "Raw image bytes",
                                "content": {
                                    "application/octet-stream": {
                                        "schema": { "type": "string", "format": "binary" }
                                    }
                                }
                            },
                            "404": {
                                "description": "Image not found",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }))
    }
}

async fn serve_image(
    State(service): State<Arc<BookService>>,
    Path(image_name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let bytes = service.read_image(&image_name).await?;
    let content_type = utils::content_type_for(&image_name);
    Ok(([(CONTENT_TYPE, content_type)], bytes))
}

/// Create a new instance of the uploads module
pub fn create_module(service: Arc<BookService>) -> Arc<dyn Module> {
    Arc::new(UploadsModule::new(service))
}
