pub mod models;
pub mod routes;
pub mod service;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::Router;
use bookshelf_kernel::{InitCtx, Module};

use service::BookService;

/// Book catalog: CRUD over `/books`
pub struct BooksModule {
    service: Arc<BookService>,
}

impl BooksModule {
    pub fn new(service: Arc<BookService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.service
            .prepare()
            .await
            .context("failed to prepare catalog storage")?;

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            variant = ?ctx.settings.catalog.variant,
            books_file = %ctx.settings.catalog.books_file.display(),
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(Arc::clone(&self.service))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment(self.service.images().is_some()))
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

fn error_response(description: &str) -> serde_json::Value {
    serde_json::json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}

fn book_response(description: &str) -> serde_json::Value {
    serde_json::json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/Book" }
            }
        }
    })
}

fn openapi_fragment(with_images: bool) -> serde_json::Value {
    let isbn_param = serde_json::json!([{
        "name": "isbn",
        "in": "path",
        "required": true,
        "schema": { "type": "string" }
    }]);

    let mut request_content = serde_json::json!({
        "application/json": {
            "schema": { "$ref": "#/components/schemas/BookInput" }
        }
    });
    if with_images {
        request_content["multipart/form-data"] = serde_json::json!({
            "schema": {
                "allOf": [
                    { "$ref": "#/components/schemas/BookInput" },
                    {
                        "type": "object",
                        "properties": {
                            "image": { "type": "string", "format": "binary" }
                        }
                    }
                ]
            }
        });
    }

    let mut book_properties = serde_json::json!({
        "title": { "type": "string" },
        "author": { "type": "string" },
        "publisher": { "type": "string" },
        "publishedDate": { "type": "string" },
        "isbn": { "type": "string" }
    });
    if with_images {
        book_properties["id"] = serde_json::json!({ "type": "string" });
        book_properties["image"] = serde_json::json!({
            "type": "string",
            "description": "Stored file name, served under /uploads"
        });
    }

    serde_json::json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List books",
                    "tags": ["Books"],
                    "responses": {
                        "200": {
                            "description": "Every book in insertion order",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            }
                        },
                        "500": error_response("Internal server error")
                    }
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": { "required": true, "content": request_content.clone() },
                    "responses": {
                        "201": book_response("Created book"),
                        "400": error_response("Missing field or duplicate ISBN")
                    }
                }
            },
            "/{isbn}": {
                "get": {
                    "summary": "Get a book by ISBN",
                    "tags": ["Books"],
                    "parameters": isbn_param.clone(),
                    "responses": {
                        "200": book_response("Book"),
                        "404": error_response("Book not found")
                    }
                },
                "put": {
                    "summary": "Update the supplied fields of a book",
                    "tags": ["Books"],
                    "parameters": isbn_param.clone(),
                    "requestBody": { "content": request_content },
                    "responses": {
                        "200": book_response("Updated book"),
                        "404": error_response("Book not found")
                    }
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "parameters": isbn_param,
                    "responses": {
                        "200": {
                            "description": "Deletion confirmation",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/Message" }
                                }
                            }
                        },
                        "404": error_response("Book not found")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": book_properties,
                    "required": ["title", "author", "publisher", "publishedDate", "isbn"]
                },
                "BookInput": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "publisher": { "type": "string" },
                        "publishedDate": { "type": "string" },
                        "isbn": { "type": "string" }
                    }
                },
                "Message": {
                    "type": "object",
                    "properties": { "message": { "type": "string" } },
                    "required": ["message"]
                }
            }
        }
    })
}

/// Create a new instance of the books module
pub fn create_module(service: Arc<BookService>) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(service))
}
