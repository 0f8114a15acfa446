//! Book catalog operations over the record file and the upload directory.
//!
//! Each call loads the whole collection, works on it in memory and, for
//! writes, saves it back before returning. Writes are serialized by a single
//! mutex so two concurrent load-modify-save cycles cannot drop each other's
//! changes. Reads take no lock: saves replace the file atomically.

use bookshelf_http::AppError;
use bookshelf_kernel::settings::CatalogSettings;
use bookshelf_storage::{ImageStore, RecordRepository, RecordStore, StorageError};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::models::{Book, BookForm, ImageUpload};

pub const BOOK_DELETED: &str = "Book deleted successfully";
pub const BOOK_AND_IMAGE_DELETED: &str = "Book and associated image deleted successfully";

#[derive(Error, Debug)]
pub enum BookError {
    #[error("All fields are required")]
    MissingFields,

    #[error("Book with this ISBN already exists")]
    DuplicateIsbn,

    #[error("Book not found")]
    NotFound,

    #[error("Image not found")]
    ImageNotFound,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<BookError> for AppError {
    fn from(error: BookError) -> Self {
        match error {
            BookError::MissingFields => AppError::validation(error.to_string()),
            BookError::DuplicateIsbn => AppError::duplicate(error.to_string()),
            BookError::NotFound | BookError::ImageNotFound => AppError::not_found(error.to_string()),
            BookError::Storage(e) => AppError::Internal(e.into()),
        }
    }
}

pub struct BookService<R = RecordStore<Book>> {
    records: R,
    images: Option<ImageStore>,
    write_lock: Mutex<()>,
}

impl BookService {
    pub fn from_settings(settings: &CatalogSettings) -> Self {
        let images = settings
            .variant
            .supports_images()
            .then(|| ImageStore::new(&settings.uploads_dir));
        Self::new(RecordStore::new(&settings.books_file), images)
    }
}

impl<R> BookService<R>
where
    R: RecordRepository<Book>,
{
    /// `images` is `None` for the baseline catalog: uploads are ignored and
    /// records carry neither `id` nor `image`.
    pub fn new(records: R, images: Option<ImageStore>) -> Self {
        Self {
            records,
            images,
            write_lock: Mutex::new(()),
        }
    }

    pub fn images(&self) -> Option<&ImageStore> {
        self.images.as_ref()
    }

    /// Create the record file and upload directory when missing.
    pub async fn prepare(&self) -> Result<(), BookError> {
        self.records.ensure_exists().await?;
        if let Some(images) = &self.images {
            images.ensure_directory().await?;
        }
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Book>, BookError> {
        Ok(self.records.load().await?)
    }

    pub async fn get(&self, isbn: &str) -> Result<Book, BookError> {
        self.records
            .load()
            .await?
            .into_iter()
            .find(|book| book.isbn == isbn)
            .ok_or(BookError::NotFound)
    }

    pub async fn create(&self, form: BookForm) -> Result<Book, BookError> {
        let BookForm {
            title: Some(title),
            author: Some(author),
            publisher: Some(publisher),
            published_date: Some(published_date),
            isbn: Some(isbn),
            image,
        } = form
        else {
            return Err(BookError::MissingFields);
        };

        let _guard = self.write_lock.lock().await;
        let mut books = self.records.load().await?;

        if books.iter().any(|book| book.isbn == isbn) {
            return Err(BookError::DuplicateIsbn);
        }

        let stored_image = self.store_image(image.as_ref()).await?;
        let book = Book {
            id: self.images.is_some().then(|| Uuid::now_v7().to_string()),
            title,
            author,
            publisher,
            published_date,
            isbn,
            image: stored_image.clone(),
        };

        books.push(book.clone());
        if let Err(e) = self.records.save(&books).await {
            self.discard_image(stored_image.as_deref()).await;
            return Err(e.into());
        }

        tracing::info!(isbn = %book.isbn, image = ?book.image, "book created");
        Ok(book)
    }

    pub async fn update(&self, isbn: &str, form: BookForm) -> Result<Book, BookError> {
        let _guard = self.write_lock.lock().await;
        let mut books = self.records.load().await?;

        let book = books
            .iter_mut()
            .find(|book| book.isbn == isbn)
            .ok_or(BookError::NotFound)?;

        book.apply(&form);

        let stored_image = self.store_image(form.image.as_ref()).await?;
        let replaced_image = match &stored_image {
            Some(name) => book.image.replace(name.clone()),
            None => None,
        };
        let updated = book.clone();

        if let Err(e) = self.records.save(&books).await {
            self.discard_image(stored_image.as_deref()).await;
            return Err(e.into());
        }

        // The record no longer points at the old file; losing it is harmless.
        self.discard_image(replaced_image.as_deref()).await;

        tracing::info!(isbn = %updated.isbn, image = ?updated.image, "book updated");
        Ok(updated)
    }

    /// Remove a book and its image. Returns the confirmation message.
    pub async fn delete(&self, isbn: &str) -> Result<&'static str, BookError> {
        let _guard = self.write_lock.lock().await;
        let mut books = self.records.load().await?;

        let index = books
            .iter()
            .position(|book| book.isbn == isbn)
            .ok_or(BookError::NotFound)?;
        let removed = books.remove(index);

        self.records.save(&books).await?;

        tracing::info!(isbn = %removed.isbn, image = ?removed.image, "book deleted");

        if self.images.is_none() {
            return Ok(BOOK_DELETED);
        }
        self.discard_image(removed.image.as_deref()).await;
        Ok(BOOK_AND_IMAGE_DELETED)
    }

    /// Raw bytes of a stored image.
    pub async fn read_image(&self, name: &str) -> Result<Vec<u8>, BookError> {
        let images = self.images.as_ref().ok_or(BookError::ImageNotFound)?;
        match images.read(name).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.is_not_found() => Err(BookError::ImageNotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn store_image(&self, upload: Option<&ImageUpload>) -> Result<Option<String>, BookError> {
        match (&self.images, upload) {
            (Some(images), Some(upload)) => {
                Ok(Some(images.save(&upload.bytes, &upload.file_name).await?))
            }
            _ => Ok(None),
        }
    }

    async fn discard_image(&self, name: Option<&str>) {
        let (Some(images), Some(name)) = (&self.images, name) else {
            return;
        };
        if let Err(e) = images.delete(name).await {
            tracing::warn!(image = %name, error = %e, "failed to remove image file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Bytes;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct Fixture<R = RecordStore<Book>> {
        service: BookService<R>,
        dir: tempfile::TempDir,
    }

    impl<R> Fixture<R> {
        fn uploads(&self) -> std::path::PathBuf {
            self.dir.path().join("uploads")
        }

        fn stored_images(&self) -> Vec<String> {
            let mut names: Vec<_> = std::fs::read_dir(self.uploads())
                .unwrap()
                .map(|e| e.unwrap().file_name().into_string().unwrap())
                .collect();
            names.sort();
            names
        }
    }

    async fn fixture(with_images: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let images = with_images.then(|| ImageStore::new(dir.path().join("uploads")));
        let service = BookService::new(RecordStore::new(dir.path().join("books.json")), images);
        service.prepare().await.unwrap();
        Fixture { service, dir }
    }

    /// Record file whose saves can be switched to fail while loads keep working.
    struct FailingSaves {
        inner: RecordStore<Book>,
        failing: AtomicBool,
    }

    #[async_trait]
    impl RecordRepository<Book> for FailingSaves {
        async fn ensure_exists(&self) -> Result<(), StorageError> {
            self.inner.ensure_exists().await
        }

        async fn load(&self) -> Result<Vec<Book>, StorageError> {
            self.inner.load().await
        }

        async fn save(&self, records: &[Book]) -> Result<(), StorageError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::Write {
                    path: self.inner.path().to_path_buf(),
                    source: std::io::Error::other("no space left on device"),
                });
            }
            self.inner.save(records).await
        }
    }

    async fn failing_fixture() -> Fixture<FailingSaves> {
        let dir = tempfile::tempdir().unwrap();
        let records = FailingSaves {
            inner: RecordStore::new(dir.path().join("books.json")),
            failing: AtomicBool::new(false),
        };
        let images = Some(ImageStore::new(dir.path().join("uploads")));
        let service = BookService::new(records, images);
        service.prepare().await.unwrap();
        Fixture { service, dir }
    }

    fn form(isbn: &str) -> BookForm {
        BookForm {
            title: Some("A".to_string()),
            author: Some("B".to_string()),
            publisher: Some("C".to_string()),
            published_date: Some("2020".to_string()),
            isbn: Some(isbn.to_string()),
            image: None,
        }
    }

    fn upload(name: &str, bytes: &'static [u8]) -> Option<ImageUpload> {
        Some(ImageUpload {
            file_name: name.to_string(),
            bytes: Bytes::from_static(bytes),
        })
    }

    #[tokio::test]
    async fn create_then_get_returns_the_same_record() {
        let f = fixture(false).await;

        let created = f.service.create(form("111")).await.unwrap();
        let fetched = f.service.get("111").await.unwrap();

        assert_eq!(created, fetched);
        assert_eq!(created.id, None);
        assert_eq!(created.image, None);
    }

    #[tokio::test]
    async fn create_rejects_each_missing_field_without_appending() {
        let f = fixture(false).await;
        let blank: [fn(&mut BookForm); 5] = [
            |b| b.title = None,
            |b| b.author = None,
            |b| b.publisher = None,
            |b| b.published_date = None,
            |b| b.isbn = None,
        ];

        for clear in blank {
            let mut incomplete = form("111");
            clear(&mut incomplete);
            let err = f.service.create(incomplete).await.unwrap_err();
            assert!(matches!(err, BookError::MissingFields));
        }

        assert!(f.service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_isbn_is_rejected_and_collection_unchanged() {
        let f = fixture(false).await;
        f.service.create(form("111")).await.unwrap();

        let mut again = form("111");
        again.title = Some("Other".to_string());
        let err = f.service.create(again).await.unwrap_err();

        assert!(matches!(err, BookError::DuplicateIsbn));
        let books = f.service.list().await.unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].title, "A");
    }

    #[tokio::test]
    async fn update_with_only_author_changes_only_author() {
        let f = fixture(true).await;
        let mut with_image = form("111");
        with_image.image = upload("cover.png", b"png");
        let created = f.service.create(with_image).await.unwrap();

        let patch = BookForm {
            author: Some("B2".to_string()),
            ..BookForm::default()
        };
        let updated = f.service.update("111", patch).await.unwrap();

        assert_eq!(updated, Book { author: "B2".to_string(), ..created });
        assert_eq!(f.stored_images().len(), 1);
    }

    #[tokio::test]
    async fn update_with_empty_field_keeps_existing_value() {
        let f = fixture(false).await;
        f.service.create(form("111")).await.unwrap();

        let mut patch = BookForm::default();
        patch.set_text("title", String::new());
        let updated = f.service.update("111", patch).await.unwrap();

        assert_eq!(updated.title, "A");
    }

    #[tokio::test]
    async fn update_adds_image_to_record_without_one() {
        let f = fixture(true).await;
        f.service.create(form("111")).await.unwrap();
        assert!(f.stored_images().is_empty());

        let patch = BookForm {
            image: upload("cover.jpg", b"jpg"),
            ..BookForm::default()
        };
        let updated = f.service.update("111", patch).await.unwrap();

        let image = updated.image.unwrap();
        assert_eq!(f.stored_images(), vec![image.clone()]);
        assert_eq!(f.service.read_image(&image).await.unwrap(), b"jpg");
    }

    #[tokio::test]
    async fn update_replacing_image_deletes_previous_file() {
        let f = fixture(true).await;
        let mut with_image = form("111");
        with_image.image = upload("old.png", b"old");
        let old = f.service.create(with_image).await.unwrap().image.unwrap();

        let patch = BookForm {
            image: upload("new.png", b"new"),
            ..BookForm::default()
        };
        let new = f.service.update("111", patch).await.unwrap().image.unwrap();

        assert_ne!(old, new);
        assert_eq!(f.stored_images(), vec![new]);
    }

    #[tokio::test]
    async fn missing_isbn_is_not_found_for_get_update_delete() {
        let f = fixture(true).await;

        assert!(matches!(f.service.get("404").await, Err(BookError::NotFound)));
        assert!(matches!(
            f.service.update("404", form("404")).await,
            Err(BookError::NotFound)
        ));
        assert!(matches!(f.service.delete("404").await, Err(BookError::NotFound)));
    }

    #[tokio::test]
    async fn delete_cascades_to_image_file() {
        let f = fixture(true).await;
        let mut with_image = form("111");
        with_image.image = upload("cover.png", b"png");
        f.service.create(with_image).await.unwrap();
        assert_eq!(f.stored_images().len(), 1);

        let message = f.service.delete("111").await.unwrap();

        assert_eq!(message, BOOK_AND_IMAGE_DELETED);
        assert!(f.stored_images().is_empty());
        assert!(f.service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_without_image_touches_no_files() {
        let f = fixture(true).await;
        f.service.create(form("111")).await.unwrap();
        std::fs::write(f.uploads().join("unrelated.png"), "keep").unwrap();

        f.service.delete("111").await.unwrap();

        assert_eq!(f.stored_images(), vec!["unrelated.png".to_string()]);
    }

    #[tokio::test]
    async fn baseline_ignores_uploads_and_ids() {
        let f = fixture(false).await;
        let mut with_image = form("111");
        with_image.image = upload("cover.png", b"png");

        let created = f.service.create(with_image).await.unwrap();

        assert_eq!(created.id, None);
        assert_eq!(created.image, None);
        assert!(!f.uploads().exists());
        assert_eq!(f.service.delete("111").await.unwrap(), BOOK_DELETED);
        assert!(matches!(
            f.service.read_image("cover.png").await,
            Err(BookError::ImageNotFound)
        ));
    }

    #[tokio::test]
    async fn extended_create_assigns_an_id() {
        let f = fixture(true).await;

        let created = f.service.create(form("111")).await.unwrap();

        assert!(Uuid::parse_str(created.id.as_deref().unwrap()).is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_are_not_lost() {
        let f = fixture(true).await;
        let service = Arc::new(f.service);

        let tasks: Vec<_> = (0..24)
            .map(|n| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.create(form(&format!("isbn-{n}"))).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let books = service.list().await.unwrap();
        assert_eq!(books.len(), 24);
    }

    #[tokio::test]
    async fn failed_create_removes_the_stored_image() {
        let f = failing_fixture().await;
        f.service.records.failing.store(true, Ordering::SeqCst);
        let mut with_image = form("111");
        with_image.image = upload("cover.png", b"png");

        let err = f.service.create(with_image).await.unwrap_err();

        assert!(matches!(err, BookError::Storage(_)));
        assert!(f.stored_images().is_empty());
        assert!(f.service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_update_keeps_old_image_and_removes_new_one() {
        let f = failing_fixture().await;
        let mut with_image = form("111");
        with_image.image = upload("old.png", b"old");
        let old = f.service.create(with_image).await.unwrap().image.unwrap();

        f.service.records.failing.store(true, Ordering::SeqCst);
        let patch = BookForm {
            author: Some("B2".to_string()),
            image: upload("new.png", b"new"),
            ..BookForm::default()
        };
        let err = f.service.update("111", patch).await.unwrap_err();

        assert!(matches!(err, BookError::Storage(_)));
        assert_eq!(f.stored_images(), vec![old.clone()]);
        let unchanged = f.service.get("111").await.unwrap();
        assert_eq!(unchanged.image, Some(old.clone()));
        assert_eq!(unchanged.author, "B");
        assert_eq!(f.service.read_image(&old).await.unwrap(), b"old");
    }

    #[tokio::test]
    async fn storage_errors_surface_as_internal() {
        let dir = tempfile::tempdir().unwrap();
        let records = RecordStore::new(dir.path().join("absent.json"));
        let service: BookService = BookService::new(records, None);

        let err = service.list().await.unwrap_err();
        assert!(matches!(err, BookError::Storage(_)));
        let app_error: AppError = err.into();
        assert_eq!(app_error.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
