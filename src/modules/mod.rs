pub mod books;
pub mod uploads;

use std::sync::Arc;

use bookshelf_kernel::{settings::Settings, ModuleRegistry};

use books::service::BookService;

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, settings: &Settings) -> anyhow::Result<()> {
    let service = Arc::new(BookService::from_settings(&settings.catalog));

    registry.register(books::create_module(Arc::clone(&service)))?;
    if settings.catalog.variant.supports_images() {
        registry.register(uploads::create_module(service))?;
    }

    Ok(())
}
