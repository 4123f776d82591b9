// web-server/src/static_files.rs
use actix_files::{Files, NamedFile};
use actix_web::dev::{fn_service, ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::middleware::{Compress, Condition, DefaultHeaders};
use actix_web::{web, HttpResponse};
use common::{ApiResponse, CacheConfig, StaticFilesConfig};
use std::path::{Path, PathBuf};

/// Cache-Control value for static assets
pub fn cache_control(cache: &CacheConfig) -> String {
    let mut value = format!("public, max-age={}", cache.max_age);
    if cache.immutable {
        value.push_str(", immutable");
    }
    if cache.must_revalidate {
        value.push_str(", must-revalidate");
    }
    value
}

// Configure static file serving with SPA support
pub fn configure(cfg: &mut web::ServiceConfig, config: &StaticFilesConfig) {
    let root = PathBuf::from(&config.path);
    let index_path = root.join(&config.index);

    cfg.service(
        web::scope("")
            .wrap(DefaultHeaders::new().add((header::CACHE_CONTROL, cache_control(&config.cache))))
            .wrap(Condition::new(config.enable_compression, Compress::default()))
            .service(
                Files::new("/", &root)
                    .index_file(&config.index)
                    .prefer_utf8(true)
                    .use_etag(true)
                    .use_last_modified(true)
                    // Unknown paths fall through to the SPA index so client-side routing works
                    .default_handler(fn_service(move |req: ServiceRequest| {
                        let index_path = index_path.clone();
                        async move {
                            let (req, _) = req.into_parts();

                            // Don't serve index.html for API routes
                            if req.path().starts_with("/api/") {
                                let response = HttpResponse::NotFound()
                                    .json(ApiResponse::<()>::failure("Not found"));
                                return Ok(ServiceResponse::new(req, response));
                            }

                            let file = NamedFile::open_async(&index_path).await?;
                            let response = file.into_response(&req);
                            Ok(ServiceResponse::new(req, response))
                        }
                    })),
            ),
    );
}

/// Whether there is a bundle to serve at all
pub fn is_available(config: &StaticFilesConfig) -> bool {
    Path::new(&config.path).is_dir()
}
