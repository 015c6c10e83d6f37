//! Swagger UI static resources.
//!
//! The UI is served at `http://host:port/swagger/ui`. Assets come either
//! from a directory on disk (`SWAGGER_RES_PATH`), read once at startup, or
//! from the bundle compiled into `utoipa-swagger-ui`.

use actix_web::{web, HttpResponse};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Entry page of the UI bundle
pub const INDEX_FILE: &str = "index.html";

/// Path the UI fetches the OpenAPI document from
pub const OPENAPI_JSON_PATH: &str = "/api-docs/oas-3.0.0.json";

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("swagger resource path {} does not exist", .0.display())]
    Missing(PathBuf),

    #[error("swagger resource path {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to read swagger resource {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("swagger resource path {} has no index.html", .0.display())]
    MissingIndex(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Resource {
    pub content_type: &'static str,
    pub body: web::Bytes,
}

/// Swagger UI asset bundle held in memory for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct SwaggerResources {
    files: HashMap<String, Resource>,
}

impl SwaggerResources {
    /// Read every regular file directly under `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ResourceError> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Err(ResourceError::Missing(dir.to_path_buf()));
        }
        if !dir.is_dir() {
            return Err(ResourceError::NotADirectory(dir.to_path_buf()));
        }

        let read_err = |path: &Path, source| ResourceError::Read {
            path: path.to_path_buf(),
            source,
        };

        let mut files = HashMap::new();
        for entry in std::fs::read_dir(dir).map_err(|e| read_err(dir, e))? {
            let entry = entry.map_err(|e| read_err(dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
                continue;
            };
            let body = std::fs::read(&path).map_err(|e| read_err(&path, e))?;
            files.insert(
                name.clone(),
                Resource {
                    content_type: content_type_for(&name),
                    body: web::Bytes::from(body),
                },
            );
        }

        if !files.contains_key(INDEX_FILE) {
            return Err(ResourceError::MissingIndex(dir.to_path_buf()));
        }

        info!(path = %dir.display(), files = files.len(), "swagger resources loaded");
        Ok(Self { files })
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.files.get(name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn content_type_for(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) => match ext.as_str() {
            "html" | "htm" => "text/html; charset=utf-8",
            "css" => "text/css; charset=utf-8",
            "js" | "mjs" => "application/javascript; charset=utf-8",
            "json" => "application/json",
            "map" => "application/json",
            "png" => "image/png",
            "svg" => "image/svg+xml",
            "ico" => "image/x-icon",
            "txt" => "text/plain; charset=utf-8",
            _ => "application/octet-stream",
        },
        None => "application/octet-stream",
    }
}

fn respond(resource: Option<&Resource>) -> HttpResponse {
    match resource {
        Some(resource) => HttpResponse::Ok()
            .content_type(resource.content_type)
            .body(resource.body.clone()),
        None => HttpResponse::NotFound().finish(),
    }
}

/// GET /swagger/ui
pub async fn ui(resources: web::Data<SwaggerResources>) -> HttpResponse {
    respond(resources.get(INDEX_FILE))
}

/// GET /swagger/{file}
pub async fn asset(
    resources: web::Data<SwaggerResources>,
    file: web::Path<String>,
) -> HttpResponse {
    respond(resources.get(file.as_str()))
}

/// Mount the disk-loaded bundle.
pub fn configure(resources: SwaggerResources) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(resources))
            .route("/swagger/ui", web::get().to(ui))
            .route("/swagger/{file}", web::get().to(asset));
    }
}
