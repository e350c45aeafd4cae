//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rescale API",
        version = "0.1.0",
        description = "Batch image upscaling: upload a ZIP archive of images, receive an archive of the resized images."
    ),
    paths(
        handlers::upscale::upscale_archive,
        handlers::health::health_check,
    ),
    components(schemas(error::ErrorResponse, handlers::health::HealthResponse)),
    tags(
        (name = "upscale", description = "Batch archive processing"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes() {
        let spec = get_openapi_spec();
        assert!(spec.paths.paths.contains_key("/upscale"));
        assert!(spec.paths.paths.contains_key("/health"));
    }
}
