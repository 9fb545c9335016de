//! CORS for the gateway binary.

use actix_cors::Cors;
use actix_web::http::header;

/// Build the CORS middleware.
///
/// With no configured origins, any `http://localhost[:port]` origin is
/// accepted so local merchant frontends work out of the box. Otherwise only
/// the listed origins are.
pub fn build_cors(allowed_origins: &[String]) -> Cors {
    let allowed = allowed_origins.to_vec();
    Cors::default()
        .allowed_origin_fn(move |origin, _req_head| {
            let origin = origin.to_str().unwrap_or("");
            if allowed.is_empty() {
                is_localhost(origin)
            } else {
                allowed.iter().any(|a| a == origin)
            }
        })
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600)
}

fn is_localhost(origin: &str) -> bool {
    origin == "http://localhost" || origin.starts_with("http://localhost:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    use crate::routes;

    #[::core::prelude::v1::test]
    fn localhost_matching() {
        assert!(is_localhost("http://localhost"));
        assert!(is_localhost("http://localhost:3000"));
        assert!(!is_localhost("https://localhost"));
        assert!(!is_localhost("http://localhost.evil.example"));
    }

    #[actix_rt::test]
    async fn default_allows_localhost_origin() {
        let app = test::init_service(App::new().wrap(build_cors(&[])).service(routes::health)).await;

        let req = test::TestRequest::get()
            .uri("/health")
            .insert_header((header::ORIGIN, "http://localhost:5173"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:5173"
        );
    }

    #[actix_rt::test]
    async fn configured_origin_is_allowed() {
        let origins = vec!["https://shop.example".to_string()];
        let app =
            test::init_service(App::new().wrap(build_cors(&origins)).service(routes::health)).await;

        let req = test::TestRequest::get()
            .uri("/health")
            .insert_header((header::ORIGIN, "https://shop.example"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://shop.example"
        );
    }
}
