use std::future::{ready, Ready};

use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{self, HeaderValue},
    Error,
};
use futures::future::LocalBoxFuture;

const CORS_ALLOWED_METHODS_VALUE: &str = "GET, POST, OPTIONS";
const CORS_ALLOWED_HEADERS_VALUE: &str = "Accept, Authorization, Content-Type";

/// CORS middleware that validates origins and sets appropriate headers.
///
/// Validates the `Origin` header against the configured allowed origins and sets CORS
/// headers for both preflight (OPTIONS) and actual requests. Does nothing when no origins
/// are configured.
pub struct CorsMiddleware {
    allowed_origins: Vec<String>,
}

impl CorsMiddleware {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }
}

impl<S, B> Transform<S, ServiceRequest> for CorsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = CorsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        let allowed_origin_headers: Vec<(String, HeaderValue)> = self
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(hv) => Some((origin.clone(), hv)),
                Err(_) => {
                    log::warn!("Ignoring CORS origin that isn't a valid header value: {origin}");
                    None
                }
            })
            .collect();

        ready(Ok(CorsMiddlewareService {
            service,
            allowed_origin_headers,
        }))
    }
}

pub struct CorsMiddlewareService<S> {
    service: S,
    allowed_origin_headers: Vec<(String, HeaderValue)>,
}

impl<S, B> Service<ServiceRequest> for CorsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if self.allowed_origin_headers.is_empty() {
            let req_fut = self.service.call(req);
            return Box::pin(async move { Ok(req_fut.await?.map_into_boxed_body()) });
        }

        let allowed_origin_header = req
            .headers()
            .get(header::ORIGIN)
            .and_then(|h| h.to_str().ok())
            .and_then(|origin| {
                self.allowed_origin_headers
                    .iter()
                    .find(|(allowed, _)| allowed == origin)
                    .map(|(_, hv)| hv.clone())
            });

        if req.method() == actix_web::http::Method::OPTIONS {
            let (req_parts, _) = req.into_parts();
            let mut res = actix_web::HttpResponse::Ok();

            if let Some(origin_header) = &allowed_origin_header {
                res.insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, origin_header));
                res.insert_header((header::VARY, HeaderValue::from_static("Origin")));
                res.insert_header((
                    header::ACCESS_CONTROL_ALLOW_METHODS,
                    HeaderValue::from_static(CORS_ALLOWED_METHODS_VALUE),
                ));
                res.insert_header((
                    header::ACCESS_CONTROL_ALLOW_HEADERS,
                    HeaderValue::from_static(CORS_ALLOWED_HEADERS_VALUE),
                ));
                res.insert_header((
                    header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                    HeaderValue::from_static("true"),
                ));
                res.insert_header((
                    header::ACCESS_CONTROL_MAX_AGE,
                    HeaderValue::from_static("86400"),
                ));
            }

            let res = res.finish();
            let res = ServiceResponse::new(req_parts, res).map_into_boxed_body();
            return Box::pin(async move { Ok(res) });
        }

        let http_req = req.request().clone();
        let req_fut = self.service.call(req);

        Box::pin(async move {
            // Errors from inner middleware (such as the rate limiter) are rendered here so
            // they carry CORS headers too
            let mut res = match req_fut.await {
                Ok(res) => res.map_into_boxed_body(),
                Err(e) => ServiceResponse::new(http_req, e.error_response()),
            };

            if let Some(origin_header) = allowed_origin_header {
                res.headers_mut()
                    .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin_header);
                res.headers_mut().insert(
                    header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                    HeaderValue::from_static("true"),
                );
                res.headers_mut()
                    .append(header::VARY, HeaderValue::from_static("Origin"));
            }

            Ok(res)
        })
    }
}
