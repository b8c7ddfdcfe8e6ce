// CORS middleware for Emotion API
//
// Allows browser clients from a configured list of origins. Patterns may use a
// single `*` in the host (e.g. `https://*.vercel.app`); a bare `*` allows any
// origin. Credentials are allowed, so the request origin is echoed back rather
// than a wildcard. Preflight requests from allowed origins are answered here
// with 204 and never reach the handlers.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{
        header::{self, HeaderValue},
        Method,
    },
    Error, HttpResponse,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use log::debug;
use std::rc::Rc;

const PREFLIGHT_MAX_AGE: &str = "86400";
const DEFAULT_ALLOW_METHODS: &str = "GET, POST, OPTIONS";

/// One allowed origin, exact or with a host wildcard
#[derive(Debug, Clone, PartialEq)]
pub enum OriginPattern {
    Any,
    Exact(String),
    Wildcard { prefix: String, suffix: String },
}

impl OriginPattern {
    pub fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim().trim_end_matches('/');
        if pattern == "*" {
            return OriginPattern::Any;
        }
        match pattern.split_once('*') {
            Some((prefix, suffix)) => OriginPattern::Wildcard {
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            },
            None => OriginPattern::Exact(pattern.to_string()),
        }
    }

    pub fn matches(&self, origin: &str) -> bool {
        match self {
            OriginPattern::Any => true,
            OriginPattern::Exact(allowed) => allowed == origin,
            OriginPattern::Wildcard { prefix, suffix } => {
                origin.len() > prefix.len() + suffix.len()
                    && origin.starts_with(prefix.as_str())
                    && origin.ends_with(suffix.as_str())
                    && !origin[prefix.len()..origin.len() - suffix.len()].contains('/')
            }
        }
    }
}

/// Middleware factory for CORS
pub struct Cors {
    origins: Rc<Vec<OriginPattern>>,
}

impl Cors {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            origins: Rc::new(
                origins
                    .into_iter()
                    .filter(|o| !o.as_ref().trim().is_empty())
                    .map(|o| OriginPattern::parse(o.as_ref()))
                    .collect(),
            ),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Cors
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = CorsMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(CorsMiddleware {
            service,
            origins: Rc::clone(&self.origins),
        })
    }
}

/// CORS middleware implementation
pub struct CorsMiddleware<S> {
    service: S,
    origins: Rc<Vec<OriginPattern>>,
}

impl<S> CorsMiddleware<S> {
    /// The request's Origin header, if it is allowed
    fn allowed_origin(&self, req: &ServiceRequest) -> Option<HeaderValue> {
        let origin = req.headers().get(header::ORIGIN)?;
        let origin_str = origin.to_str().ok()?;
        if self.origins.iter().any(|p| p.matches(origin_str)) {
            Some(origin.clone())
        } else {
            debug!("Origin {} is not allowed by CORS", origin_str);
            None
        }
    }
}

impl<S, B> Service<ServiceRequest> for CorsMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let origin = self.allowed_origin(&req);

        let is_preflight = req.method() == Method::OPTIONS
            && req
                .headers()
                .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);

        if let (true, Some(origin)) = (is_preflight, origin.clone()) {
            let allow_methods = req
                .headers()
                .get(header::ACCESS_CONTROL_REQUEST_METHOD)
                .cloned()
                .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_ALLOW_METHODS));
            let allow_headers = req
                .headers()
                .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
                .cloned()
                .unwrap_or_else(|| HeaderValue::from_static("*"));

            let response = HttpResponse::NoContent()
                .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, origin))
                .insert_header((header::ACCESS_CONTROL_ALLOW_CREDENTIALS, "true"))
                .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, allow_methods))
                .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers))
                .insert_header((header::ACCESS_CONTROL_MAX_AGE, PREFLIGHT_MAX_AGE))
                .insert_header((header::VARY, "Origin"))
                .finish();

            debug!("Answered CORS preflight for {}", req.path());
            return Box::pin(async move { Ok(req.into_response(response).map_into_right_body()) });
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let mut res = fut.await?;
            if let Some(origin) = origin {
                let headers = res.headers_mut();
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
                headers.insert(
                    header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                    HeaderValue::from_static("true"),
                );
                headers.insert(header::VARY, HeaderValue::from_static("Origin"));
            }
            Ok(res.map_into_left_body())
        })
    }
}
