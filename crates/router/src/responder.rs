//! Response handling module that converts handler results into HTTP responses.
//!
//! This module provides the [`Responder`] trait which defines how different types
//! can be converted into HTTP responses. It includes implementations for common types
//! like Result, Option, String, etc.
//!
//! The [`Responder`] trait is the seam to response formatting: anything richer than plain text
//! is expected to arrive as a ready [`Response`].

use crate::Context;
use crate::body::ResponseBody;
use bytes::Bytes;
use http::{HeaderValue, Response, StatusCode};
use std::convert::Infallible;

/// A trait for types that can be converted into HTTP responses.
///
/// Types implementing this trait can be returned directly from request handlers
/// and will be automatically converted into HTTP responses.
pub trait Responder {
    fn response_to(self, ctx: &Context) -> Response<ResponseBody>;
}

/// The Ok and Err variants must both implement Responder.
impl<T: Responder, E: Responder> Responder for Result<T, E> {
    fn response_to(self, ctx: &Context) -> Response<ResponseBody> {
        match self {
            Ok(t) => t.response_to(ctx),
            Err(e) => e.response_to(ctx),
        }
    }
}

/// None case returns an empty response with the context's status.
impl<T: Responder> Responder for Option<T> {
    fn response_to(self, ctx: &Context) -> Response<ResponseBody> {
        match self {
            Some(t) => t.response_to(ctx),
            None => {
                let mut response = Response::new(ResponseBody::empty());
                *response.status_mut() = ctx.status();
                response
            }
        }
    }
}

/// Pre-built responses pass through, the body is converted to [`ResponseBody`].
impl<B> Responder for Response<B>
where
    B: Into<ResponseBody>,
{
    fn response_to(self, _ctx: &Context) -> Response<ResponseBody> {
        self.map(Into::into)
    }
}

impl<T: Responder> Responder for (StatusCode, T) {
    fn response_to(self, ctx: &Context) -> Response<ResponseBody> {
        let (status, responder) = self;
        let mut response = responder.response_to(ctx);
        *response.status_mut() = status;
        response
    }
}

impl<T: Responder> Responder for (T, StatusCode) {
    fn response_to(self, ctx: &Context) -> Response<ResponseBody> {
        let (responder, status) = self;
        (status, responder).response_to(ctx)
    }
}

impl<T: Responder> Responder for Box<T> {
    fn response_to(self, ctx: &Context) -> Response<ResponseBody> {
        (*self).response_to(ctx)
    }
}

/// Plain text, answered with the status currently set on the context.
impl Responder for &'static str {
    fn response_to(self, ctx: &Context) -> Response<ResponseBody> {
        plain_text(ctx.status(), ResponseBody::from(self))
    }
}

impl Responder for String {
    fn response_to(self, ctx: &Context) -> Response<ResponseBody> {
        plain_text(ctx.status(), ResponseBody::from(self))
    }
}

impl Responder for Bytes {
    fn response_to(self, ctx: &Context) -> Response<ResponseBody> {
        let mut response = Response::new(ResponseBody::from(self));
        *response.status_mut() = ctx.status();
        response
    }
}

impl Responder for Infallible {
    fn response_to(self, _ctx: &Context) -> Response<ResponseBody> {
        match self {}
    }
}

pub(crate) fn plain_text(status: StatusCode, body: ResponseBody) -> Response<ResponseBody> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    if let Ok(content_type) = HeaderValue::from_str(mime::TEXT_PLAIN_UTF_8.as_ref()) {
        response.headers_mut().insert(http::header::CONTENT_TYPE, content_type);
    }
    response
}

#[cfg(test)]
mod tests {
    use crate::context::tests::context_for;
    use crate::responder::Responder;
    use http::{Method, StatusCode};

    #[test]
    fn test_string_is_plain_text() {
        let ctx = context_for(Method::GET, "/");
        let response = String::from("hello").response_to(&ctx);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[http::header::CONTENT_TYPE], "text/plain; charset=utf-8");
    }

    #[test]
    fn test_plain_text_uses_context_status() {
        let mut ctx = context_for(Method::POST, "/");
        ctx.set_status(StatusCode::CREATED);

        assert_eq!("made".response_to(&ctx).status(), StatusCode::CREATED);
    }

    #[test]
    fn test_status_tuple() {
        let ctx = context_for(Method::GET, "/");

        assert_eq!((StatusCode::CREATED, "made").response_to(&ctx).status(), StatusCode::CREATED);
        assert_eq!(("gone", StatusCode::GONE).response_to(&ctx).status(), StatusCode::GONE);
    }

    #[test]
    fn test_result_and_option() {
        let ctx = context_for(Method::GET, "/");

        let err: Result<&'static str, (StatusCode, &'static str)> = Err((StatusCode::BAD_REQUEST, "bad"));
        assert_eq!(err.response_to(&ctx).status(), StatusCode::BAD_REQUEST);

        let none: Option<String> = None;
        let response = none.response_to(&ctx);
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(http::header::CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_none_uses_context_status() {
        let mut ctx = context_for(Method::GET, "/missing");
        ctx.set_status(StatusCode::NOT_FOUND);

        let response = None::<String>.response_to(&ctx);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
