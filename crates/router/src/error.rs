use http::Method;
use std::error::Error;
use thiserror::Error;

/// The error type produced by handlers and middleware at request time.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// A route path that can not be compiled into a pattern.
///
/// These are configuration errors: they surface while routes are registered, never while a
/// request is being dispatched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern '{pattern}' must start with '/'")]
    MissingLeadingSlash { pattern: String },

    #[error("pattern '{pattern}' contains a parameter without a name")]
    EmptyName { pattern: String },

    #[error("pattern '{pattern}' binds the parameter '{name}' more than once")]
    DuplicateName { pattern: String, name: String },

    #[error("optional parameter '{name}' must be the last segment of pattern '{pattern}'")]
    OptionalNotLast { pattern: String, name: String },
}

impl PatternError {
    pub fn missing_leading_slash<S: ToString>(pattern: S) -> Self {
        Self::MissingLeadingSlash { pattern: pattern.to_string() }
    }

    pub fn empty_name<S: ToString>(pattern: S) -> Self {
        Self::EmptyName { pattern: pattern.to_string() }
    }

    pub fn duplicate_name<S: ToString, N: ToString>(pattern: S, name: N) -> Self {
        Self::DuplicateName { pattern: pattern.to_string(), name: name.to_string() }
    }

    pub fn optional_not_last<S: ToString, N: ToString>(pattern: S, name: N) -> Self {
        Self::OptionalNotLast { pattern: pattern.to_string(), name: name.to_string() }
    }
}

/// Reported by [`RouterBuilder::build`](crate::router::RouterBuilder::build) when a registration was rejected.
#[derive(Error, Debug)]
pub enum RouterBuildError {
    #[error("invalid route {method} {path}: {source}")]
    InvalidRoute {
        method: Method,
        path: String,
        #[source]
        source: PatternError,
    },

    #[error("router configuration changed after {routes} route(s) were registered with the previous one")]
    ConfigAfterRoutes { routes: usize },
}

impl RouterBuildError {
    pub fn invalid_route<S: ToString>(method: Method, path: S, source: PatternError) -> Self {
        Self::InvalidRoute { method, path: path.to_string(), source }
    }

    pub fn config_after_routes(routes: usize) -> Self {
        Self::ConfigAfterRoutes { routes }
    }
}
