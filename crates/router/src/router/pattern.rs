//! Route path compilation and structural matching.
//!
//! A route path is compiled once, when it is registered, into an ordered list of [`Segment`]s:
//!
//! - `users` a static segment, compared for equality
//! - `:name` a named parameter, binding exactly one path segment
//! - `:name?` an optional parameter, only allowed as the last segment
//! - `*name` a wildcard, binding one or more segments joined by `/`
//!
//! Patterns may hold several wildcards (`/v1/*brand/shop/*name`). Each wildcard takes the
//! shortest run of segments that still lets the remainder of the pattern match, so static
//! segments following a wildcard act as anchors.

use crate::PathParams;
use crate::error::PatternError;
use std::sync::Arc;

/// One compiled unit of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Static(String),
    Param(Arc<str>),
    OptionalParam(Arc<str>),
    Wildcard(Arc<str>),
}

impl Segment {
    fn parse(pattern: &str, raw: &str) -> Result<Self, PatternError> {
        let segment = if let Some(name) = raw.strip_prefix(':') {
            match name.strip_suffix('?') {
                Some(name) => Segment::OptionalParam(Arc::from(name)),
                None => Segment::Param(Arc::from(name)),
            }
        } else if let Some(name) = raw.strip_prefix('*') {
            Segment::Wildcard(Arc::from(name))
        } else {
            return Ok(Segment::Static(raw.to_owned()));
        };

        if segment.param_name().is_some_and(|name| name.is_empty()) {
            return Err(PatternError::empty_name(pattern));
        }
        Ok(segment)
    }

    /// The parameter bound by this segment, `None` for static segments.
    pub fn param_name(&self) -> Option<&Arc<str>> {
        match self {
            Segment::Static(_) => None,
            Segment::Param(name) | Segment::OptionalParam(name) | Segment::Wildcard(name) => Some(name),
        }
    }
}

/// A compiled route path.
///
/// Immutable once built: matching only reads the segment list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
    param_names: Vec<Arc<str>>,
}

impl RoutePattern {
    /// Compiles `pattern`, failing on misplaced optional segments and colliding parameter names.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if !pattern.starts_with('/') {
            return Err(PatternError::missing_leading_slash(pattern));
        }

        let segments = split_path(pattern).map(|raw| Segment::parse(pattern, raw)).collect::<Result<Vec<_>, _>>()?;

        let mut param_names: Vec<Arc<str>> = Vec::with_capacity(segments.len());
        for (index, segment) in segments.iter().enumerate() {
            let Some(name) = segment.param_name() else {
                continue;
            };

            if param_names.contains(name) {
                return Err(PatternError::duplicate_name(pattern, name));
            }

            if matches!(segment, Segment::OptionalParam(_)) && index + 1 != segments.len() {
                return Err(PatternError::optional_not_last(pattern, name));
            }

            param_names.push(Arc::clone(name));
        }

        Ok(Self { raw: pattern.to_owned(), segments, param_names })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of every parameter this pattern can bind, in pattern order.
    pub fn param_names(&self) -> &[Arc<str>] {
        &self.param_names
    }

    /// Matches a request path, returning the bound parameters on success.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let path_segments = split_path(path).collect::<Vec<_>>();
        self.match_segments(&path_segments)
    }

    pub(crate) fn match_segments(&self, path_segments: &[&str]) -> Option<PathParams> {
        let mut matcher = Matcher::new(&self.segments, path_segments);
        if !matcher.match_from(0, 0) {
            return None;
        }

        let params = matcher
            .bindings
            .iter()
            .filter_map(|&(index, start, end)| {
                let name = self.segments[index].param_name()?;
                Some((Arc::clone(name), path_segments[start..end].join("/")))
            })
            .collect::<Vec<_>>();
        Some(PathParams::from(params))
    }
}

/// Splits a path into its segments, `/` having none.
pub(crate) fn split_path(path: &str) -> impl Iterator<Item = &str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    (!trimmed.is_empty()).then(|| trimmed.split('/')).into_iter().flatten()
}

/// Structural matcher over one pattern and one request path.
///
/// Bindings are `(segment index, start, end)` ranges into the path and only get joined once the
/// whole pattern matched. Every `(segment, path position)` pair that failed is remembered, so no
/// state is explored twice and matching stays polynomial whatever the number of wildcards.
struct Matcher<'p> {
    segments: &'p [Segment],
    path: &'p [&'p str],
    failed: Vec<bool>,
    bindings: Vec<(usize, usize, usize)>,
}

impl<'p> Matcher<'p> {
    fn new(segments: &'p [Segment], path: &'p [&'p str]) -> Self {
        Self { segments, path, failed: vec![false; (segments.len() + 1) * (path.len() + 1)], bindings: vec![] }
    }

    fn match_from(&mut self, segment: usize, position: usize) -> bool {
        let state = segment * (self.path.len() + 1) + position;
        if self.failed[state] {
            return false;
        }

        let matched = self.try_segment(segment, position);
        if !matched {
            self.failed[state] = true;
        }
        matched
    }

    fn try_segment(&mut self, segment: usize, position: usize) -> bool {
        let segments = self.segments;
        let Some(current) = segments.get(segment) else {
            return position == self.path.len();
        };
        let next = self.path.get(position).copied();

        match current {
            Segment::Static(literal) => next == Some(literal.as_str()) && self.match_from(segment + 1, position + 1),

            Segment::Param(_) => match next {
                Some(value) if !value.is_empty() => self.bind_then(segment, position, position + 1),
                _ => false,
            },

            // an empty trailing segment (`/user/` under strict routing) counts as absent
            Segment::OptionalParam(_) => match next {
                Some(value) if !value.is_empty() => self.bind_then(segment, position, position + 1),
                Some(_) => self.match_from(segment + 1, position + 1),
                None => self.match_from(segment + 1, position),
            },

            Segment::Wildcard(_) => self.match_wildcard(segment, position),
        }
    }

    /// Takes the shortest run of one or more segments that lets the rest of the pattern match.
    fn match_wildcard(&mut self, segment: usize, position: usize) -> bool {
        let remaining = self.path.len().saturating_sub(position);
        if remaining == 0 {
            return false;
        }

        // a trailing wildcard takes everything left in one step
        if segment + 1 == self.segments.len() {
            let end = self.path.len();
            return self.captures_text(position, end) && self.bind_then(segment, position, end);
        }

        // a static segment after the wildcard anchors where the run may end
        let segments = self.segments;
        let anchor = match &segments[segment + 1] {
            Segment::Static(literal) => Some(literal.as_str()),
            _ => None,
        };

        for end in position + 1..=self.path.len() {
            if anchor.is_some_and(|literal| self.path.get(end).copied() != Some(literal)) {
                continue;
            }
            if self.captures_text(position, end) && self.bind_then(segment, position, end) {
                return true;
            }
        }
        false
    }

    /// Whether `path[start..end]` joins into a non-empty value.
    fn captures_text(&self, start: usize, end: usize) -> bool {
        end - start > 1 || !self.path[start].is_empty()
    }

    fn bind_then(&mut self, segment: usize, start: usize, end: usize) -> bool {
        self.bindings.push((segment, start, end));
        if self.match_from(segment + 1, end) {
            true
        } else {
            self.bindings.pop();
            false
        }
    }
}
