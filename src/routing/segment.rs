// routing/segment.rs - Path segments derived from handler-tree names
//
// `index`  → no segment (the enclosing directory's own path)
// `[id]`   → dynamic segment bound as `id`
// anything else → literal segment

use percent_encoding::percent_decode_str;
use std::fmt;

use crate::error::BuildError;

/// One element of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Literal(String),
    Param(String),
}

impl PathSegment {
    /// Derive the segment contributed by a raw tree name.
    ///
    /// Returns `Ok(None)` for `index`. Names that use brackets anywhere other
    /// than as a full wrapper (`a[b]`, `[a][b]`, `[]`) are rejected.
    pub fn from_name(name: &str) -> Result<Option<Self>, BuildError> {
        if name == "index" {
            return Ok(None);
        }
        if name.is_empty() {
            return Err(BuildError::config("empty path segment name"));
        }

        if let Some(inner) = name.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            if inner.is_empty() || !is_param_name(inner) {
                return Err(BuildError::config(format!(
                    "invalid parameter segment '{}': expected [name] with alphanumeric or '_' characters",
                    name
                )));
            }
            return Ok(Some(PathSegment::Param(inner.to_string())));
        }

        if name.chars().any(|c| matches!(c, '[' | ']' | '{' | '}' | '/')) {
            return Err(BuildError::config(format!(
                "invalid literal segment '{}': brackets, braces and '/' are reserved",
                name
            )));
        }

        Ok(Some(PathSegment::Literal(name.to_string())))
    }

    pub fn is_param(&self) -> bool {
        matches!(self, PathSegment::Param(_))
    }

    /// Two segments have the same shape when they match the same requests.
    fn same_shape(&self, other: &PathSegment) -> bool {
        match (self, other) {
            (PathSegment::Literal(a), PathSegment::Literal(b)) => a == b,
            (PathSegment::Param(_), PathSegment::Param(_)) => true,
            _ => false,
        }
    }
}

fn is_param_name(name: &str) -> bool {
    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Literal(value) => write!(f, "{}", value),
            PathSegment::Param(name) => write!(f, "{{{}}}", name),
        }
    }
}

/// Ordered sequence of segments; the empty pattern is the root `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PathPattern {
    segments: Vec<PathSegment>,
}

impl PathPattern {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse the rendered form (`/api/users/{id}`).
    pub fn parse(pattern: &str) -> Result<Self, BuildError> {
        let trimmed = pattern.trim_matches('/');
        let mut parsed = PathPattern::root();
        if trimmed.is_empty() {
            return Ok(parsed);
        }
        for raw in trimmed.split('/') {
            let segment = match raw.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
                Some(name) => PathSegment::from_name(&format!("[{}]", name))?,
                None => PathSegment::from_name(raw)?,
            };
            // `index` never shows up in a rendered pattern, treat it as a literal
            let segment = segment.unwrap_or_else(|| PathSegment::Literal(raw.to_string()));
            parsed = parsed.child(segment)?;
        }
        Ok(parsed)
    }

    /// Extend the pattern by one segment. A parameter name may only appear
    /// once per pattern.
    pub fn child(&self, segment: PathSegment) -> Result<Self, BuildError> {
        if let PathSegment::Param(name) = &segment {
            if self.param_names().any(|existing| existing == name) {
                return Err(BuildError::config(format!(
                    "parameter '{}' appears twice in '{}/{}'",
                    name,
                    self.to_string().trim_end_matches('/'),
                    segment
                )));
            }
        }
        let mut segments = self.segments.clone();
        segments.push(segment);
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            PathSegment::Param(name) => Some(name.as_str()),
            PathSegment::Literal(_) => None,
        })
    }

    /// Rendering with parameter names erased, used as the collision key.
    pub fn shape_key(&self) -> String {
        let mut key = String::new();
        for segment in &self.segments {
            key.push('/');
            match segment {
                PathSegment::Literal(value) => key.push_str(value),
                PathSegment::Param(_) => key.push_str("{}"),
            }
        }
        if key.is_empty() {
            key.push('/');
        }
        key
    }

    pub fn same_shape(&self, other: &PathPattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a.same_shape(b))
    }

    /// Match already-split, decoded request segments. Every pattern segment
    /// must consume exactly one request segment; prefixes never match.
    pub fn match_segments(&self, request: &[String]) -> Option<PathParams> {
        if request.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::default();
        for (segment, value) in self.segments.iter().zip(request) {
            match segment {
                PathSegment::Literal(literal) if literal == value => {}
                PathSegment::Param(name) if !value.is_empty() => {
                    params.push(name.clone(), value.clone());
                }
                _ => return None,
            }
        }
        Some(params)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

/// Path parameters bound by a match, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    values: Vec<(String, String)>,
}

impl PathParams {
    fn push(&mut self, name: String, value: String) {
        self.values.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Split and percent-decode a request path. The matcher and the
/// authorization gate both see requests through this.
///
/// A single trailing slash is ignored; inner empty segments survive and can
/// never match. An encoded `%2F` stays inside its segment. `None` when a
/// segment does not decode to UTF-8.
pub fn split_request_path(path: &str) -> Option<Vec<String>> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = path.strip_suffix('/').unwrap_or(path);
    if path.is_empty() {
        return Some(Vec::new());
    }
    path.split('/')
        .map(|raw| {
            percent_decode_str(raw)
                .decode_utf8()
                .ok()
                .map(|decoded| decoded.into_owned())
        })
        .collect()
}
