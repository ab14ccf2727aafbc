use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BuildError;
use crate::routing::split_request_path;

/// One path specifier from the access configuration.
///
/// `=/path` and the bare root `/` are exact; any other `/path` is a
/// segment-aware prefix (`/api` covers `/api` and `/api/x`, never `/apix`).
/// A trailing `/*` is accepted and means the same prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRule {
    Exact(String),
    Prefix(String),
}

impl PathRule {
    pub fn parse(spec: &str) -> Result<Self, BuildError> {
        let spec = spec.trim();
        let (exact, path) = match spec.strip_prefix('=') {
            Some(rest) => (true, rest),
            None => (false, spec),
        };

        if !path.starts_with('/') {
            return Err(BuildError::config(format!(
                "access path '{}' must start with '/'",
                spec
            )));
        }

        if exact || path == "/" {
            return Ok(PathRule::Exact(normalize(path).to_string()));
        }

        let prefix = path.strip_suffix("/*").unwrap_or(path);
        Ok(PathRule::Prefix(prefix.trim_end_matches('/').to_string()))
    }

    pub fn matches(&self, path: &str) -> bool {
        split_request_path(path).map_or(false, |segments| self.matches_segments(&segments))
    }

    /// Match decoded request segments, as produced for the route matcher.
    pub fn matches_segments(&self, request: &[String]) -> bool {
        let rule: Vec<&str> = self.path().split('/').filter(|s| !s.is_empty()).collect();
        let covered = |len: usize| request[..len].iter().zip(&rule).all(|(a, b)| a == b);
        match self {
            PathRule::Exact(_) => request.len() == rule.len() && covered(rule.len()),
            // an empty prefix came from "/*" and covers everything
            PathRule::Prefix(_) => request.len() >= rule.len() && covered(rule.len()),
        }
    }

    fn path(&self) -> &str {
        match self {
            PathRule::Exact(path) | PathRule::Prefix(path) => path,
        }
    }
}

impl fmt::Display for PathRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathRule::Exact(path) => write!(f, "={}", path),
            PathRule::Prefix(prefix) => write!(f, "{}/*", prefix),
        }
    }
}

/// Single trailing slash is insignificant, except on the root itself.
fn normalize(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// What happens to paths matched by neither list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultAccess {
    Open,
    Protected,
}

impl FromStr for DefaultAccess {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(DefaultAccess::Open),
            "protected" => Ok(DefaultAccess::Protected),
            other => Err(BuildError::config(format!(
                "default access must be 'open' or 'protected', got '{}'",
                other
            ))),
        }
    }
}

/// Per-request classification by the authorization gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessClass {
    Excluded,
    Protected,
    Default,
}

/// Protected/excluded path sets plus the explicit default. Read-only after
/// startup.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    protected: Vec<PathRule>,
    excluded: Vec<PathRule>,
    default_access: DefaultAccess,
}

impl AccessPolicy {
    pub fn new(protected: Vec<PathRule>, excluded: Vec<PathRule>, default_access: DefaultAccess) -> Self {
        Self {
            protected,
            excluded,
            default_access,
        }
    }

    /// Build from raw specifiers. The default must be chosen explicitly;
    /// `None` is a configuration error rather than an implicit "open".
    pub fn from_specs<P, E>(
        protected: P,
        excluded: E,
        default_access: Option<DefaultAccess>,
    ) -> Result<Self, BuildError>
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let default_access = default_access.ok_or_else(|| {
            BuildError::config("default access for unlisted paths must be set to 'open' or 'protected'")
        })?;
        let protected = protected
            .into_iter()
            .map(|spec| PathRule::parse(spec.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let excluded = excluded
            .into_iter()
            .map(|spec| PathRule::parse(spec.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(protected, excluded, default_access))
    }

    /// Exclusion always wins over protection. Rules see the same decoded
    /// segments as the route matcher, so `/api/%73ecret` is `/api/secret`
    /// here too. A path that does not decode is never excluded.
    pub fn classify(&self, path: &str) -> AccessClass {
        match split_request_path(path) {
            Some(segments) => self.classify_segments(&segments),
            None => AccessClass::Protected,
        }
    }

    pub fn classify_segments(&self, segments: &[String]) -> AccessClass {
        if self.excluded.iter().any(|rule| rule.matches_segments(segments)) {
            AccessClass::Excluded
        } else if self.protected.iter().any(|rule| rule.matches_segments(segments)) {
            AccessClass::Protected
        } else {
            AccessClass::Default
        }
    }

    /// Whether a request to `path` must carry a valid access token.
    pub fn requires_token(&self, path: &str) -> bool {
        self.requires_token_for(self.classify(path))
    }

    pub fn requires_token_for(&self, class: AccessClass) -> bool {
        match class {
            AccessClass::Excluded => false,
            AccessClass::Protected => true,
            AccessClass::Default => self.default_access == DefaultAccess::Protected,
        }
    }

    pub fn default_access(&self) -> DefaultAccess {
        self.default_access
    }

    pub fn protected(&self) -> &[PathRule] {
        &self.protected
    }

    pub fn excluded(&self) -> &[PathRule] {
        &self.excluded
    }
}
