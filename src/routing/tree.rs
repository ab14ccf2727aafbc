// routing/tree.rs - Handler tree discovery
//
// The tree is built once at startup, either by walking a directory of
// handler files or from registry identifiers, then handed to the table
// builder and dropped.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use super::registry::HandlerRegistry;
use crate::error::BuildError;

/// File stems never treated as handler modules.
const IGNORED_STEMS: &[&str] = &["mod", "lib", "main"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeKind {
    Module,
    Directory,
}

/// One entry of the handler tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteNode {
    /// Raw name, possibly bracket-wrapped (`[id]`)
    pub name: String,
    pub kind: NodeKind,
    /// Registry identifier for modules (`api/users/[id]`); the relative
    /// directory path for directories
    pub identifier: String,
    pub children: Vec<RouteNode>,
}

impl RouteNode {
    fn directory(name: &str, identifier: String) -> Self {
        Self {
            name: name.to_string(),
            kind: NodeKind::Directory,
            identifier,
            children: Vec::new(),
        }
    }

    fn module(name: &str, identifier: String) -> Self {
        Self {
            name: name.to_string(),
            kind: NodeKind::Module,
            identifier,
            children: Vec::new(),
        }
    }

    /// Walk `root`, treating every `*.{extension}` file as a handler module.
    /// Hidden entries, symlinks and `mod`/`lib`/`main` files are skipped.
    pub fn scan(root: &Path, extension: &str) -> Result<Self, BuildError> {
        let mut node = RouteNode::directory("", String::new());
        scan_dir(root, extension, &mut node)?;
        node.sort();
        Ok(node)
    }

    /// Synthesize the tree from identifiers alone, for deployments that do
    /// not ship the handler source tree.
    pub fn from_identifiers<I, S>(identifiers: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut root = RouteNode::directory("", String::new());
        for identifier in identifiers {
            let identifier = identifier.as_ref().trim_matches('/');
            let parts: Vec<&str> = identifier.split('/').collect();
            if parts.iter().any(|p| p.is_empty()) {
                return Err(BuildError::config(format!(
                    "handler module identifier '{}' has an empty component",
                    identifier
                )));
            }
            root.insert(&parts, identifier);
        }
        root.sort();
        Ok(root)
    }

    pub fn from_registry(registry: &HandlerRegistry) -> Result<Self, BuildError> {
        Self::from_identifiers(registry.identifiers())
    }

    fn insert(&mut self, parts: &[&str], identifier: &str) {
        match parts {
            [] => {}
            [leaf] => {
                if !self
                    .children
                    .iter()
                    .any(|c| c.kind == NodeKind::Module && c.name == *leaf)
                {
                    self.children.push(RouteNode::module(leaf, identifier.to_string()));
                }
            }
            [dir, rest @ ..] => {
                let position = self
                    .children
                    .iter()
                    .position(|c| c.kind == NodeKind::Directory && c.name == *dir);
                let index = match position {
                    Some(index) => index,
                    None => {
                        let path = join(&self.identifier, dir);
                        self.children.push(RouteNode::directory(dir, path));
                        self.children.len() - 1
                    }
                };
                self.children[index].insert(rest, identifier);
            }
        }
    }

    /// Fixed visiting order: `index`, then literal names, then bracketed
    /// names, each group lexicographic. Static paths therefore precede
    /// dynamic siblings in the dispatch table.
    fn sort(&mut self) {
        self.children.sort_by(compare_nodes);
        for child in &mut self.children {
            child.sort();
        }
    }

    /// Module identifiers in visiting order.
    pub fn module_identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_modules(&mut out);
        out
    }

    fn collect_modules<'a>(&'a self, out: &mut Vec<&'a str>) {
        for child in &self.children {
            match child.kind {
                NodeKind::Module => out.push(child.identifier.as_str()),
                NodeKind::Directory => child.collect_modules(out),
            }
        }
    }
}

fn rank(name: &str) -> u8 {
    if name == "index" {
        0
    } else if name.starts_with('[') {
        2
    } else {
        1
    }
}

fn compare_nodes(a: &RouteNode, b: &RouteNode) -> Ordering {
    rank(&a.name)
        .cmp(&rank(&b.name))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.kind.cmp(&b.kind))
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

fn scan_dir(dir: &Path, extension: &str, node: &mut RouteNode) -> Result<(), BuildError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        BuildError::config(format!("cannot read handler directory {}: {}", dir.display(), e))
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| {
            BuildError::config(format!("cannot read entry in {}: {}", dir.display(), e))
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| {
            BuildError::config(format!("cannot stat {}: {}", path.display(), e))
        })?;

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            return Err(BuildError::config(format!(
                "handler path {} is not valid UTF-8",
                path.display()
            )));
        };
        if name.starts_with('.') {
            continue;
        }

        if file_type.is_dir() {
            let mut child = RouteNode::directory(name, join(&node.identifier, name));
            scan_dir(&path, extension, &mut child)?;
            node.children.push(child);
        } else if file_type.is_file() {
            let matches_extension = path.extension().and_then(|e| e.to_str()) == Some(extension);
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !matches_extension || IGNORED_STEMS.contains(&stem) {
                continue;
            }
            node.children
                .push(RouteNode::module(stem, join(&node.identifier, stem)));
        } else {
            tracing::debug!("skipping non-regular handler entry {}", path.display());
        }
    }

    Ok(())
}
