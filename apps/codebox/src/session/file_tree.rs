//! In-memory mirror of the remote storage tree.
//!
//! Every node carries its own `/`-joined path, computed once on ingestion or
//! insertion. The root is implicit and has no path.

use std::collections::BTreeSet;

use codebox_proto::{ListingEntry, NodeKind};

use super::error::ValidationError;

pub const PATH_SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileNode {
    File {
        name: String,
        extension: String,
        path: String,
    },
    Folder {
        name: String,
        path: String,
        children: Vec<FileNode>,
    },
}

impl FileNode {
    pub fn file(name: impl Into<String>, parent: Option<&str>) -> Self {
        let name = name.into();
        FileNode::File {
            extension: extension_of(&name).unwrap_or_default().to_string(),
            path: join_path(parent, &name),
            name,
        }
    }

    pub fn folder(name: impl Into<String>, parent: Option<&str>) -> Self {
        let name = name.into();
        FileNode::Folder {
            path: join_path(parent, &name),
            name,
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FileNode::File { name, .. } | FileNode::Folder { name, .. } => name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            FileNode::File { path, .. } | FileNode::Folder { path, .. } => path,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            FileNode::File { .. } => NodeKind::File,
            FileNode::Folder { .. } => NodeKind::Folder,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, FileNode::Folder { .. })
    }

    pub fn children(&self) -> &[FileNode] {
        match self {
            FileNode::Folder { children, .. } => children,
            FileNode::File { .. } => &[],
        }
    }

    fn from_entry(entry: ListingEntry, parent: Option<&str>) -> Self {
        match entry {
            ListingEntry::File { name, extension } => {
                let extension = extension
                    .filter(|ext| !ext.is_empty())
                    .or_else(|| extension_of(&name).map(str::to_string))
                    .unwrap_or_default();
                FileNode::File {
                    path: join_path(parent, &name),
                    name,
                    extension,
                }
            }
            ListingEntry::Folder { name, children } => {
                let path = join_path(parent, &name);
                let children = children
                    .into_iter()
                    .map(|child| FileNode::from_entry(child, Some(&path)))
                    .collect();
                FileNode::Folder {
                    name,
                    path,
                    children,
                }
            }
        }
    }
}

/// Text after the last `.`, if any and non-empty.
pub fn extension_of(name: &str) -> Option<&str> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

pub fn join_path(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) if !parent.is_empty() => format!("{parent}{PATH_SEPARATOR}{name}"),
        _ => name.to_string(),
    }
}

/// Checks a proposed name before anything is sent.
pub fn validate_new_name(kind: NodeKind, name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.contains(PATH_SEPARATOR) {
        return Err(ValidationError::NameContainsSeparator(name.to_string()));
    }
    if kind == NodeKind::File && extension_of(name).is_none() {
        return Err(ValidationError::MissingExtension(name.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTree {
    roots: Vec<FileNode>,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_listing(listing: Vec<ListingEntry>) -> Self {
        Self {
            roots: listing
                .into_iter()
                .map(|entry| FileNode::from_entry(entry, None))
                .collect(),
        }
    }

    pub fn roots(&self) -> &[FileNode] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Copy handed to the renderer.
    pub fn snapshot(&self) -> Vec<FileNode> {
        self.roots.clone()
    }

    pub fn find_by_path(&self, path: &str) -> Option<&FileNode> {
        let mut segments = path.split(PATH_SEPARATOR);
        let first = segments.next()?;
        let mut node = self.roots.iter().find(|n| n.name() == first)?;
        for segment in segments {
            node = node.children().iter().find(|n| n.name() == segment)?;
        }
        Some(node)
    }

    fn folder_children_mut(&mut self, path: &str) -> Option<&mut Vec<FileNode>> {
        let mut children = &mut self.roots;
        for segment in path.split(PATH_SEPARATOR) {
            let current = children;
            let node = current.iter_mut().find(|n| n.name() == segment)?;
            match node {
                FileNode::Folder { children: inner, .. } => children = inner,
                FileNode::File { .. } => return None,
            }
        }
        Some(children)
    }

    /// Resolves the folder a new node would land in: the selected folder if
    /// it exists, the root otherwise.
    pub fn resolve_parent(&self, selected: Option<&str>) -> Option<String> {
        let selected = selected.filter(|p| !p.is_empty())?;
        match self.find_by_path(selected) {
            Some(node) if node.is_folder() => Some(selected.to_string()),
            _ => None,
        }
    }

    /// Names directly under the folder at `parent` (root when `None`).
    pub fn list_sibling_names(&self, parent: Option<&str>) -> BTreeSet<String> {
        let children: &[FileNode] = match parent.filter(|p| !p.is_empty()) {
            None => &self.roots,
            Some(path) => match self.find_by_path(path) {
                Some(node) => node.children(),
                None => &[],
            },
        };
        children.iter().map(|n| n.name().to_string()).collect()
    }

    /// Appends a new node under the selected folder, falling back to the root
    /// when the folder is unknown. Returns the path of the inserted node.
    pub fn insert_under_selected(
        &mut self,
        selected: Option<&str>,
        kind: NodeKind,
        name: &str,
    ) -> String {
        let parent = self.resolve_parent(selected);
        let node = match kind {
            NodeKind::File => FileNode::file(name, parent.as_deref()),
            NodeKind::Folder => FileNode::folder(name, parent.as_deref()),
        };
        let path = node.path().to_string();
        let target = match parent.as_deref() {
            Some(parent) => self.folder_children_mut(parent),
            None => None,
        };
        match target {
            Some(children) => children.push(node),
            None => self.roots.push(node),
        }
        path
    }

    pub fn remove_by_path(&mut self, path: &str) -> bool {
        let (parent, name) = match path.rsplit_once(PATH_SEPARATOR) {
            Some((parent, name)) => (Some(parent), name),
            None => (None, path),
        };
        let children = match parent {
            Some(parent) => match self.folder_children_mut(parent) {
                Some(children) => children,
                None => return false,
            },
            None => &mut self.roots,
        };
        match children.iter().position(|n| n.name() == name) {
            Some(index) => {
                children.remove(index);
                true
            }
            None => false,
        }
    }
}
