use serde::{Deserialize, Serialize};

/// Kind of a storage node, as named in `CREA` payloads and listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Folder => "folder",
        }
    }
}

/// One entry of the storage listing returned on login.
///
/// Listings carry no paths; a path is the chain of folder names leading to
/// the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ListingEntry {
    File {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extension: Option<String>,
    },
    Folder {
        name: String,
        #[serde(default)]
        children: Vec<ListingEntry>,
    },
}

impl ListingEntry {
    pub fn name(&self) -> &str {
        match self {
            ListingEntry::File { name, .. } | ListingEntry::Folder { name, .. } => name,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            ListingEntry::File { .. } => NodeKind::File,
            ListingEntry::Folder { .. } => NodeKind::Folder,
        }
    }

    pub fn parse_listing(json: &str) -> Result<Vec<ListingEntry>, serde_json::Error> {
        serde_json::from_str(json)
    }
}
