use crate::dir::Entry;

/// Kind of a directory entry, as reported by listings and stat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Entry naming an inode
    File,
    /// Entry naming a directory
    Directory,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::File => "file",
            EntryType::Directory => "directory",
        }
    }
}

impl From<Entry> for EntryType {
    fn from(entry: Entry) -> Self {
        match entry {
            Entry::File(_) => EntryType::File,
            Entry::Dir(_) => EntryType::Directory,
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(EntryType::File),
            "directory" => Ok(EntryType::Directory),
            other => Err(format!("Unknown entry type: {other}")),
        }
    }
}
