use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::DatasetError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    Tar,
    Zip,
    Auto,
}

impl ArchiveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Auto => "auto",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArchiveFormat {
    type Err = DatasetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "tar" => Ok(ArchiveFormat::Tar),
            "zip" => Ok(ArchiveFormat::Zip),
            "auto" => Ok(ArchiveFormat::Auto),
            _ => Err(DatasetError::InvalidArchiveFormat(value.to_string())),
        }
    }
}

/// Logical name of a cached resource. Used verbatim as a file name inside
/// the cache directory, so it must be a single non-empty path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceName(String);

impl ResourceName {
    pub(crate) fn from_static(name: &'static str) -> Self {
        debug_assert!(name.parse::<ResourceName>().is_ok());
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceName {
    type Err = DatasetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let is_valid = !value.is_empty()
            && value != "."
            && value != ".."
            && !value.contains(['/', '\\', '\0']);
        if !is_valid {
            return Err(DatasetError::InvalidResourceName(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }
}

impl TryFrom<String> for ResourceName {
    type Error = DatasetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceName> for String {
    fn from(value: ResourceName) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_archive_format() {
        assert_eq!("zip".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::Zip);
        assert_eq!(" TAR ".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::Tar);
        assert_eq!("auto".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::Auto);
        assert!("rar".parse::<ArchiveFormat>().is_err());
    }

    #[test]
    fn resource_name_is_single_component() {
        assert!("BlogCatalog-dataset".parse::<ResourceName>().is_ok());
        assert!("".parse::<ResourceName>().is_err());
        assert!("..".parse::<ResourceName>().is_err());
        assert!("a/b".parse::<ResourceName>().is_err());
    }
}
