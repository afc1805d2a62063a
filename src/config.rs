//! Configuration for extract-and-invoke runs.
//!
//! Every field has a default, so an empty JSON object is a complete
//! configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::io::IOLimits;
use crate::resource::ResourceId;

/// What to extract, where to write it, and what to call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Resource holding the module bytes.
    pub resource: ResourceId,
    /// File the bytes are written to and then loaded from.
    pub output: PathBuf,
    /// Export called after loading.
    pub entry_symbol: String,
    /// How an existing output file is treated.
    pub write_mode: WriteMode,
    /// Which image the resource is read from.
    pub image: ImageConfig,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            resource: ResourceId::Id(101),
            output: PathBuf::from("TestMyDll.dll"),
            entry_symbol: "DllHello".to_string(),
            write_mode: WriteMode::default(),
            image: ImageConfig::default(),
        }
    }
}

impl ExtractConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Treatment of an output file that already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Add the payload after any existing content.
    #[default]
    Append,
    /// Truncate the file first.
    Overwrite,
}

/// Source image selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Read resources from this file instead of the running process.
    pub path: Option<PathBuf>,
    /// Largest image file that will be mapped.
    pub max_image_size: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_image_size: IOLimits::default().max_file_size,
        }
    }
}

impl ImageConfig {
    pub fn limits(&self) -> IOLimits {
        IOLimits {
            max_file_size: self.max_image_size,
        }
    }
}
