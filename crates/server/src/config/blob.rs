use serde::Deserialize;

/// Configuration for image storage.
#[derive(Debug, Deserialize)]
pub struct BlobConfig {
    /// Which backend to use: `"memory"` or `"fs"`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Directory for the `fs` backend.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_path(),
        }
    }
}

fn default_backend() -> String {
    "memory".to_owned()
}

fn default_path() -> String {
    "data/photos".to_owned()
}
