use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! newtype_string {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        #[cfg_attr(feature = "openapi", schema(value_type = String))]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Return the inner string as a str slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(PhotoId, "Identifies a single photo submission.");
newtype_string!(ShopId, "Identifies the farm shop a photo belongs to (the shop slug).");
newtype_string!(DeletionRequestId, "Identifies a deletion request.");

/// Prefix carried by every generated photo id.
pub const PHOTO_ID_PREFIX: &str = "photo_";

/// Prefix carried by every generated deletion request id.
pub const DELETION_REQUEST_ID_PREFIX: &str = "delreq_";

impl PhotoId {
    /// Generate a fresh, time-ordered photo id.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!(
            "{PHOTO_ID_PREFIX}{}",
            uuid::Uuid::now_v7().simple()
        ))
    }

    /// Whether the id has the shape of a generated photo id.
    ///
    /// Used to reject obviously bogus ids at the edge before touching storage.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.0.len() > PHOTO_ID_PREFIX.len()
            && self.0.starts_with(PHOTO_ID_PREFIX)
            && self.0[PHOTO_ID_PREFIX.len()..]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }

    /// Blob id of the stored thumbnail for this photo.
    #[must_use]
    pub fn thumbnail_blob_id(&self) -> String {
        format!("{}_thumb", self.0)
    }
}

impl DeletionRequestId {
    /// Generate a fresh, time-ordered deletion request id.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!(
            "{DELETION_REQUEST_ID_PREFIX}{}",
            uuid::Uuid::now_v7().simple()
        ))
    }
}
