//! Input validation for submissions and deletion requests.
//!
//! Validators collect every violated rule instead of stopping at the first,
//! so a client can fix a form in one round trip.

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use regex::Regex;

use crate::config::ModerationConfig;
use crate::error::ModerationError;
use crate::service::{DeletionRequestInput, SubmissionInput};

/// `local@domain.tld` with no whitespace and exactly one `@`.
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid"));

/// An image extracted from a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub content_type: String,
    pub data: Bytes,
}

impl DecodedImage {
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Whether `email` looks like a deliverable address.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Decode `data:image/<type>;base64,<payload>`.
///
/// Returns the lower-cased MIME type and the decoded bytes. The content type
/// is not checked against any allow-list here.
pub fn decode_data_url(url: &str) -> Result<DecodedImage, String> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| "Photo must be an embedded image data URL".to_owned())?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| "Photo data URL has no payload".to_owned())?;
    let content_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| "Photo data must be base64 encoded".to_owned())?
        .to_ascii_lowercase();
    if !content_type.starts_with("image/") {
        return Err("Please select a valid image file".to_owned());
    }
    let data = STANDARD
        .decode(payload.trim())
        .map_err(|_| "Photo data is not valid base64".to_owned())?;
    if data.is_empty() {
        return Err("Photo data is empty".to_owned());
    }
    Ok(DecodedImage {
        content_type,
        data: Bytes::from(data),
    })
}

/// Check a submission against every rule and decode its image.
pub(crate) fn validate_submission(
    input: &SubmissionInput,
    config: &ModerationConfig,
) -> Result<DecodedImage, ModerationError> {
    let mut errors = Vec::new();

    if input.shop_id.trim().is_empty() {
        errors.push("Farm shop id is required".to_owned());
    }
    if input.shop_name.trim().is_empty() {
        errors.push("Farm shop name is required".to_owned());
    }
    if input.submitter_name.trim().is_empty() {
        errors.push("Your name is required".to_owned());
    }
    check_email(&input.submitter_email, &mut errors);

    let description = input.description.trim();
    if description.is_empty() {
        errors.push("Photo description is required".to_owned());
    } else if description.chars().count() > config.max_description_length {
        errors.push(format!(
            "Description must be at most {} characters",
            config.max_description_length
        ));
    }

    let image = if input.photo_data.trim().is_empty() {
        errors.push("Please select a photo to upload".to_owned());
        None
    } else {
        match decode_data_url(input.photo_data.trim()) {
            Ok(image) => {
                if !config.accepts(&image.content_type) {
                    errors.push(format!(
                        "Unsupported image type {}; use JPEG, PNG or WebP",
                        image.content_type
                    ));
                }
                if image.size() > config.max_image_bytes {
                    errors.push(format!(
                        "Photo must be smaller than {}MB",
                        config.max_image_bytes / (1024 * 1024)
                    ));
                }
                Some(image)
            }
            Err(message) => {
                errors.push(message);
                None
            }
        }
    };

    match image {
        Some(image) if errors.is_empty() => Ok(image),
        _ => Err(ModerationError::ValidationFailed(errors)),
    }
}

/// Check the requester details and reason of a deletion request.
pub(crate) fn validate_deletion_request(
    input: &DeletionRequestInput,
    config: &ModerationConfig,
) -> Result<(), ModerationError> {
    let mut errors = Vec::new();

    if input.requester_name.trim().is_empty() {
        errors.push("Your name is required".to_owned());
    }
    check_email(&input.requester_email, &mut errors);

    let reason = input.reason.trim();
    if reason.is_empty() {
        errors.push("Please provide a reason for deletion".to_owned());
    } else if reason.chars().count() < config.min_deletion_reason_length {
        errors.push(format!(
            "Please provide a more detailed reason (at least {} characters)",
            config.min_deletion_reason_length
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ModerationError::ValidationFailed(errors))
    }
}

fn check_email(email: &str, errors: &mut Vec<String>) {
    let email = email.trim();
    if email.is_empty() {
        errors.push("Email address is required".to_owned());
    } else if !is_valid_email(email) {
        errors.push("Please enter a valid email address".to_owned());
    }
}
