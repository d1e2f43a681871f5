//! Notification templates rendered with `MiniJinja`.
//!
//! Each [`EmailTemplate`] has a subject, a plain-text body and an HTML body.
//! HTML bodies are registered with a `.html` name so user-supplied values
//! (descriptions, reasons) are auto-escaped.

use minijinja::Environment;
use serde::Serialize;

use crate::error::EmailError;

/// Fuel limit for template evaluation.
const FUEL_LIMIT: u64 = 50_000;

/// The messages the service knows how to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmailTemplate {
    /// Confirmation to the submitter that their photo was received.
    SubmissionReceived,
    /// Alert to the admin that a photo awaits review.
    AdminNewSubmission,
    /// Tells the submitter their photo is live.
    PhotoApproved,
    /// Tells the submitter their photo was not approved, with the reason.
    PhotoRejected,
    /// Alert to the admin that a deletion request awaits review.
    AdminDeletionRequest,
    /// Tells the requester their deletion request was approved.
    DeletionApproved,
    /// Tells the requester their deletion request was declined.
    DeletionRejected,
    /// Connectivity check sent from the admin API.
    Test,
}

impl EmailTemplate {
    pub const ALL: [Self; 8] = [
        Self::SubmissionReceived,
        Self::AdminNewSubmission,
        Self::PhotoApproved,
        Self::PhotoRejected,
        Self::AdminDeletionRequest,
        Self::DeletionApproved,
        Self::DeletionRejected,
        Self::Test,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::SubmissionReceived => "submission_received",
            Self::AdminNewSubmission => "admin_new_submission",
            Self::PhotoApproved => "photo_approved",
            Self::PhotoRejected => "photo_rejected",
            Self::AdminDeletionRequest => "admin_deletion_request",
            Self::DeletionApproved => "deletion_approved",
            Self::DeletionRejected => "deletion_rejected",
            Self::Test => "test",
        }
    }

    /// `(subject, text body, html body)` sources.
    fn sources(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::SubmissionReceived => (
                "Photo Submitted Successfully - {{ shop_name }}",
                SUBMISSION_RECEIVED_TXT,
                SUBMISSION_RECEIVED_HTML,
            ),
            Self::AdminNewSubmission => (
                "[Farm Photos] New Submission: {{ shop_name }}",
                ADMIN_NEW_SUBMISSION_TXT,
                ADMIN_NEW_SUBMISSION_HTML,
            ),
            Self::PhotoApproved => (
                "Photo Approved - {{ shop_name }}",
                PHOTO_APPROVED_TXT,
                PHOTO_APPROVED_HTML,
            ),
            Self::PhotoRejected => (
                "Photo Not Approved - {{ shop_name }}",
                PHOTO_REJECTED_TXT,
                PHOTO_REJECTED_HTML,
            ),
            Self::AdminDeletionRequest => (
                "[Farm Photos] Deletion Request: {{ shop_name }}",
                ADMIN_DELETION_REQUEST_TXT,
                ADMIN_DELETION_REQUEST_HTML,
            ),
            Self::DeletionApproved => (
                "Photo Removed - {{ shop_name }}",
                DELETION_APPROVED_TXT,
                DELETION_APPROVED_HTML,
            ),
            Self::DeletionRejected => (
                "Deletion Request Declined - {{ shop_name }}",
                DELETION_REJECTED_TXT,
                DELETION_REJECTED_HTML,
            ),
            Self::Test => (
                "Test Email - Farm Companion",
                TEST_TXT,
                TEST_HTML,
            ),
        }
    }
}

/// A rendered message, ready to be wrapped in an `EmailMessage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Renders [`EmailTemplate`]s. Build once and share.
#[derive(Debug)]
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    /// Compile every template.
    pub fn new() -> Result<Self, EmailError> {
        let mut env = Environment::new();
        env.set_fuel(Some(FUEL_LIMIT));
        for template in EmailTemplate::ALL {
            let (subject, text, html) = template.sources();
            let name = template.name();
            for (suffix, source) in [("subject.txt", subject), ("txt", text), ("html", html)] {
                env.add_template_owned(format!("{name}.{suffix}"), source)
                    .map_err(|e| EmailError::Template(format!("template '{name}': {e}")))?;
            }
        }
        Ok(Self { env })
    }

    /// Render `template` against `context`.
    pub fn render<S: Serialize>(
        &self,
        template: EmailTemplate,
        context: &S,
    ) -> Result<RenderedEmail, EmailError> {
        let name = template.name();
        let ctx = minijinja::Value::from_serialize(context);
        let render = |suffix: &str| {
            self.env
                .get_template(&format!("{name}.{suffix}"))
                .and_then(|t| t.render(&ctx))
                .map_err(|e| EmailError::Template(format!("rendering '{name}.{suffix}': {e}")))
        };
        Ok(RenderedEmail {
            subject: render("subject.txt")?.trim().to_owned(),
            text: render("txt")?,
            html: render("html")?,
        })
    }
}

const SUBMISSION_RECEIVED_TXT: &str = "\
Hi {{ submitter_name }},

Thank you for submitting a photo of {{ shop_name }}.

Your description: {{ description }}
Reference: {{ photo_id }}

What happens next?
Our team reviews every photo, usually within 24-48 hours. We will email you
when it has been approved or if it does not meet our guidelines.

If you change your mind you can ask for the photo to be removed at any time.

Farm Companion
";

const SUBMISSION_RECEIVED_HTML: &str = r#"<!doctype html>
<html lang="en">
<body style="font-family: sans-serif; color: #1E1F23;">
  <h1>Photo Submission Received</h1>
  <p>Hi {{ submitter_name }},</p>
  <p>Thank you for submitting a photo of <strong>{{ shop_name }}</strong>.</p>
  <h3>Submission Details</h3>
  <ul>
    <li>Description: {{ description }}</li>
    <li>Reference: {{ photo_id }}</li>
  </ul>
  <h3>What happens next?</h3>
  <p>Our team reviews every photo, usually within 24-48 hours. We will email you
  when it has been approved or if it does not meet our guidelines.</p>
  <hr>
  <p style="font-size: 12px;">If you change your mind you can ask for the photo to be removed at any time.</p>
</body>
</html>
"#;

const ADMIN_NEW_SUBMISSION_TXT: &str = "\
New photo submission for {{ shop_name }} ({{ shop_id }}).

Submitted by: {{ submitter_name }} <{{ submitter_email }}>
Description: {{ description }}
Quality score: {{ quality_score }}
Photo id: {{ photo_id }}

Review: {{ review_url }}
";

const ADMIN_NEW_SUBMISSION_HTML: &str = r#"<!doctype html>
<html lang="en">
<body style="font-family: sans-serif;">
  <h1>New Photo Submission</h1>
  <h3>Submission Details</h3>
  <ul>
    <li>Shop: {{ shop_name }} ({{ shop_id }})</li>
    <li>Submitted by: {{ submitter_name }} &lt;{{ submitter_email }}&gt;</li>
    <li>Description: {{ description }}</li>
    <li>Quality score: {{ quality_score }}</li>
    <li>Photo id: {{ photo_id }}</li>
  </ul>
  <p><a href="{{ review_url }}">Review submission</a></p>
</body>
</html>
"#;

const PHOTO_APPROVED_TXT: &str = "\
Hi {{ submitter_name }},

Good news: your photo of {{ shop_name }} has been approved and is now live.

See it here: {{ shop_url }}

Farm Companion
";

const PHOTO_APPROVED_HTML: &str = r#"<!doctype html>
<html lang="en">
<body style="font-family: sans-serif;">
  <h1>Photo Approved!</h1>
  <p>Hi {{ submitter_name }},</p>
  <p>Your photo of <strong>{{ shop_name }}</strong> has been approved and is now live.</p>
  <p><a href="{{ shop_url }}">View the shop page</a></p>
</body>
</html>
"#;

const PHOTO_REJECTED_TXT: &str = "\
Hi {{ submitter_name }},

Thank you for your photo of {{ shop_name }}. Unfortunately we were not able
to approve it.

Feedback: {{ reason }}

You are welcome to submit another photo.

Farm Companion
";

const PHOTO_REJECTED_HTML: &str = r#"<!doctype html>
<html lang="en">
<body style="font-family: sans-serif;">
  <h1>Photo Not Approved</h1>
  <p>Hi {{ submitter_name }},</p>
  <p>Thank you for your photo of <strong>{{ shop_name }}</strong>. Unfortunately we were not able to approve it.</p>
  <h3>Feedback</h3>
  <p>{{ reason }}</p>
  <p>You are welcome to submit another photo.</p>
</body>
</html>
"#;

const ADMIN_DELETION_REQUEST_TXT: &str = "\
A deletion request was opened for a photo of {{ shop_name }}.

Photo id: {{ photo_id }}
Requested by: {{ requester_name }} <{{ requester_email }}> ({{ requester_role }})
Reason: {{ reason }}

Review: {{ review_url }}
";

const ADMIN_DELETION_REQUEST_HTML: &str = r#"<!doctype html>
<html lang="en">
<body style="font-family: sans-serif;">
  <h1>Photo Deletion Request</h1>
  <ul>
    <li>Shop: {{ shop_name }}</li>
    <li>Photo id: {{ photo_id }}</li>
    <li>Requested by: {{ requester_name }} &lt;{{ requester_email }}&gt; ({{ requester_role }})</li>
    <li>Reason: {{ reason }}</li>
  </ul>
  <p><a href="{{ review_url }}">Review request</a></p>
</body>
</html>
"#;

const DELETION_APPROVED_TXT: &str = "\
Hi {{ requester_name }},

Your request to remove a photo of {{ shop_name }} has been approved and the
photo is no longer visible.

It can still be restored until {{ recover_until }} if this was a mistake.

Farm Companion
";

const DELETION_APPROVED_HTML: &str = r#"<!doctype html>
<html lang="en">
<body style="font-family: sans-serif;">
  <h1>Photo Removed</h1>
  <p>Hi {{ requester_name }},</p>
  <p>Your request to remove a photo of <strong>{{ shop_name }}</strong> has been approved and the photo is no longer visible.</p>
  <p>It can still be restored until {{ recover_until }} if this was a mistake.</p>
</body>
</html>
"#;

const DELETION_REJECTED_TXT: &str = "\
Hi {{ requester_name }},

We reviewed your request to remove a photo of {{ shop_name }} and decided to
keep it.
{% if reason %}
Reason: {{ reason }}
{% endif %}
Farm Companion
";

const DELETION_REJECTED_HTML: &str = r#"<!doctype html>
<html lang="en">
<body style="font-family: sans-serif;">
  <h1>Deletion Request Declined</h1>
  <p>Hi {{ requester_name }},</p>
  <p>We reviewed your request to remove a photo of <strong>{{ shop_name }}</strong> and decided to keep it.</p>
  {% if reason %}<p>Reason: {{ reason }}</p>{% endif %}
</body>
</html>
"#;

const TEST_TXT: &str = "This is a test email from Farm Companion ({{ site_url }}).\n";

const TEST_HTML: &str = "<p>This is a test email from Farm Companion</p>\n";

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn all_templates_compile() {
        assert!(TemplateRenderer::new().is_ok());
    }

    #[test]
    fn renders_subject_and_bodies() {
        let renderer = TemplateRenderer::new().unwrap();
        let rendered = renderer
            .render(
                EmailTemplate::PhotoRejected,
                &json!({
                    "submitter_name": "Ann",
                    "shop_name": "Hill Farm",
                    "reason": "Too blurry",
                }),
            )
            .unwrap();
        assert_eq!(rendered.subject, "Photo Not Approved - Hill Farm");
        assert!(rendered.text.contains("Feedback: Too blurry"));
        assert!(rendered.html.contains("<p>Too blurry</p>"));
    }

    #[test]
    fn html_escapes_user_content() {
        let renderer = TemplateRenderer::new().unwrap();
        let rendered = renderer
            .render(
                EmailTemplate::SubmissionReceived,
                &json!({
                    "submitter_name": "Ann",
                    "shop_name": "Hill Farm",
                    "description": "<script>alert(1)</script>",
                    "photo_id": "photo_1",
                }),
            )
            .unwrap();
        assert!(!rendered.html.contains("<script>"));
        assert!(rendered.html.contains("&lt;script&gt;"));
        // Plain text is left as-is.
        assert!(rendered.text.contains("<script>"));
    }

    #[test]
    fn optional_reason_is_omitted() {
        let renderer = TemplateRenderer::new().unwrap();
        let rendered = renderer
            .render(
                EmailTemplate::DeletionRejected,
                &json!({ "requester_name": "Bob", "shop_name": "Hill Farm", "reason": null }),
            )
            .unwrap();
        assert!(!rendered.text.contains("Reason:"));
    }

    #[test]
    fn admin_subjects_are_tagged() {
        let renderer = TemplateRenderer::new().unwrap();
        let rendered = renderer
            .render(
                EmailTemplate::AdminNewSubmission,
                &json!({ "shop_name": "Hill Farm" }),
            )
            .unwrap();
        assert_eq!(rendered.subject, "[Farm Photos] New Submission: Hill Farm");
    }
}
