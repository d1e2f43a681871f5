//! Email notifications driven by photo events.
//!
//! The dispatcher never influences the outcome of a transition: a message
//! that still fails after its retries is logged, counted and dropped.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{Semaphore, broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use farmgate_core::PhotoEvent;
use farmgate_email::{
    EmailBackend, EmailConfig, EmailError, EmailMessage, EmailResult, EmailTemplate,
    TemplateRenderer,
};

use crate::metrics::ModerationMetrics;

/// Delivery policy for notification emails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Whether events produce emails at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Retries after the first failed attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry; doubles on each further retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound on any single retry delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Events whose messages may be in delivery at the same time.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl NotificationConfig {
    /// Delay before retry number `attempt` (zero-based).
    #[must_use]
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(
            self.base_delay_ms
                .saturating_mul(factor)
                .min(self.max_delay_ms),
        )
    }
}

fn default_enabled() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_max_in_flight() -> usize {
    16
}

/// A message the dispatcher intends to send.
#[derive(Debug, Clone)]
pub(crate) struct Outgoing {
    pub template: EmailTemplate,
    pub to: String,
    pub context: serde_json::Value,
}

/// Turns [`PhotoEvent`]s into emails.
#[derive(Debug)]
pub struct NotificationDispatcher {
    backend: Arc<dyn EmailBackend>,
    renderer: TemplateRenderer,
    email: EmailConfig,
    config: NotificationConfig,
    metrics: Arc<ModerationMetrics>,
}

impl NotificationDispatcher {
    pub fn new(
        backend: Arc<dyn EmailBackend>,
        email: EmailConfig,
        config: NotificationConfig,
        metrics: Arc<ModerationMetrics>,
    ) -> Result<Self, EmailError> {
        Ok(Self {
            backend,
            renderer: TemplateRenderer::new()?,
            email,
            config,
            metrics,
        })
    }

    /// Run until shutdown is signalled or the event bus closes.
    ///
    /// Each event is delivered in its own task, at most `max_in_flight` at a
    /// time, so one recipient's retries do not hold up the rest. Deliveries
    /// still in progress are awaited before returning.
    ///
    /// Takes an `Arc` so the same dispatcher can serve test sends while it
    /// consumes events.
    pub async fn run(
        self: Arc<Self>,
        mut events: broadcast::Receiver<PhotoEvent>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let max_in_flight = self.config.max_in_flight.max(1);
        info!(
            backend = self.backend.backend_name(),
            max_in_flight, "notification dispatcher starting"
        );
        let permits = Arc::new(Semaphore::new(max_in_flight));
        let mut in_flight = JoinSet::new();
        loop {
            while let Some(finished) = in_flight.try_join_next() {
                log_task_failure(finished);
            }
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("notification dispatcher received shutdown signal");
                    break;
                }
                received = events.recv() => match received {
                    Ok(event) => {
                        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                            break;
                        };
                        let dispatcher = Arc::clone(&self);
                        in_flight.spawn(async move {
                            let _permit = permit;
                            dispatcher.dispatch(&event).await;
                        });
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "notification dispatcher lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        if !in_flight.is_empty() {
            info!(pending = in_flight.len(), "waiting for in-flight notifications");
        }
        while let Some(finished) = in_flight.join_next().await {
            log_task_failure(finished);
        }
        info!("notification dispatcher stopped");
    }

    /// Send every message `event` calls for.
    pub async fn dispatch(&self, event: &PhotoEvent) {
        if !self.config.enabled {
            debug!(event = event.kind(), "notifications disabled");
            return;
        }
        for outgoing in self.messages_for(event) {
            let template = outgoing.template.name();
            match self.deliver(&outgoing).await {
                Ok(result) => {
                    self.metrics.increment_notifications_sent();
                    debug!(template, status = %result.status, "notification delivered");
                }
                Err(e) => {
                    self.metrics.increment_notifications_failed();
                    error!(
                        template,
                        photo_id = %event.photo_id(),
                        error = %e,
                        "notification dropped"
                    );
                }
            }
        }
    }

    /// Send a connectivity check to `to`, or the admin address.
    pub async fn send_test(&self, to: Option<&str>) -> Result<EmailResult, EmailError> {
        let outgoing = Outgoing {
            template: EmailTemplate::Test,
            to: to.unwrap_or(&self.email.admin_address).to_owned(),
            context: json!({ "site_url": self.email.site_url }),
        };
        self.deliver(&outgoing).await
    }

    async fn deliver(&self, outgoing: &Outgoing) -> Result<EmailResult, EmailError> {
        let rendered = self.renderer.render(outgoing.template, &outgoing.context)?;
        let message = EmailMessage {
            from: self.email.from_address.clone(),
            to: outgoing.to.clone(),
            subject: rendered.subject,
            body: Some(rendered.text),
            html_body: Some(rendered.html),
            reply_to: self.email.reply_to.clone(),
        };
        self.send_with_retry(&message).await
    }

    async fn send_with_retry(&self, message: &EmailMessage) -> Result<EmailResult, EmailError> {
        let mut attempt = 0;
        loop {
            match self.backend.send(message).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.retry_delay(attempt);
                    warn!(
                        to = %message.to,
                        attempt = attempt + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "email send failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub(crate) fn messages_for(&self, event: &PhotoEvent) -> Vec<Outgoing> {
        let photo = event.photo();
        let site = self.email.site_url.trim_end_matches('/');
        let review_url = format!("{site}/admin/photos");

        match event {
            PhotoEvent::Submitted { photo } => vec![
                Outgoing {
                    template: EmailTemplate::SubmissionReceived,
                    to: photo.submitter_email.clone(),
                    context: json!({
                        "submitter_name": photo.submitter_name,
                        "shop_name": photo.shop_name,
                        "description": photo.description,
                        "photo_id": photo.id,
                    }),
                },
                Outgoing {
                    template: EmailTemplate::AdminNewSubmission,
                    to: self.email.admin_address.clone(),
                    context: json!({
                        "shop_name": photo.shop_name,
                        "shop_id": photo.shop_id,
                        "submitter_name": photo.submitter_name,
                        "submitter_email": photo.submitter_email,
                        "description": photo.description,
                        "quality_score": photo.quality_score,
                        "photo_id": photo.id,
                        "review_url": review_url,
                    }),
                },
            ],
            PhotoEvent::Approved { photo } => vec![Outgoing {
                template: EmailTemplate::PhotoApproved,
                to: photo.submitter_email.clone(),
                context: json!({
                    "submitter_name": photo.submitter_name,
                    "shop_name": photo.shop_name,
                    "shop_url": format!("{site}/shop/{}", photo.shop_id),
                }),
            }],
            PhotoEvent::Rejected { photo, reason } => vec![Outgoing {
                template: EmailTemplate::PhotoRejected,
                to: photo.submitter_email.clone(),
                context: json!({
                    "submitter_name": photo.submitter_name,
                    "shop_name": photo.shop_name,
                    "reason": reason,
                }),
            }],
            PhotoEvent::DeletionRequested { photo, request } => vec![Outgoing {
                template: EmailTemplate::AdminDeletionRequest,
                to: self.email.admin_address.clone(),
                context: json!({
                    "shop_name": photo.shop_name,
                    "photo_id": photo.id,
                    "requester_name": request.requester.name,
                    "requester_email": request.requester.email,
                    "requester_role": request.requester.role,
                    "reason": request.reason,
                    "review_url": review_url,
                }),
            }],
            PhotoEvent::DeletionApproved { photo, request } => {
                let recover_until = photo
                    .can_recover_until
                    .map(|d| d.format("%d %B %Y at %H:%M UTC").to_string())
                    .unwrap_or_default();
                vec![Outgoing {
                    template: EmailTemplate::DeletionApproved,
                    to: request.requester.email.clone(),
                    context: json!({
                        "requester_name": request.requester.name,
                        "shop_name": photo.shop_name,
                        "recover_until": recover_until,
                    }),
                }]
            }
            PhotoEvent::DeletionRejected {
                photo,
                request,
                reason,
            } => vec![Outgoing {
                template: EmailTemplate::DeletionRejected,
                to: request.requester.email.clone(),
                context: json!({
                    "requester_name": request.requester.name,
                    "shop_name": photo.shop_name,
                    "reason": reason,
                }),
            }],
            PhotoEvent::Recovered { .. } | PhotoEvent::Purged { .. } => {
                debug!(event = event.kind(), photo_id = %photo.id, "no notification for event");
                Vec::new()
            }
        }
    }
}

fn log_task_failure(finished: Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        error!(error = %e, "notification task failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use farmgate_core::{
        DeletionRequest, PhotoId, PhotoStatus, PhotoSubmission, Requester, RequesterRole, ShopId,
    };
    use farmgate_email::testing::RecordingBackend;

    fn photo(status: PhotoStatus) -> PhotoSubmission {
        PhotoSubmission {
            id: PhotoId::from("photo_1"),
            shop_id: ShopId::from("hill-farm"),
            shop_name: "Hill Farm".into(),
            submitter_name: "Ann".into(),
            submitter_email: "ann@example.com".into(),
            photo_url: "/v1/photos/photo_1/image".into(),
            thumbnail_url: "/v1/photos/photo_1/image".into(),
            description: "Front <b>door</b>".into(),
            file_size: 10,
            content_type: "image/png".into(),
            dimensions: None,
            quality_score: 77,
            status,
            submitted_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
            rejection_reason: None,
            deletion_requested_at: None,
            deletion_requested_by: None,
            deletion_reason: None,
            deleted_at: None,
            deleted_by: None,
            can_recover_until: None,
        }
    }

    fn request() -> DeletionRequest {
        DeletionRequest::new(
            PhotoId::from("photo_1"),
            Requester {
                name: "Bob".into(),
                email: "bob@farm.co.uk".into(),
                role: RequesterRole::ShopOwner,
            },
            "This is not our shop".into(),
            Utc::now(),
        )
    }

    fn dispatcher(backend: Arc<RecordingBackend>) -> NotificationDispatcher {
        NotificationDispatcher::new(
            backend,
            EmailConfig::default(),
            NotificationConfig::default(),
            Arc::new(ModerationMetrics::default()),
        )
        .unwrap()
    }

    #[test]
    fn retry_delay_doubles_and_caps() {
        let config = NotificationConfig::default();
        assert_eq!(config.retry_delay(0), Duration::from_millis(500));
        assert_eq!(config.retry_delay(1), Duration::from_millis(1000));
        assert_eq!(config.retry_delay(2), Duration::from_millis(2000));
        assert_eq!(config.retry_delay(10), Duration::from_millis(10_000));
        assert_eq!(config.retry_delay(u32::MAX), Duration::from_millis(10_000));
    }

    #[tokio::test]
    async fn submission_notifies_submitter_and_admin() {
        let backend = Arc::new(RecordingBackend::new());
        let dispatcher = dispatcher(Arc::clone(&backend));
        dispatcher
            .dispatch(&PhotoEvent::Submitted {
                photo: photo(PhotoStatus::Pending),
            })
            .await;

        let sent = backend.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "ann@example.com");
        assert_eq!(sent[0].subject, "Photo Submitted Successfully - Hill Farm");
        assert_eq!(sent[1].to, "admin@farmcompanion.co.uk");
        assert!(sent[1].subject.contains("New Submission"));
        let html = sent[0].html_body.as_deref().unwrap();
        assert!(html.contains("&lt;b&gt;door"));
        assert_eq!(dispatcher.metrics.snapshot().notifications_sent, 2);
    }

    #[tokio::test]
    async fn rejection_carries_reason() {
        let backend = Arc::new(RecordingBackend::new());
        let dispatcher = dispatcher(Arc::clone(&backend));
        dispatcher
            .dispatch(&PhotoEvent::Rejected {
                photo: photo(PhotoStatus::Rejected),
                reason: "Too blurry".into(),
            })
            .await;
        let sent = backend.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.as_deref().unwrap().contains("Too blurry"));
    }

    #[tokio::test]
    async fn deletion_events_go_to_admin_then_requester() {
        let backend = Arc::new(RecordingBackend::new());
        let dispatcher = dispatcher(Arc::clone(&backend));
        let mut deleted = photo(PhotoStatus::Deleted);
        deleted.can_recover_until = Some(Utc::now());

        dispatcher
            .dispatch(&PhotoEvent::DeletionRequested {
                photo: photo(PhotoStatus::DeletionRequested),
                request: request(),
            })
            .await;
        dispatcher
            .dispatch(&PhotoEvent::DeletionApproved {
                photo: deleted,
                request: request(),
            })
            .await;

        let sent = backend.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "admin@farmcompanion.co.uk");
        assert_eq!(sent[1].to, "bob@farm.co.uk");
        assert!(sent[1].subject.starts_with("Photo Removed"));
    }

    #[tokio::test]
    async fn recovery_sends_nothing() {
        let backend = Arc::new(RecordingBackend::new());
        let dispatcher = dispatcher(Arc::clone(&backend));
        dispatcher
            .dispatch(&PhotoEvent::Recovered {
                photo: photo(PhotoStatus::Approved),
            })
            .await;
        assert_eq!(backend.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let backend = Arc::new(RecordingBackend::new());
        backend.fail_next(EmailError::Connection("refused".into()));
        backend.fail_next(EmailError::Timeout(Duration::from_secs(10)));
        let dispatcher = dispatcher(Arc::clone(&backend));
        dispatcher
            .dispatch(&PhotoEvent::Approved {
                photo: photo(PhotoStatus::Approved),
            })
            .await;

        assert_eq!(backend.attempts(), 3);
        assert_eq!(backend.sent().len(), 1);
        let snap = dispatcher.metrics.snapshot();
        assert_eq!(snap.notifications_sent, 1);
        assert_eq!(snap.notifications_failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_are_dropped() {
        let backend = Arc::new(RecordingBackend::new());
        for _ in 0..4 {
            backend.fail_next(EmailError::Connection("refused".into()));
        }
        let dispatcher = dispatcher(Arc::clone(&backend));
        dispatcher
            .dispatch(&PhotoEvent::Approved {
                photo: photo(PhotoStatus::Approved),
            })
            .await;

        assert_eq!(backend.attempts(), 4);
        assert!(backend.sent().is_empty());
        assert_eq!(dispatcher.metrics.snapshot().notifications_failed, 1);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let backend = Arc::new(RecordingBackend::new());
        backend.fail_next(EmailError::DeliveryFailed("mailbox unknown".into()));
        let dispatcher = dispatcher(Arc::clone(&backend));
        dispatcher
            .dispatch(&PhotoEvent::Approved {
                photo: photo(PhotoStatus::Approved),
            })
            .await;
        assert_eq!(backend.attempts(), 1);
        assert_eq!(dispatcher.metrics.snapshot().notifications_failed, 1);
    }

    #[tokio::test]
    async fn disabled_dispatcher_is_silent() {
        let backend = Arc::new(RecordingBackend::new());
        let dispatcher = NotificationDispatcher::new(
            Arc::clone(&backend) as Arc<dyn EmailBackend>,
            EmailConfig::default(),
            NotificationConfig {
                enabled: false,
                ..NotificationConfig::default()
            },
            Arc::new(ModerationMetrics::default()),
        )
        .unwrap();
        dispatcher
            .dispatch(&PhotoEvent::Submitted {
                photo: photo(PhotoStatus::Pending),
            })
            .await;
        assert_eq!(backend.attempts(), 0);
    }

    /// Holds every send to one address until released.
    #[derive(Debug)]
    struct GatedBackend {
        inner: RecordingBackend,
        held: &'static str,
        gate: tokio::sync::Notify,
    }

    #[async_trait::async_trait]
    impl EmailBackend for GatedBackend {
        async fn send(&self, message: &EmailMessage) -> Result<EmailResult, EmailError> {
            if message.to == self.held {
                self.gate.notified().await;
            }
            self.inner.send(message).await
        }

        async fn health_check(&self) -> Result<(), EmailError> {
            Ok(())
        }

        fn backend_name(&self) -> &'static str {
            "gated"
        }
    }

    #[tokio::test]
    async fn stuck_delivery_does_not_block_later_events() {
        let backend = Arc::new(GatedBackend {
            inner: RecordingBackend::new(),
            held: "ann@example.com",
            gate: tokio::sync::Notify::new(),
        });
        let dispatcher = Arc::new(
            NotificationDispatcher::new(
                Arc::clone(&backend) as Arc<dyn EmailBackend>,
                EmailConfig::default(),
                NotificationConfig::default(),
                Arc::new(ModerationMetrics::default()),
            )
            .unwrap(),
        );
        let (events_tx, events_rx) = broadcast::channel(8);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(Arc::clone(&dispatcher).run(events_rx, shutdown_rx));

        events_tx
            .send(PhotoEvent::Approved {
                photo: photo(PhotoStatus::Approved),
            })
            .unwrap();
        events_tx
            .send(PhotoEvent::DeletionRequested {
                photo: photo(PhotoStatus::DeletionRequested),
                request: request(),
            })
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while backend.inner.sent().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        let sent = backend.inner.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "admin@farmcompanion.co.uk");

        // Shutdown waits for the held delivery to finish.
        backend.gate.notify_one();
        shutdown_tx.send(()).await.unwrap();
        handle.await.unwrap();
        let sent = backend.inner.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].to, "ann@example.com");
        assert_eq!(dispatcher.metrics.snapshot().notifications_sent, 2);
    }

    #[test]
    fn in_flight_limit_defaults_when_omitted() {
        let config: NotificationConfig = serde_json::from_str(r#"{"max_retries": 1}"#).unwrap();
        assert_eq!(config.max_in_flight, 16);
        assert_eq!(config.max_retries, 1);
    }

    #[tokio::test]
    async fn test_email_goes_to_admin() {
        let backend = Arc::new(RecordingBackend::new());
        let dispatcher = dispatcher(Arc::clone(&backend));
        dispatcher.send_test(None).await.unwrap();
        let sent = backend.sent();
        assert_eq!(sent[0].to, "admin@farmcompanion.co.uk");
        assert_eq!(sent[0].subject, "Test Email - Farm Companion");
    }
}
