//! Fire-and-forget email service.
//!
//! Every [`EmailService::send`] becomes one task on the delivery queue. The
//! task composes the message and hands it to the transport inside the retry
//! policy, so template failures are retried like transport failures. Nothing
//! is returned to the caller; outcomes are logged and published to
//! [`EmailService::subscribe`] receivers.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::{EmailConfig, Settings, TemplatesConfig};
use crate::dispatch::{
    QueueStats, RetryExhausted, RetryPolicy, Succeeded, TaskQueue, DEFAULT_CONCURRENCY,
};
use crate::metrics::EmailMetrics;
use crate::template::{FsTemplateSource, MarkdownRenderer, Renderer, TemplateCache, TemplateSource};
use crate::transport::{create_transport, DeliveryReceipt, Transport};

use super::composer::MessageComposer;
use super::error::{MailError, MailResult};
use super::types::SendRequest;

const REPORT_CHANNEL_CAPACITY: usize = 256;

/// Terminal outcome of one queued send
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered {
        attempts: u32,
        receipt: DeliveryReceipt,
    },
    Abandoned {
        attempts: u32,
        last_error: String,
    },
}

impl DeliveryOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Delivered { attempts, .. } => *attempts,
            DeliveryOutcome::Abandoned { attempts, .. } => *attempts,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Published once for every send that reached the queue
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    pub job_id: Uuid,
    pub recipients: Vec<String>,
    pub outcome: DeliveryOutcome,
    pub finished_at: DateTime<Utc>,
}

struct Dispatcher {
    composer: MessageComposer,
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    reports: broadcast::Sender<DeliveryReport>,
}

impl Dispatcher {
    async fn deliver(&self, job_id: Uuid, request: SendRequest) {
        let started = Instant::now();
        let recipients = request.recipients();

        let pending = &request;
        let result = self
            .policy
            .run(
                move |attempt| self.attempt(job_id, attempt, pending),
                |failed| {
                    tracing::error!(
                        job_id = %job_id,
                        to = %recipients,
                        attempt = failed.attempt,
                        retries_left = failed.retries_left,
                        error = %failed.error,
                        "Email to {} failed, retrying ({} attempts left)",
                        recipients,
                        failed.retries_left
                    );
                },
            )
            .await;

        EmailMetrics::observe_latency(started.elapsed());

        let outcome = match result {
            Ok(Succeeded { value, attempts }) => {
                EmailMetrics::record_delivered(value.transport, attempts);
                tracing::info!(
                    job_id = %job_id,
                    to = %recipients,
                    attempts = attempts,
                    transport = value.transport,
                    response = %value.response,
                    "Email delivered"
                );
                DeliveryOutcome::Delivered {
                    attempts,
                    receipt: value,
                }
            }
            Err(RetryExhausted {
                attempts,
                last_error,
            }) => {
                EmailMetrics::record_abandoned(attempts);
                tracing::warn!(
                    job_id = %job_id,
                    to = %recipients,
                    attempts = attempts,
                    error = %last_error,
                    "Email abandoned after retries"
                );
                DeliveryOutcome::Abandoned {
                    attempts,
                    last_error: last_error.to_string(),
                }
            }
        };

        self.publish(job_id, request.to, outcome);
    }

    async fn attempt(
        &self,
        job_id: Uuid,
        attempt: u32,
        request: &SendRequest,
    ) -> MailResult<DeliveryReceipt> {
        tracing::debug!(job_id = %job_id, attempt = attempt, "Delivery attempt started");

        let result = match self.composer.compose(request).await {
            Ok(message) => self.transport.send(&message).await.map_err(MailError::from),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            EmailMetrics::record_attempt_failed(e.kind());
        }
        result
    }

    fn publish(&self, job_id: Uuid, recipients: Vec<String>, outcome: DeliveryOutcome) {
        // No receivers is fine
        let _ = self.reports.send(DeliveryReport {
            job_id,
            recipients,
            outcome,
            finished_at: Utc::now(),
        });
    }
}

/// Serialized outbound mail dispatcher
pub struct EmailService {
    dispatcher: Arc<Dispatcher>,
    queue: TaskQueue,
}

impl EmailService {
    /// Build the service from loaded settings.
    ///
    /// Fails with [`MailError::ConfigMissing`] when there is no `email` section.
    pub fn from_settings(settings: &Settings) -> MailResult<Self> {
        let email = settings.email.clone().ok_or(MailError::ConfigMissing)?;

        Self::builder(email)
            .templates(settings.templates.clone())
            .retry_policy(settings.retry.policy())
            .concurrency(settings.queue.concurrency)
            .build()
    }

    pub fn builder(config: EmailConfig) -> EmailServiceBuilder {
        EmailServiceBuilder::new(config)
    }

    /// Queue a message for delivery and return immediately.
    ///
    /// Never fails from the caller's point of view. A send rejected because
    /// the queue is shutting down is logged and reported as abandoned.
    pub fn send(&self, request: SendRequest) {
        let recipients = request.to.clone();
        if let Err(e) = self.try_send(request) {
            tracing::warn!(to = %recipients.join(", "), error = %e, "Email dropped");
            self.dispatcher.publish(
                Uuid::new_v4(),
                recipients,
                DeliveryOutcome::Abandoned {
                    attempts: 0,
                    last_error: e.to_string(),
                },
            );
        }
    }

    /// Queue a message for delivery, returning its job id.
    ///
    /// The only error is [`MailError::QueueClosed`]; delivery failures are
    /// still reported asynchronously.
    pub fn try_send(&self, request: SendRequest) -> MailResult<Uuid> {
        let job_id = Uuid::new_v4();
        let recipients = request.recipients();
        let dispatcher = self.dispatcher.clone();

        self.queue
            .enqueue(move || async move { dispatcher.deliver(job_id, request).await })
            .map_err(|_| MailError::QueueClosed)?;

        EmailMetrics::record_enqueued();
        tracing::debug!(job_id = %job_id, to = %recipients, "Email queued");

        Ok(job_id)
    }

    /// Receive a [`DeliveryReport`] for every send that finishes from now on
    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryReport> {
        self.dispatcher.reports.subscribe()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Number of templates held in the cache
    pub fn cache_size(&self) -> usize {
        self.dispatcher.composer.cache().len()
    }

    /// False once shutdown has started
    pub fn is_accepting(&self) -> bool {
        !self.queue.is_closed()
    }

    pub fn transport_name(&self) -> &'static str {
        self.dispatcher.transport.name()
    }

    /// Stop accepting sends and wait for everything already queued
    pub async fn shutdown(&self) {
        tracing::info!(pending = self.queue.stats().pending, "Draining email queue");
        self.queue.shutdown().await;
    }
}

/// Builder for [`EmailService`]
pub struct EmailServiceBuilder {
    config: EmailConfig,
    templates: TemplatesConfig,
    policy: RetryPolicy,
    concurrency: usize,
    source: Option<Arc<dyn TemplateSource>>,
    renderer: Option<Arc<dyn Renderer>>,
    transport: Option<Arc<dyn Transport>>,
}

impl EmailServiceBuilder {
    fn new(config: EmailConfig) -> Self {
        Self {
            config,
            templates: TemplatesConfig::default(),
            policy: RetryPolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
            source: None,
            renderer: None,
            transport: None,
        }
    }

    /// Template directory and layout name
    pub fn templates(mut self, templates: TemplatesConfig) -> Self {
        self.templates = templates;
        self
    }

    /// Read templates from `source` instead of the configured directory
    pub fn template_source(mut self, source: Arc<dyn TemplateSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Use `transport` instead of building one from the transport config
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Queue width. Values above one allow parallel delivery.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Validate the configuration and start the delivery queue.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> MailResult<EmailService> {
        if self.config.name.trim().is_empty() {
            return Err(MailError::InvalidConfig("email.name is empty".to_string()));
        }
        if self.config.from.trim().is_empty() {
            return Err(MailError::InvalidConfig("email.from is empty".to_string()));
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => create_transport(&self.config.transport)?,
        };
        let source = self
            .source
            .unwrap_or_else(|| {
                Arc::new(FsTemplateSource::new(&self.templates.dir)) as Arc<dyn TemplateSource>
            });
        let renderer = self
            .renderer
            .unwrap_or_else(|| Arc::new(MarkdownRenderer) as Arc<dyn Renderer>);

        let composer = MessageComposer::new(
            Arc::new(TemplateCache::new(source)),
            renderer,
            self.templates.layout,
            self.config.default_from(),
        );

        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        let queue = TaskQueue::new(self.concurrency);

        tracing::info!(
            from = %composer.default_from(),
            transport = transport.name(),
            retries = self.policy.retries,
            concurrency = queue.concurrency(),
            "Email service initialized"
        );

        Ok(EmailService {
            dispatcher: Arc::new(Dispatcher {
                composer,
                transport,
                policy: self.policy,
                reports,
            }),
            queue,
        })
    }
}
