//! End-to-end tests of the email pipeline
//!
//! These tests drive `EmailService` with scripted transports and counting
//! template sources. Backoff sleeps run on paused tokio time.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::broadcast;
use tracing_subscriber::fmt::MakeWriter;

use ara_mail_service::config::EmailConfig;
use ara_mail_service::dispatch::{BackoffConfig, RetryPolicy};
use ara_mail_service::email::{
    Alternative, DeliveryOutcome, DeliveryReport, EmailService, OutgoingMessage, SendRequest,
};
use ara_mail_service::template::{
    MarkdownRenderer, MemoryTemplateSource, Renderer, TemplateResult, TemplateSource,
};
use ara_mail_service::transport::{DeliveryReceipt, Transport, TransportError};

const DEFAULT_FROM: &str = "\"Ara\" <noreply@example.com>";
const LAYOUT: &str = "<html><body class=\"mail-layout\">{{{content}}}</body></html>";
const WELCOME: &str = "# Welcome, {{name}}!\nThanks for joining, **{{name}}**.";

// ============================================================================
// Test doubles
// ============================================================================

/// Transport that fails its first `failures` calls and records everything
#[derive(Default)]
struct ScriptedTransport {
    failures: u32,
    delay: Duration,
    calls: AtomicU32,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    started: Mutex<Vec<String>>,
    sent: Mutex<Vec<OutgoingMessage>>,
}

impl ScriptedTransport {
    fn failing(failures: u32) -> Self {
        Self {
            failures,
            ..Default::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<DeliveryReceipt, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.started.lock().unwrap().push(message.to.join(","));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if call <= self.failures {
            return Err(TransportError::Smtp(format!("421 try again later (call {})", call)));
        }

        self.sent.lock().unwrap().push(message.clone());
        Ok(DeliveryReceipt {
            transport: "scripted",
            response: "250 OK".to_string(),
        })
    }
}

/// Template source that counts reads per key
#[derive(Default)]
struct CountingSource {
    inner: MemoryTemplateSource,
    reads: Mutex<HashMap<String, usize>>,
}

impl CountingSource {
    fn with_templates() -> Self {
        let source = Self::default();
        source.inner.insert("layout.html", LAYOUT);
        source.inner.insert("welcome.md", WELCOME);
        source
    }

    fn reads(&self, key: &str) -> usize {
        self.reads.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl TemplateSource for CountingSource {
    async fn read(&self, key: &str) -> TemplateResult<String> {
        *self.reads.lock().unwrap().entry(key.to_string()).or_default() += 1;
        self.inner.read(key).await
    }
}

/// Captures formatted log output of the whole test binary
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Number of log lines containing every needle
    fn count(&self, needles: &[&str]) -> usize {
        let buffer = self.0.lock().unwrap();
        String::from_utf8_lossy(&buffer)
            .lines()
            .filter(|line| needles.iter().all(|needle| line.contains(needle)))
            .count()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn logs() -> &'static LogCapture {
    static LOGS: OnceLock<LogCapture> = OnceLock::new();
    LOGS.get_or_init(|| {
        let capture = LogCapture::default();
        let _ = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
        capture
    })
}

// ============================================================================
// Helpers
// ============================================================================

fn build_service(transport: Arc<dyn Transport>, source: Arc<dyn TemplateSource>) -> EmailService {
    logs();
    EmailService::builder(EmailConfig::new("Ara", "noreply@example.com"))
        .transport(transport)
        .template_source(source)
        .retry_policy(RetryPolicy::default())
        .build()
        .unwrap()
}

async fn next_report(reports: &mut broadcast::Receiver<DeliveryReport>) -> DeliveryReport {
    reports.recv().await.unwrap()
}

async fn collect_reports(
    reports: &mut broadcast::Receiver<DeliveryReport>,
    count: usize,
) -> Vec<DeliveryReport> {
    let mut collected = Vec::with_capacity(count);
    for _ in 0..count {
        collected.push(next_report(reports).await);
    }
    collected
}

fn welcome(to: &str) -> SendRequest {
    SendRequest::to(to).template("welcome", json!({"name": "Ann"}))
}

// ============================================================================
// Serialization Tests
// ============================================================================

mod serialization_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_one_delivery_in_flight_in_submission_order() {
        let transport = Arc::new(ScriptedTransport::slow(Duration::from_millis(50)));
        let service = build_service(transport.clone(), Arc::new(CountingSource::default()));
        let mut reports = service.subscribe();

        let recipients: Vec<String> = (0..10).map(|i| format!("order{}@example.com", i)).collect();
        for to in &recipients {
            service.send(SendRequest::to(to.as_str()).text("hi"));
        }

        let finished = collect_reports(&mut reports, recipients.len()).await;

        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(*transport.started.lock().unwrap(), recipients);
        let finish_order: Vec<String> = finished.iter().map(|r| r.recipients.join(",")).collect();
        assert_eq!(finish_order, recipients);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_are_serialized() {
        let transport = Arc::new(ScriptedTransport::slow(Duration::from_millis(20)));
        let service = Arc::new(build_service(
            transport.clone(),
            Arc::new(CountingSource::default()),
        ));
        let mut reports = service.subscribe();

        let mut handles = Vec::new();
        for i in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.send(SendRequest::to(format!("caller{}@example.com", i)).text("hi"));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let finished = collect_reports(&mut reports, 8).await;

        assert!(finished.iter().all(|r| r.outcome.is_delivered()));
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(transport.sent().len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_returns_before_delivery() {
        let transport = Arc::new(ScriptedTransport::slow(Duration::from_millis(200)));
        let service = build_service(transport.clone(), Arc::new(CountingSource::default()));

        service.send(SendRequest::to("eager@example.com").text("hi"));

        assert!(transport.sent().is_empty());
        service.shutdown().await;
        assert_eq!(transport.sent().len(), 1);
    }
}

// ============================================================================
// Template Cache Tests
// ============================================================================

mod cache_tests {
    use super::*;

    #[tokio::test]
    async fn test_each_template_read_once() {
        let source = Arc::new(CountingSource::with_templates());
        let transport = Arc::new(ScriptedTransport::default());
        let service = build_service(transport.clone(), source.clone());
        let mut reports = service.subscribe();

        service.send(welcome("cache1@example.com"));
        service.send(welcome("cache2@example.com"));
        service.send(welcome("cache3@example.com").no_layout());
        collect_reports(&mut reports, 3).await;

        assert_eq!(source.reads("welcome.md"), 1);
        assert_eq!(source.reads("layout.html"), 1);
        assert_eq!(service.cache_size(), 2);
    }

    #[tokio::test]
    async fn test_storage_changes_after_first_load_are_ignored() {
        let source = Arc::new(CountingSource::with_templates());
        let transport = Arc::new(ScriptedTransport::default());
        let service = build_service(transport.clone(), source.clone());
        let mut reports = service.subscribe();

        service.send(welcome("before@example.com"));
        next_report(&mut reports).await;

        source.inner.insert("welcome.md", "# Changed\nSomething else entirely");
        service.send(welcome("after@example.com"));
        next_report(&mut reports).await;

        let sent = transport.sent();
        assert_eq!(sent[0].subject, sent[1].subject);
        assert_eq!(sent[0].text, sent[1].text);
        assert_eq!(sent[1].subject.as_deref(), Some("Welcome, Ann!"));
    }
}

// ============================================================================
// Composition Tests
// ============================================================================

mod composition_tests {
    use super::*;

    #[tokio::test]
    async fn test_heading_becomes_rendered_subject() {
        let transport = Arc::new(ScriptedTransport::default());
        let service = build_service(transport.clone(), Arc::new(CountingSource::with_templates()));
        let mut reports = service.subscribe();

        service.send(welcome("heading@example.com"));
        next_report(&mut reports).await;

        let message = &transport.sent()[0];
        assert_eq!(message.subject.as_deref(), Some("Welcome, Ann!"));
        assert!(!message.text.as_deref().unwrap().contains("Welcome"));
        assert!(!message.html.as_deref().unwrap().contains("Welcome"));
        assert!(message.html.as_deref().unwrap().contains("<strong>Ann</strong>"));
    }

    #[tokio::test]
    async fn test_no_layout_html_is_template_alone() {
        let transport = Arc::new(ScriptedTransport::default());
        let service = build_service(transport.clone(), Arc::new(CountingSource::with_templates()));
        let mut reports = service.subscribe();

        service.send(welcome("bare@example.com").no_layout());
        next_report(&mut reports).await;

        let expected = MarkdownRenderer
            .render("Thanks for joining, **{{name}}**.", &json!({"name": "Ann"}))
            .unwrap();
        let html = transport.sent()[0].html.clone().unwrap();
        assert_eq!(html, expected.html);
        assert!(!html.contains("mail-layout"));
    }

    #[tokio::test]
    async fn test_layout_wraps_rendered_html() {
        let transport = Arc::new(ScriptedTransport::default());
        let service = build_service(transport.clone(), Arc::new(CountingSource::with_templates()));
        let mut reports = service.subscribe();

        service.send(welcome("wrapped@example.com"));
        next_report(&mut reports).await;

        let message = &transport.sent()[0];
        let html = message.html.as_deref().unwrap();
        assert!(html.starts_with("<html><body class=\"mail-layout\">"));
        assert!(html.contains("<p>Thanks for joining, <strong>Ann</strong>.</p>"));
        assert_eq!(
            message.text.as_deref(),
            Some("Thanks for joining, **Ann**.")
        );
        assert_eq!(
            message.alternatives,
            vec![Alternative::markdown("Thanks for joining, **Ann**.")]
        );
    }

    #[tokio::test]
    async fn test_passthrough_without_template() {
        let transport = Arc::new(ScriptedTransport::default());
        let service = build_service(transport.clone(), Arc::new(CountingSource::default()));
        let mut reports = service.subscribe();

        let request = SendRequest::to("plain@example.com")
            .cc("copy@example.com")
            .reply_to("help@example.com")
            .subject("Invoice")
            .text("Your invoice")
            .html("<p>Your invoice</p>")
            .alternative(Alternative::new("text/calendar", "BEGIN:VCALENDAR"))
            .header("X-Campaign", "billing");
        service.send(request.clone());
        next_report(&mut reports).await;

        let mut expected = OutgoingMessage::from_request(&request, DEFAULT_FROM);
        assert_eq!(transport.sent()[0], expected);

        // An explicit sender is kept
        service.send(request.clone().from("billing@example.com"));
        next_report(&mut reports).await;
        expected.from = "billing@example.com".to_string();
        assert_eq!(transport.sent()[1], expected);
    }
}

// ============================================================================
// Retry Tests
// ============================================================================

mod retry_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds() {
        let transport = Arc::new(ScriptedTransport::failing(2));
        let service = build_service(transport.clone(), Arc::new(CountingSource::default()));
        let mut reports = service.subscribe();

        service.send(SendRequest::to("flaky@example.com").text("hi"));
        let report = next_report(&mut reports).await;

        assert!(report.outcome.is_delivered());
        assert_eq!(report.outcome.attempts(), 3);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            logs().count(&["Email to flaky@example.com failed, retrying"]),
            2
        );

        service.send(SendRequest::to("after-flaky@example.com").text("hi"));
        let next = next_report(&mut reports).await;
        assert_eq!(next.outcome.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandons_after_four_failures() {
        let transport = Arc::new(ScriptedTransport::failing(4));
        let service = build_service(transport.clone(), Arc::new(CountingSource::default()));
        let mut reports = service.subscribe();
        let start = tokio::time::Instant::now();

        service.send(SendRequest::to("down@example.com").text("hi"));
        service.send(SendRequest::to("after-down@example.com").text("hi"));

        let first = next_report(&mut reports).await;
        match &first.outcome {
            DeliveryOutcome::Abandoned {
                attempts,
                last_error,
            } => {
                assert_eq!(*attempts, 4);
                assert!(last_error.contains("call 4"));
            }
            other => panic!("expected abandoned, got {:?}", other),
        }
        assert_eq!(logs().count(&["Email to down@example.com failed, retrying"]), 3);
        assert_eq!(logs().count(&["(1 attempts left)", "down@example.com"]), 1);

        let second = next_report(&mut reports).await;
        assert_eq!(second.recipients, vec!["after-down@example.com"]);
        assert_eq!(second.outcome.attempts(), 1);

        // 1s + 2s + 4s of backoff and nothing more
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(7));
        assert!(elapsed < Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_template_is_retried_then_abandoned() {
        let transport = Arc::new(ScriptedTransport::default());
        let source = Arc::new(CountingSource::with_templates());
        let service = build_service(transport.clone(), source.clone());
        let mut reports = service.subscribe();

        service.send(SendRequest::to("missing@example.com").template("nope", json!({})));
        let report = next_report(&mut reports).await;

        assert_eq!(
            report.outcome,
            DeliveryOutcome::Abandoned {
                attempts: 4,
                last_error: "Template not found: nope.md".to_string(),
            }
        );
        assert_eq!(source.reads("nope.md"), 4);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_policy() {
        logs();
        let transport = Arc::new(ScriptedTransport::failing(10));
        let service = EmailService::builder(EmailConfig::new("Ara", "noreply@example.com"))
            .transport(transport.clone())
            .template_source(Arc::new(CountingSource::default()))
            .retry_policy(RetryPolicy::new(
                1,
                BackoffConfig {
                    initial_delay_ms: 10,
                    ..Default::default()
                },
            ))
            .build()
            .unwrap();
        let mut reports = service.subscribe();

        service.send(SendRequest::to("once-retried@example.com").text("hi"));
        let report = next_report(&mut reports).await;

        assert_eq!(report.outcome.attempts(), 2);
        assert_eq!(
            logs().count(&["Email to once-retried@example.com failed, retrying"]),
            1
        );
    }
}
