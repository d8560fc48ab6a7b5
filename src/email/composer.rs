//! Turns send requests into transport-ready messages

use std::sync::Arc;

use serde_json::json;

use crate::template::{Renderer, TemplateCache};

use super::error::MailResult;
use super::heading::parse_heading;
use super::types::{Alternative, OutgoingMessage, SendRequest};

/// Applies templates, the shared layout and sender defaults to a request
pub struct MessageComposer {
    cache: Arc<TemplateCache>,
    renderer: Arc<dyn Renderer>,
    layout: String,
    default_from: String,
}

impl MessageComposer {
    pub fn new(
        cache: Arc<TemplateCache>,
        renderer: Arc<dyn Renderer>,
        layout: impl Into<String>,
        default_from: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            renderer,
            layout: layout.into(),
            default_from: default_from.into(),
        }
    }

    pub fn cache(&self) -> &Arc<TemplateCache> {
        &self.cache
    }

    pub fn default_from(&self) -> &str {
        &self.default_from
    }

    /// Build the message for `request`.
    ///
    /// Without a template the request passes through with only `from`
    /// defaulted. With one, the layout and template are loaded through the
    /// cache, a first-line heading supplies the subject when none was given,
    /// and the rendered HTML is wrapped in the layout unless `no_layout` is set.
    pub async fn compose(&self, request: &SendRequest) -> MailResult<OutgoingMessage> {
        let mut message = OutgoingMessage::from_request(request, &self.default_from);

        let Some(name) = request.template.as_deref() else {
            return Ok(message);
        };

        let layout = self.cache.load(&self.layout).await?;
        let template = self.cache.load(name).await?;

        let heading = parse_heading(&template);
        if message.subject.is_none() {
            if let Some(subject) = heading.subject {
                let rendered = self.renderer.render(subject, &request.data)?;
                message.subject = Some(rendered.text.trim().to_string());
            }
        }

        let rendered = self.renderer.render(heading.body, &request.data)?;

        let html = if request.no_layout {
            rendered.html
        } else {
            self.renderer
                .render(&layout, &json!({ "content": rendered.html }))?
                .html
        };

        message.alternatives.push(Alternative::markdown(rendered.text.clone()));
        message.text = Some(rendered.text);
        message.html = Some(html);

        tracing::debug!(
            template = %name,
            layout = !request.no_layout,
            subject = ?message.subject,
            "Composed templated message"
        );

        Ok(message)
    }
}
