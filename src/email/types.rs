use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Content type of the raw markdown part attached to templated mail
pub const MARKDOWN_CONTENT_TYPE: &str = "text/x-web-markdown";

/// Additional body part carried next to the text and HTML bodies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alternative {
    pub content_type: String,
    pub content: String,
}

impl Alternative {
    pub fn new(content_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            content: content.into(),
        }
    }

    /// Raw markdown part
    pub fn markdown(content: impl Into<String>) -> Self {
        Self::new(MARKDOWN_CONTENT_TYPE, content)
    }
}

/// A caller's request to send one email
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    /// Recipient mailboxes (`addr` or `"Name" <addr>`)
    #[serde(deserialize_with = "one_or_many")]
    pub to: Vec<String>,

    /// Sender; defaults to the configured display name and address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,

    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,

    /// Explicit subject; wins over a template heading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Plain-text body, replaced when a template is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// HTML body, replaced when a template is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    /// Logical template name (`welcome` reads `welcome.md`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Data object the template is rendered with
    #[serde(default)]
    pub data: serde_json::Value,

    /// Skip the shared layout wrapper
    #[serde(default)]
    pub no_layout: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<Alternative>,

    /// Extra transport headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl SendRequest {
    /// Start a request for a single recipient
    pub fn to(recipient: impl Into<String>) -> Self {
        Self {
            to: vec![recipient.into()],
            ..Default::default()
        }
    }

    /// Start a request for several recipients
    pub fn to_many<I, S>(recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            to: recipients.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn cc(mut self, cc: impl Into<String>) -> Self {
        self.cc.push(cc.into());
        self
    }

    pub fn bcc(mut self, bcc: impl Into<String>) -> Self {
        self.bcc.push(bcc.into());
        self
    }

    pub fn reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Render the body from a named template
    pub fn template(mut self, name: impl Into<String>, data: serde_json::Value) -> Self {
        self.template = Some(name.into());
        self.data = data;
        self
    }

    pub fn no_layout(mut self) -> Self {
        self.no_layout = true;
        self
    }

    pub fn alternative(mut self, alternative: Alternative) -> Self {
        self.alternatives.push(alternative);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Recipients joined for log output
    pub fn recipients(&self) -> String {
        self.to.join(", ")
    }
}

/// Transport-ready message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub reply_to: Option<String>,
    pub subject: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
    pub alternatives: Vec<Alternative>,
    pub headers: BTreeMap<String, String>,
}

impl OutgoingMessage {
    /// Carry every field of `request` over unchanged, filling `from` with
    /// `default_from` when the request has none.
    pub fn from_request(request: &SendRequest, default_from: &str) -> Self {
        Self {
            from: request
                .from
                .clone()
                .unwrap_or_else(|| default_from.to_string()),
            to: request.to.clone(),
            cc: request.cc.clone(),
            bcc: request.bcc.clone(),
            reply_to: request.reply_to.clone(),
            subject: request.subject.clone(),
            text: request.text.clone(),
            html: request.html.clone(),
            alternatives: request.alternatives.clone(),
            headers: request.headers.clone(),
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(one) => vec![one],
        OneOrMany::Many(many) => many,
    })
}
