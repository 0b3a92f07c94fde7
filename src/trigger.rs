//! Defines a _trigger_, the input for the handling of an event
//! through the dispatcher. The trigger is built from the CloudEvent
//! pushed by Eventarc, in either binary or structured content mode.

use crate::document::Document;
use anyhow::{anyhow, Context, Result};
use axum::http::{header::CONTENT_TYPE, HeaderMap};
use serde::Deserialize;
use tracing::instrument;

/// The content type of structured-mode CloudEvents.
const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";

/// The event data of Firestore document events.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentEventData {
    /// The document after the change. Absent for deletions.
    #[serde(default)]
    value: Option<Document>,
}

/// A CloudEvent in structured content mode.
#[derive(Debug, Deserialize)]
struct StructuredEvent {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    data: Option<DocumentEventData>,
}

/// The input to the dispatcher: which event it is, and the document
/// it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    /// The CloudEvent identifier.
    pub id: String,

    /// The CloudEvent type.
    pub event_type: String,

    /// The CloudEvent source, naming the database.
    pub source: String,

    /// The CloudEvent subject, `documents/{path}`.
    pub subject: Option<String>,

    /// The created document.
    pub document: Document,
}

/// Get a header as a string, if it is one.
fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

impl Trigger {
    /// Decode a pushed event from the request headers and body.
    #[instrument(skip(headers, body))]
    pub fn from_request(headers: &HeaderMap, body: &[u8]) -> Result<Self> {
        let structured = header(headers, CONTENT_TYPE.as_str())
            .map(|ct| ct.starts_with(STRUCTURED_CONTENT_TYPE))
            .unwrap_or(false);
        if structured {
            let event: StructuredEvent = serde_json::from_slice(body)
                .context("Failed to decode a structured CloudEvent")?;
            let document = event
                .data
                .and_then(|data| data.value)
                .ok_or_else(|| anyhow!("event {:?} carries no document", event.id))?;
            return Ok(Trigger {
                id: event.id,
                event_type: event.event_type,
                source: event.source,
                subject: event.subject,
                document,
            });
        }

        let id = String::from(header(headers, "ce-id").unwrap_or_default());
        let event_type = header(headers, "ce-type")
            .map(String::from)
            .ok_or_else(|| anyhow!("event {:?} has no ce-type header", id))?;
        let data: DocumentEventData = serde_json::from_slice(body)
            .with_context(|| format!("Failed to decode the data of event {:?}", id))?;
        let document = data
            .value
            .ok_or_else(|| anyhow!("event {:?} carries no document", id))?;
        Ok(Trigger {
            event_type,
            source: String::from(header(headers, "ce-source").unwrap_or_default()),
            subject: header(headers, "ce-subject").map(String::from),
            document,
            id,
        })
    }

    /// The path of the document relative to the database root. It's
    /// taken from the document name, or from the event subject when
    /// the name is missing.
    pub fn document_path(&self) -> &str {
        if !self.document.name.is_empty() {
            return self.document.path();
        }
        self.subject
            .as_deref()
            .map(|s| s.strip_prefix("documents/").unwrap_or(s))
            .unwrap_or_default()
    }
}
