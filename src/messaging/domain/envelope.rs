//! Binary-mode event envelope.
//!
//! Event attributes travel as `ce-*` message headers and the encoded payload
//! travels, untouched, as the message body.

use super::{EnvelopeError, Headers};
use chrono::SecondsFormat;
use mockable::Clock;
use uuid::Uuid;

/// Event spec version written to and required on every message.
pub const SPEC_VERSION: &str = "1.0";

/// Header carrying the event spec version.
pub const HEADER_SPEC_VERSION: &str = "ce-specversion";
/// Header carrying the event type.
pub const HEADER_TYPE: &str = "ce-type";
/// Header carrying the event source.
pub const HEADER_SOURCE: &str = "ce-source";
/// Header carrying the unique event identifier.
pub const HEADER_ID: &str = "ce-id";
/// Header carrying the event capture time.
pub const HEADER_TIME: &str = "ce-time";
/// Header carrying the media type of the body.
pub const HEADER_DATA_CONTENT_TYPE: &str = "ce-datacontenttype";

/// Media type of the body produced by the shared codec.
pub const DATA_CONTENT_TYPE: &str = "application/json";

/// Source used when neither a hint nor a host name is available.
pub const DEFAULT_SOURCE: &str = "courier";

const CONTENT_TYPE_HEADER: &str = "content-type";
const STRUCTURED_CONTENT_TYPE_PREFIX: &str = "application/cloudevents";

/// Caller-supplied overrides for `ce-type` and `ce-source`.
///
/// Blank hints are ignored. Identifiers and timestamps are always generated
/// and cannot be hinted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventHints {
    event_type: Option<String>,
    source: Option<String>,
}

impl EventHints {
    /// Creates empty hints.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            event_type: None,
            source: None,
        }
    }

    /// Sets the `ce-type` hint.
    #[must_use]
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = non_blank(event_type.into());
        self
    }

    /// Sets the `ce-source` hint.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = non_blank(source.into());
        self
    }

    /// Returns the `ce-type` hint.
    #[must_use]
    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    /// Returns the `ce-source` hint.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Returns these hints with unset fields filled from `fallback`.
    #[must_use]
    pub fn or(&self, fallback: &Self) -> Self {
        Self {
            event_type: self.event_type.clone().or_else(|| fallback.event_type.clone()),
            source: self.source.clone().or_else(|| fallback.source.clone()),
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

/// Event attributes carried in `ce-*` headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventAttributes {
    spec_version: String,
    event_type: String,
    source: String,
    id: String,
    time: Option<String>,
    data_content_type: Option<String>,
}

impl EventAttributes {
    /// Returns the `ce-specversion` value.
    #[must_use]
    pub fn spec_version(&self) -> &str {
        &self.spec_version
    }

    /// Returns the `ce-type` value.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Returns the `ce-source` value.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the `ce-id` value.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the `ce-time` value, when present.
    #[must_use]
    pub fn time(&self) -> Option<&str> {
        self.time.as_deref()
    }

    /// Returns the `ce-datacontenttype` value, when present.
    #[must_use]
    pub fn data_content_type(&self) -> Option<&str> {
        self.data_content_type.as_deref()
    }

    /// Renders the attributes as binary-mode headers.
    #[must_use]
    pub fn to_headers(&self) -> Headers {
        let mut headers = Headers::new();
        headers.insert(HEADER_SPEC_VERSION, self.spec_version.clone());
        headers.insert(HEADER_TYPE, self.event_type.clone());
        headers.insert(HEADER_SOURCE, self.source.clone());
        headers.insert(HEADER_ID, self.id.clone());
        if let Some(time) = &self.time {
            headers.insert(HEADER_TIME, time.clone());
        }
        if let Some(content_type) = &self.data_content_type {
            headers.insert(HEADER_DATA_CONTENT_TYPE, content_type.clone());
        }
        headers
    }
}

/// An outgoing message split into event attributes and encoded body.
///
/// # Examples
///
/// ```
/// use courier::messaging::domain::{EventEnvelope, EventHints, HEADER_ID, HEADER_TYPE};
/// use mockable::DefaultClock;
///
/// let envelope = EventEnvelope::wrap(
///     br#"{"id":"A1"}"#.to_vec(),
///     "shop::OrderData",
///     &EventHints::new().with_event_type("order.created"),
///     "//host",
///     &DefaultClock,
/// );
/// let (headers, body) = envelope.into_parts();
/// assert_eq!(headers.get(HEADER_TYPE), Some("order.created"));
/// assert!(headers.contains(HEADER_ID));
/// assert_eq!(body, br#"{"id":"A1"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEnvelope {
    attributes: EventAttributes,
    body: Vec<u8>,
}

impl EventEnvelope {
    /// Wraps an encoded body with freshly generated event attributes.
    ///
    /// `ce-type` falls back to `payload_type` and `ce-source` to
    /// `fallback_source` when the corresponding hint is unset. `ce-id` and
    /// `ce-time` are always generated here.
    #[must_use]
    pub fn wrap(
        body: Vec<u8>,
        payload_type: &str,
        hints: &EventHints,
        fallback_source: &str,
        clock: &impl Clock,
    ) -> Self {
        let event_type = hints.event_type().unwrap_or(payload_type).to_owned();
        let source = hints
            .source()
            .map(str::to_owned)
            .or_else(|| non_blank(fallback_source.to_owned()))
            .unwrap_or_else(|| DEFAULT_SOURCE.to_owned());
        let attributes = EventAttributes {
            spec_version: SPEC_VERSION.to_owned(),
            event_type,
            source,
            id: Uuid::new_v4().to_string(),
            time: Some(clock.utc().to_rfc3339_opts(SecondsFormat::Nanos, true)),
            data_content_type: Some(DATA_CONTENT_TYPE.to_owned()),
        };
        Self { attributes, body }
    }

    /// Parses binary-mode headers and returns the attributes with the body
    /// left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::StructuredMode`] for structured-mode messages,
    /// [`EnvelopeError::MissingAttribute`] when any of `ce-specversion`,
    /// `ce-type`, `ce-source`, or `ce-id` is absent,
    /// [`EnvelopeError::UnsupportedSpecVersion`] for other spec versions, and
    /// [`EnvelopeError::UnsupportedContentType`] when `ce-datacontenttype`
    /// names a non-JSON media type.
    pub fn unwrap<'body>(
        headers: &Headers,
        body: &'body [u8],
    ) -> Result<InboundEvent<'body>, EnvelopeError> {
        let is_structured = headers
            .get(CONTENT_TYPE_HEADER)
            .is_some_and(|content_type| {
                content_type
                    .trim()
                    .to_ascii_lowercase()
                    .starts_with(STRUCTURED_CONTENT_TYPE_PREFIX)
            });
        if is_structured && !headers.contains(HEADER_SPEC_VERSION) {
            return Err(EnvelopeError::StructuredMode);
        }

        let spec_version = required(headers, HEADER_SPEC_VERSION)?;
        let event_type = required(headers, HEADER_TYPE)?;
        let source = required(headers, HEADER_SOURCE)?;
        let id = required(headers, HEADER_ID)?;

        if spec_version != SPEC_VERSION {
            return Err(EnvelopeError::UnsupportedSpecVersion {
                received: spec_version,
                supported: SPEC_VERSION,
            });
        }

        let data_content_type = optional(headers, HEADER_DATA_CONTENT_TYPE);
        if let Some(content_type) = &data_content_type
            && !is_json_media_type(content_type)
        {
            return Err(EnvelopeError::UnsupportedContentType(content_type.clone()));
        }

        let attributes = EventAttributes {
            spec_version,
            event_type,
            source,
            id,
            time: optional(headers, HEADER_TIME),
            data_content_type,
        };
        Ok(InboundEvent { attributes, body })
    }

    /// Returns the event attributes.
    #[must_use]
    pub const fn attributes(&self) -> &EventAttributes {
        &self.attributes
    }

    /// Returns the encoded body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Splits the envelope into transport headers and body.
    #[must_use]
    pub fn into_parts(self) -> (Headers, Vec<u8>) {
        (self.attributes.to_headers(), self.body)
    }
}

/// A received event whose envelope passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent<'body> {
    attributes: EventAttributes,
    body: &'body [u8],
}

impl<'body> InboundEvent<'body> {
    /// Returns the parsed event attributes.
    #[must_use]
    pub const fn attributes(&self) -> &EventAttributes {
        &self.attributes
    }

    /// Returns the raw body bytes exactly as received.
    #[must_use]
    pub const fn body(&self) -> &'body [u8] {
        self.body
    }
}

fn required(headers: &Headers, name: &'static str) -> Result<String, EnvelopeError> {
    optional(headers, name).ok_or(EnvelopeError::MissingAttribute(name))
}

fn optional(headers: &Headers, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn is_json_media_type(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    media_type == DATA_CONTENT_TYPE || media_type.ends_with("+json")
}

/// Derives the default `ce-source` from the host name.
///
/// Returns `//<hostname>` when the host name can be read and
/// [`DEFAULT_SOURCE`] otherwise.
#[must_use]
pub fn default_source() -> String {
    host_name().map_or_else(|| DEFAULT_SOURCE.to_owned(), |host| format!("//{host}"))
}

#[cfg(unix)]
fn host_name() -> Option<String> {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .and_then(non_blank)
}

#[cfg(not(unix))]
fn host_name() -> Option<String> {
    std::env::var("COMPUTERNAME").ok().and_then(non_blank)
}
