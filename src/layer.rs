use crate::entry::{EventId, Exception, LogLevel};
use crate::memory_sink::MemorySink;
use crate::state::{render_value, Property, StateValues};
use crate::DIAGNOSTICS_TARGET;
use serde_json::Value;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Field lifted into [`EventId::id`] instead of being kept as a property.
pub const EVENT_ID_FIELD: &str = "event_id";
/// Field lifted into [`EventId::name`].
pub const EVENT_NAME_FIELD: &str = "event_name";

/// `tracing_subscriber` layer that captures every event it observes into a
/// [`MemorySink`].
///
/// The event target becomes the entry category and the spans the event is
/// nested in become its scopes, outermost first. Filtering is left to the
/// subscriber stack (`EnvFilter`, per-layer filters); this layer records
/// whatever reaches it, except the crate's own diagnostics.
pub struct MemoryLayer {
    sink: Arc<MemorySink>,
    include_scopes: bool,
}

impl MemoryLayer {
    pub fn new(sink: Arc<MemorySink>) -> Self {
        MemoryLayer {
            sink,
            include_scopes: true,
        }
    }

    /// Whether span fields are tracked and attached as scopes (default on).
    pub fn with_scopes(mut self, include_scopes: bool) -> Self {
        self.include_scopes = include_scopes;
        self
    }

    pub fn sink(&self) -> &Arc<MemorySink> {
        &self.sink
    }
}

impl<S> Layer<S> for MemoryLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        if !self.include_scopes {
            return;
        }
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut visitor = FieldVisitor::for_span();
        attrs.record(&mut visitor);

        // Another MemoryLayer on the same registry may have stored it already.
        let mut extensions = span.extensions_mut();
        if extensions.get_mut::<SpanScope>().is_none() {
            extensions.insert(SpanScope {
                name: span.name(),
                properties: visitor.properties,
            });
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut visitor = FieldVisitor::for_span();
        values.record(&mut visitor);

        let mut extensions = span.extensions_mut();
        if let Some(scope) = extensions.get_mut::<SpanScope>() {
            for (key, value) in visitor.properties {
                match scope.properties.iter_mut().rev().find(|(k, _)| *k == key) {
                    Some(slot) => slot.1 = value,
                    None => scope.properties.push((key, value)),
                }
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target() == DIAGNOSTICS_TARGET {
            return;
        }

        let mut visitor = FieldVisitor::for_event();
        event.record(&mut visitor);

        let event_id = EventId {
            id: visitor.event_id.unwrap_or_default(),
            name: visitor.event_name,
        };
        let state = EventState {
            message: visitor.message,
            properties: visitor.properties,
        };

        let scopes: Vec<SpanScope> = if self.include_scopes {
            ctx.event_scope(event)
                .map(|scope| {
                    scope
                        .from_root()
                        .filter_map(|span| span.extensions().get::<SpanScope>().cloned())
                        .collect()
                })
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        self.sink.write(
            LogLevel::from(*meta.level()),
            meta.target(),
            event_id,
            Some(&state),
            visitor.error,
            |state, _| state.map(ToString::to_string).unwrap_or_default(),
            Some(&scopes),
        );
    }
}

/// Fields of one span, stored in the span's extensions and captured as a
/// scope frame. Renders as `name{key=value other=value}`.
#[derive(Debug, Clone)]
pub struct SpanScope {
    name: &'static str,
    properties: Vec<Property>,
}

impl SpanScope {
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for SpanScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)?;
        if self.properties.is_empty() {
            return Ok(());
        }
        f.write_str("{")?;
        write_pairs(f, &self.properties)?;
        f.write_str("}")
    }
}

impl StateValues for SpanScope {
    fn properties(&self) -> Option<Vec<Property>> {
        Some(self.properties.clone())
    }
}

/// Primary state of a `tracing` event: the `message` field plus every other
/// field in recording order.
struct EventState {
    message: Option<String>,
    properties: Vec<Property>,
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => f.write_str(message),
            None => write_pairs(f, &self.properties),
        }
    }
}

impl StateValues for EventState {
    fn properties(&self) -> Option<Vec<Property>> {
        Some(self.properties.clone())
    }
}

fn write_pairs(f: &mut fmt::Formatter<'_>, properties: &[Property]) -> fmt::Result {
    for (i, (key, value)) in properties.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{}={}", key, render_value(value))?;
    }
    Ok(())
}

/// Owned copy of an error recorded through [`Visit::record_error`],
/// including its `source()` chain.
#[derive(Debug, Clone)]
pub struct RecordedError {
    message: String,
    source: Option<Box<RecordedError>>,
}

impl RecordedError {
    pub fn capture(error: &(dyn Error + 'static)) -> Self {
        RecordedError {
            message: error.to_string(),
            source: error.source().map(|source| Box::new(RecordedError::capture(source))),
        }
    }
}

impl fmt::Display for RecordedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for RecordedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|source| source as &(dyn Error + 'static))
    }
}

/// Collects fields in recording order. For events, `message`, the event id
/// fields and the first error are pulled out of the property list.
struct FieldVisitor {
    lift_event_fields: bool,
    message: Option<String>,
    properties: Vec<Property>,
    event_id: Option<i32>,
    event_name: Option<String>,
    error: Option<Exception>,
}

impl FieldVisitor {
    fn for_event() -> Self {
        FieldVisitor {
            lift_event_fields: true,
            message: None,
            properties: Vec::new(),
            event_id: None,
            event_name: None,
            error: None,
        }
    }

    fn for_span() -> Self {
        FieldVisitor {
            lift_event_fields: false,
            ..FieldVisitor::for_event()
        }
    }

    fn push(&mut self, field: &Field, value: Value) {
        if self.lift_event_fields {
            match field.name() {
                "message" => {
                    self.message = Some(render_value(&value));
                    return;
                }
                EVENT_ID_FIELD => {
                    if let Some(id) = value.as_i64().and_then(|id| i32::try_from(id).ok()) {
                        self.event_id = Some(id);
                        return;
                    }
                }
                EVENT_NAME_FIELD => {
                    self.event_name = Some(render_value(&value));
                    return;
                }
                _ => {}
            }
        }
        self.properties.push((field.name().to_string(), value));
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::from(value));
    }

    fn record_i128(&mut self, field: &Field, value: i128) {
        match i64::try_from(value) {
            Ok(value) => self.push(field, Value::from(value)),
            Err(_) => self.push(field, Value::String(value.to_string())),
        }
    }

    fn record_u128(&mut self, field: &Field, value: u128) {
        match u64::try_from(value) {
            Ok(value) => self.push(field, Value::from(value)),
            Err(_) => self.push(field, Value::String(value.to_string())),
        }
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if self.lift_event_fields && self.error.is_none() {
            self.error = Some(Exception::new(RecordedError::capture(value)));
            return;
        }
        self.push(field, Value::String(value.to_string()));
    }

    // `message` arrives here as `fmt::Arguments`, whose Debug output is the
    // formatted text.
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, Value::String(format!("{:?}", value)));
    }
}
