use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

/// Reserved property key carrying the unsubstituted message template of a
/// state (see [`LogState::original_format`]).
pub const ORIGINAL_FORMAT_KEY: &str = "{OriginalFormat}";

/// A single structured property: key and value, in the order the state
/// produced them. Keys are not required to be unique.
pub type Property = (String, Value);

/// Capability shared by everything that can be captured as log state or as
/// a scope frame.
///
/// A state is always renderable as text (`Display`) and may additionally
/// expose an ordered list of key/value pairs. Normalization into a
/// [`LogState`] only goes through this trait, so custom payloads take part
/// by implementing it; there is no per-type special casing.
pub trait StateValues: fmt::Display {
    /// Message text of the state. Defaults to the `Display` output.
    fn render(&self) -> String {
        self.to_string()
    }

    /// Ordered key/value view of the state, or `None` when the state is not
    /// a key/value collection.
    fn properties(&self) -> Option<Vec<Property>> {
        None
    }
}

/// Immutable, normalized snapshot of one state frame: either the primary
/// state of a log call or one of its active scopes.
#[derive(Debug, Clone, Serialize)]
pub struct LogState {
    message: String,
    properties: Vec<Property>,
    #[serde(skip_serializing_if = "String::is_empty")]
    original_format: String,
}

impl LogState {
    /// Build a state from an already rendered message and its properties.
    ///
    /// `original_format` is derived from the *last* property keyed
    /// [`ORIGINAL_FORMAT_KEY`], or left empty when there is none.
    pub fn new(message: impl Into<String>, properties: Vec<Property>) -> Self {
        let original_format = properties
            .iter()
            .rev()
            .find(|(key, _)| key == ORIGINAL_FORMAT_KEY)
            .map(|(_, value)| match value {
                Value::Null => String::new(),
                other => render_value(other),
            })
            .unwrap_or_default();

        LogState {
            message: message.into(),
            properties,
            original_format,
        }
    }

    /// Shared state used when a log call carries no state at all.
    pub fn empty() -> &'static LogState {
        static EMPTY: OnceLock<LogState> = OnceLock::new();
        EMPTY.get_or_init(|| LogState::new(String::new(), Vec::new()))
    }

    /// Normalize an arbitrary state object.
    ///
    /// The message is [`StateValues::render`]; properties are copied
    /// verbatim (order and duplicates preserved) when the object exposes a
    /// key/value view, otherwise the list is empty. Never fails.
    pub fn from_state<S: StateValues + ?Sized>(state: &S) -> Self {
        LogState::new(state.render(), state.properties().unwrap_or_default())
    }

    /// Rendered text of the frame.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Properties in their original order.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Unsubstituted template the message was rendered from, or `""`.
    pub fn original_format(&self) -> &str {
        &self.original_format
    }

    /// Value of the last property named `key`.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Split the state back into message and properties.
    pub fn into_parts(self) -> (String, Vec<Property>) {
        (self.message, self.properties)
    }
}

// `original_format` is derived from `properties` and takes no part in identity.
impl PartialEq for LogState {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message && self.properties == other.properties
    }
}

impl fmt::Display for LogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StateValues for LogState {
    fn properties(&self) -> Option<Vec<Property>> {
        Some(self.properties.clone())
    }
}

impl StateValues for str {}

impl StateValues for String {}

/// JSON values render like template arguments (see [`render_value`]), so a
/// string state has no quotes. Objects expose their members as properties in
/// the map's iteration order.
impl StateValues for Value {
    fn render(&self) -> String {
        render_value(self)
    }

    fn properties(&self) -> Option<Vec<Property>> {
        match self {
            Value::Object(map) => Some(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// Ordered list of key/value pairs usable directly as a state or scope.
///
/// Renders as `Key: Value, Key2: Value2`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyList(Vec<Property>);

impl PropertyList {
    pub fn new() -> Self {
        PropertyList(Vec::new())
    }

    /// Append a pair and return the list, for chained construction.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for PropertyList
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        PropertyList(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl fmt::Display for PropertyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: ", key)?;
            write_value(f, value)?;
        }
        Ok(())
    }
}

impl StateValues for PropertyList {
    fn properties(&self) -> Option<Vec<Property>> {
        Some(self.0.clone())
    }
}

/// Render a property value the way it appears inside a message.
///
/// Strings are written without quotes, `null` as `(null)`, arrays as their
/// rendered elements separated by `", "`. Numbers, booleans and objects use
/// their JSON text.
pub fn render_value(value: &Value) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_value(&mut out, value);
    out
}

pub(crate) fn write_value<W: fmt::Write + ?Sized>(out: &mut W, value: &Value) -> fmt::Result {
    match value {
        Value::Null => out.write_str("(null)"),
        Value::String(s) => out.write_str(s),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write_value(out, item)?;
            }
            Ok(())
        }
        other => write!(out, "{}", other),
    }
}
