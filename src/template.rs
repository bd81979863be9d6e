use crate::state::{render_value, Property, StateValues, ORIGINAL_FORMAT_KEY};
use serde_json::Value;
use std::fmt;

/// Message template plus positional arguments, as produced by a structured
/// log call such as `"{Arg1}, {Arg2}"` with `15, "SomeText"`.
///
/// Holes are written `{Name}`, `{Name,alignment}` or `{Name:format}`. They
/// bind to the arguments by position, in order of appearance; a name that
/// appears twice is two holes. `{{` and `}}` are literal braces. The format
/// part of a hole is accepted and ignored.
///
/// As a state it renders the substituted message and exposes one property
/// per hole followed by the template itself under
/// [`ORIGINAL_FORMAT_KEY`].
#[derive(Debug, Clone)]
pub struct FormattedLogValues {
    template: String,
    values: Vec<Value>,
    segments: Vec<Segment>,
    names: Vec<String>,
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Hole {
        index: usize,
        alignment: Option<i32>,
        raw: String,
    },
}

impl FormattedLogValues {
    /// Parse `template` and bind `values` to its holes.
    ///
    /// Without arguments the template is kept verbatim, escapes included.
    pub fn new(template: impl Into<String>, values: Vec<Value>) -> Self {
        let template = template.into();
        let (segments, names) = if values.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            parse(&template)
        };

        FormattedLogValues {
            template,
            values,
            segments,
            names,
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Hole names in order of appearance.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl fmt::Display for FormattedLogValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.values.is_empty() {
            return f.write_str(&self.template);
        }

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::Hole {
                    index,
                    alignment,
                    raw,
                } => match self.values.get(*index) {
                    Some(value) => write_aligned(f, &render_value(value), *alignment)?,
                    // Missing argument: leave the hole as written.
                    None => f.write_str(raw)?,
                },
            }
        }
        Ok(())
    }
}

impl StateValues for FormattedLogValues {
    fn properties(&self) -> Option<Vec<Property>> {
        let mut properties: Vec<Property> = self
            .names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value = self.values.get(i).cloned().unwrap_or(Value::Null);
                (name.clone(), value)
            })
            .collect();
        properties.push((
            ORIGINAL_FORMAT_KEY.to_string(),
            Value::String(self.template.clone()),
        ));
        Some(properties)
    }
}

fn write_aligned(f: &mut fmt::Formatter<'_>, text: &str, alignment: Option<i32>) -> fmt::Result {
    let Some(alignment) = alignment else {
        return f.write_str(text);
    };

    let width = alignment.unsigned_abs() as usize;
    let pad = width.saturating_sub(text.chars().count());
    if alignment < 0 {
        f.write_str(text)?;
        write!(f, "{:pad$}", "", pad = pad)
    } else {
        write!(f, "{:pad$}", "", pad = pad)?;
        f.write_str(text)
    }
}

fn parse(template: &str) -> (Vec<Segment>, Vec<String>) {
    let mut segments = Vec::new();
    let mut names = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        literal.push_str(&rest[..pos]);
        let brace = if rest[pos..].starts_with('{') { '{' } else { '}' };
        let after = &rest[pos + 1..];

        // Escaped brace, or a stray closing brace kept as text.
        if after.starts_with(brace) {
            literal.push(brace);
            rest = &after[1..];
            continue;
        }
        if brace == '}' {
            literal.push('}');
            rest = after;
            continue;
        }

        let Some(end) = after.find('}') else {
            // Unclosed hole: the remainder is literal text.
            literal.push_str(&rest[pos..]);
            rest = "";
            break;
        };

        let hole = &after[..end];
        let (name, alignment) = split_hole(hole);
        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Hole {
            index: names.len(),
            alignment,
            raw: format!("{{{}}}", hole),
        });
        names.push(name.to_string());
        rest = &after[end + 1..];
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    (segments, names)
}

fn split_hole(hole: &str) -> (&str, Option<i32>) {
    let name_end = hole.find([',', ':']).unwrap_or(hole.len());
    let alignment = hole[name_end..]
        .strip_prefix(',')
        .and_then(|align| align.split(':').next())
        .and_then(|align| align.trim().parse().ok());
    (hole[..name_end].trim(), alignment)
}

/// Build a [`FormattedLogValues`] from a template and any arguments
/// convertible into `serde_json::Value`.
///
/// ```
/// use tracing_memory_sink::log_values;
///
/// let values = log_values!("{Arg1}, {Arg2}", 15, "SomeText");
/// assert_eq!(values.to_string(), "15, SomeText");
/// ```
#[macro_export]
macro_rules! log_values {
    ($template:expr $(, $arg:expr)* $(,)?) => {
        $crate::template::FormattedLogValues::new(
            $template,
            ::std::vec![$($crate::__private::Value::from($arg)),*],
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LogState;
    use serde_json::json;

    #[test]
    fn renders_positional_arguments() {
        let values = log_values!("{Arg1}, {Arg2}", 15, "SomeText");
        let state = LogState::from_state(&values);

        assert_eq!(state.message(), "15, SomeText");
        assert_eq!(
            state.properties(),
            &[
                ("Arg1".to_string(), json!(15)),
                ("Arg2".to_string(), json!("SomeText")),
                (ORIGINAL_FORMAT_KEY.to_string(), json!("{Arg1}, {Arg2}")),
            ][..]
        );
        assert_eq!(state.original_format(), "{Arg1}, {Arg2}");
    }

    #[test]
    fn without_arguments_template_is_verbatim() {
        let values = log_values!("Done {{x}} {Name}");
        let state = LogState::from_state(&values);

        assert_eq!(state.message(), "Done {{x}} {Name}");
        assert_eq!(state.properties().len(), 1);
        assert_eq!(state.original_format(), "Done {{x}} {Name}");
    }

    #[test]
    fn escaped_braces_are_unescaped() {
        let values = log_values!("{{literal}} {Value} }}", 1);
        assert_eq!(values.to_string(), "{literal} 1 }");
        assert_eq!(values.names(), &["Value".to_string()][..]);
    }

    #[test]
    fn repeated_name_binds_twice() {
        let values = log_values!("{A} then {A}", 1, 2);
        assert_eq!(values.to_string(), "1 then 2");
        let properties = values.properties().unwrap_or_default();
        assert_eq!(properties[0], ("A".to_string(), json!(1)));
        assert_eq!(properties[1], ("A".to_string(), json!(2)));
    }

    #[test]
    fn alignment_pads_and_format_is_ignored() {
        let values = log_values!("[{Left,-5}][{Right,5}][{Price:F2}]", "ab", "cd", 3);
        assert_eq!(values.to_string(), "[ab   ][   cd][3]");
        assert_eq!(
            values.names(),
            &["Left".to_string(), "Right".to_string(), "Price".to_string()][..]
        );
    }

    #[test]
    fn missing_arguments_keep_hole_and_bind_null() {
        let values = log_values!("{First} and {Second}", "one");
        assert_eq!(values.to_string(), "one and {Second}");
        let properties = values.properties().unwrap_or_default();
        assert_eq!(properties[1], ("Second".to_string(), Value::Null));
        assert_eq!(properties.len(), 3);
    }

    #[test]
    fn surplus_arguments_are_ignored() {
        let values = log_values!("{Only}", 1, 2, 3);
        assert_eq!(values.to_string(), "1");
        assert_eq!(values.properties().map(|p| p.len()), Some(2));
    }

    #[test]
    fn unclosed_hole_is_literal() {
        let values = log_values!("{Name} is {unclosed", "x");
        assert_eq!(values.to_string(), "x is {unclosed");
        assert_eq!(values.names().len(), 1);
    }

    #[test]
    fn array_arguments_render_as_list() {
        let values = log_values!("ids: {Ids}", json!([1, 2, 3]));
        assert_eq!(values.to_string(), "ids: 1, 2, 3");
    }
}
