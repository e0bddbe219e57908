//! Line templates for log records, in the `{{ .Path | func }}` style.
//!
//! A template is parsed once and rendered per record. Field paths and
//! function names are checked at parse time; applying a function to a value
//! of the wrong kind only fails the record being rendered.

use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::TemplateError;
use crate::model::{AttributeValue, Attributes, LogRecord, Resource, Timestamp};

/// Format used when the `format` parameter is present but empty.
pub const DEFAULT_FORMAT: &str = "{{ .LogRecord.Timestamp | iso8601 }} {{.LogRecord.Body.AsString }} {{ .LogRecord.Attributes | mapToString }} {{ .Resource.Attributes | mapToString }}";

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Timestamp,
    ObservedTimestamp,
    Body,
    BodyAsString,
    SeverityText,
    SeverityNumber,
    LogAttributes,
    ResourceAttributes,
}

impl Field {
    fn parse(path: &str) -> Result<Self, TemplateError> {
        let field = match path {
            ".LogRecord.Timestamp" => Field::Timestamp,
            ".LogRecord.ObservedTimestamp" => Field::ObservedTimestamp,
            ".LogRecord.Body" => Field::Body,
            ".LogRecord.Body.AsString" => Field::BodyAsString,
            ".LogRecord.SeverityText" => Field::SeverityText,
            ".LogRecord.SeverityNumber" => Field::SeverityNumber,
            ".LogRecord.Attributes" => Field::LogAttributes,
            ".Resource.Attributes" => Field::ResourceAttributes,
            other => return Err(TemplateError::UnknownField(other.to_string())),
        };
        Ok(field)
    }

    fn resolve<'a>(&self, resource: &'a Resource, record: &'a LogRecord) -> Value<'a> {
        match self {
            Field::Timestamp => Value::Timestamp(record.timestamp),
            Field::ObservedTimestamp => Value::Timestamp(record.observed_timestamp),
            Field::Body => Value::Any(&record.body),
            Field::BodyAsString => Value::Text(record.body.as_display_string()),
            Field::SeverityText => Value::Text(record.severity_text.clone()),
            Field::SeverityNumber => Value::Int(i64::from(record.severity_number)),
            Field::LogAttributes => Value::Attributes(&record.attributes),
            Field::ResourceAttributes => Value::Attributes(&resource.attributes),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Function {
    Epoch,
    Iso8601,
    MapToString,
}

impl Function {
    fn parse(name: &str) -> Result<Self, TemplateError> {
        match name {
            "epoch" => Ok(Function::Epoch),
            "iso8601" => Ok(Function::Iso8601),
            "mapToString" => Ok(Function::MapToString),
            other => Err(TemplateError::UnknownFunction(other.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Function::Epoch => "epoch",
            Function::Iso8601 => "iso8601",
            Function::MapToString => "mapToString",
        }
    }

    fn apply<'a>(&self, value: Value<'a>) -> Result<Value<'a>, TemplateError> {
        match (self, value) {
            (Function::Epoch, Value::Timestamp(ts)) => Ok(Value::Int(ts.as_epoch_seconds())),
            (Function::Iso8601, Value::Timestamp(ts)) => Ok(Value::Text(ts.to_rfc3339())),
            (Function::MapToString, Value::Attributes(attrs)) => {
                let mut out = String::new();
                for (key, value) in attrs.iter() {
                    out.push_str(key);
                    out.push(':');
                    out.push_str(&value.as_display_string());
                }
                Ok(Value::Text(out))
            }
            (function, other) => Err(TemplateError::WrongArgument {
                function: function.name(),
                expected: match function {
                    Function::Epoch | Function::Iso8601 => "timestamp",
                    Function::MapToString => "attributes",
                },
                actual: other.kind(),
            }),
        }
    }
}

/// Intermediate value while evaluating a pipeline.
enum Value<'a> {
    Timestamp(Timestamp),
    Text(String),
    Int(i64),
    Attributes(&'a Attributes),
    Any(&'a AttributeValue),
}

impl Value<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Value::Timestamp(_) => "timestamp",
            Value::Text(_) => "string",
            Value::Int(_) => "integer",
            Value::Attributes(_) => "attributes",
            Value::Any(_) => "value",
        }
    }

    fn write_to(&self, out: &mut String) {
        match self {
            // Bare timestamps print as epoch nanoseconds.
            Value::Timestamp(ts) => {
                let _ = write!(out, "{}", ts.0);
            }
            Value::Text(s) => out.push_str(s),
            Value::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Value::Attributes(attrs) => out.push_str(&attrs.to_json().to_string()),
            Value::Any(value) => out.push_str(&value.as_display_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Action {
    field: Field,
    functions: Vec<Function>,
}

impl Action {
    /// Accepts `.Path | f | g` and the call form `f .Path | g`.
    fn parse(source: &str, offset: usize) -> Result<Self, TemplateError> {
        let mut stages = source.split('|').map(str::trim);
        let head = stages.next().unwrap_or_default();
        if head.is_empty() {
            return Err(TemplateError::EmptyAction(offset));
        }

        let tokens: Vec<&str> = head.split_whitespace().collect();
        let (field, mut functions) = match tokens.as_slice() {
            [path] => (Field::parse(path)?, Vec::new()),
            [function, path] if path.starts_with('.') => {
                (Field::parse(path)?, vec![Function::parse(function)?])
            }
            _ => {
                return Err(TemplateError::Malformed {
                    offset,
                    reason: format!("cannot parse {head:?}"),
                })
            }
        };

        for stage in stages {
            if stage.is_empty() || stage.contains(char::is_whitespace) {
                return Err(TemplateError::Malformed {
                    offset,
                    reason: format!("expected a function name after '|', got {stage:?}"),
                });
            }
            functions.push(Function::parse(stage)?);
        }

        Ok(Self { field, functions })
    }

    fn render(
        &self,
        resource: &Resource,
        record: &LogRecord,
        out: &mut String,
    ) -> Result<(), TemplateError> {
        let mut value = self.field.resolve(resource, record);
        for function in &self.functions {
            value = function.apply(value)?;
        }
        value.write_to(out);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Text(String),
    Action(Action),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;
        let mut trim_next = false;

        while let Some(start) = rest.find(OPEN) {
            let mut text = &rest[..start];
            if trim_next {
                text = text.trim_start();
            }

            let inner_start = start + OPEN.len();
            let Some(len) = rest[inner_start..].find(CLOSE) else {
                return Err(TemplateError::Unclosed(offset + start));
            };
            let mut inner = &rest[inner_start..inner_start + len];

            // `{{-` and `-}}` trim the whitespace on that side.
            if let Some(stripped) = inner.strip_prefix('-') {
                if stripped.starts_with(char::is_whitespace) {
                    text = text.trim_end();
                    inner = stripped;
                }
            }
            trim_next = false;
            if let Some(stripped) = inner.strip_suffix('-') {
                if stripped.ends_with(char::is_whitespace) {
                    trim_next = true;
                    inner = stripped;
                }
            }

            if !text.is_empty() {
                segments.push(Segment::Text(text.to_string()));
            }
            segments.push(Segment::Action(Action::parse(inner, offset + start)?));

            let consumed = inner_start + len + CLOSE.len();
            rest = &rest[consumed..];
            offset += consumed;
        }

        let tail = if trim_next { rest.trim_start() } else { rest };
        if !tail.is_empty() {
            segments.push(Segment::Text(tail.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders one record. On error nothing useful is left in `out`.
    pub fn render_into(
        &self,
        resource: &Resource,
        record: &LogRecord,
        out: &mut String,
    ) -> Result<(), TemplateError> {
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Action(action) => action.render(resource, record, out)?,
            }
        }
        Ok(())
    }

    pub fn render(&self, resource: &Resource, record: &LogRecord) -> Result<String, TemplateError> {
        let mut out = String::new();
        self.render_into(resource, record, &mut out)?;
        Ok(out)
    }
}

impl Default for Template {
    fn default() -> Self {
        Self {
            source: DEFAULT_FORMAT.to_string(),
            segments: vec![
                Segment::Action(Action {
                    field: Field::Timestamp,
                    functions: vec![Function::Iso8601],
                }),
                Segment::Text(" ".to_string()),
                Segment::Action(Action {
                    field: Field::BodyAsString,
                    functions: Vec::new(),
                }),
                Segment::Text(" ".to_string()),
                Segment::Action(Action {
                    field: Field::LogAttributes,
                    functions: vec![Function::MapToString],
                }),
                Segment::Text(" ".to_string()),
                Segment::Action(Action {
                    field: Field::ResourceAttributes,
                    functions: vec![Function::MapToString],
                }),
            ],
        }
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Template::parse(s)
    }
}
