use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A mimetype → value mapping carried by `display_data` and
/// `execute_result` outputs.
pub type MimeBundle = Map<String, Value>;

/// A notebook document: an ordered sequence of [`Cell`]s.
///
/// Position is the only identity a cell has: there are no persistent cell
/// IDs the change-detection engine relies on, and `cells.len()` is the
/// authoritative document length.
///
/// Everything besides `cells` is carried along untouched so that a
/// notebook survives a read/write cycle through the snapshot store.
///
/// # JSON shape
///
/// ```json
/// {
///   "cells": [
///     { "cell_type": "markdown", "metadata": {}, "source": "# Title" },
///     { "cell_type": "code", "metadata": {}, "source": "print(1)",
///       "execution_count": 1,
///       "outputs": [ { "output_type": "stream", "name": "stdout", "text": "1\n" } ] }
///   ],
///   "metadata": {},
///   "nbformat": 4,
///   "nbformat_minor": 4
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default = "default_nbformat")]
    pub nbformat: u32,
    #[serde(default = "default_nbformat_minor")]
    pub nbformat_minor: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_nbformat() -> u32 {
    4
}

fn default_nbformat_minor() -> u32 {
    4
}

/// The kind of a [`Cell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Markdown,
    Code,
    Raw,
}

impl std::fmt::Display for CellType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellType::Markdown => write!(f, "markdown"),
            CellType::Code => write!(f, "code"),
            CellType::Raw => write!(f, "raw"),
        }
    }
}

/// One cell of a [`Notebook`].
///
/// `outputs` is only meaningful for [`CellType::Code`]. It is kept as an
/// `Option` so that a code cell missing the field can be told apart from one
/// with no outputs; the diff engine reports the former as malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub cell_type: CellType,
    #[serde(deserialize_with = "multiline::text")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<Output>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// `execution_count`, `attachments`, `id` and anything else.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `output_type` discriminator of an [`Output`].
///
/// Types outside the four known kinds are kept as [`OutputType::Other`]
/// so that such documents still load; they carry no comparable payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutputType {
    Stream,
    DisplayData,
    ExecuteResult,
    Error,
    Other(String),
}

impl OutputType {
    pub fn as_str(&self) -> &str {
        match self {
            OutputType::Stream => "stream",
            OutputType::DisplayData => "display_data",
            OutputType::ExecuteResult => "execute_result",
            OutputType::Error => "error",
            OutputType::Other(s) => s,
        }
    }

    /// The field that holds this type's comparable payload, if any.
    pub fn payload_field(&self) -> Option<&'static str> {
        match self {
            OutputType::Stream => Some("text"),
            OutputType::DisplayData | OutputType::ExecuteResult => Some("data"),
            OutputType::Error => Some("evalue"),
            OutputType::Other(_) => None,
        }
    }
}

impl From<String> for OutputType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "stream" => OutputType::Stream,
            "display_data" => OutputType::DisplayData,
            "execute_result" => OutputType::ExecuteResult,
            "error" => OutputType::Error,
            _ => OutputType::Other(s),
        }
    }
}

impl From<OutputType> for String {
    fn from(t: OutputType) -> Self {
        match t {
            OutputType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for OutputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed result attached to a code cell's execution.
///
/// Only the payload field belonging to `output_type` takes part in
/// equality (see [`Output::payload`]); `name`, `metadata`,
/// `execution_count`, `ename` and `traceback` live in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub output_type: OutputType,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "multiline::optional_text"
    )]
    pub text: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "multiline::optional_bundle"
    )]
    pub data: Option<MimeBundle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evalue: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The comparable part of an [`Output`], borrowed from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputPayload<'a> {
    Stream(&'a str),
    Data(&'a MimeBundle),
    Error(&'a str),
    /// Output kinds with no defined payload compare equal by type alone.
    None,
}

// ============================================================================
// Convenience methods
// ============================================================================

impl Notebook {
    /// Create a notebook holding the given cells.
    pub fn new(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            metadata: Map::new(),
            nbformat: default_nbformat(),
            nbformat_minor: default_nbformat_minor(),
            extra: Map::new(),
        }
    }

    /// Parse a notebook from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Cell {
    fn with_type(cell_type: CellType, source: impl Into<String>) -> Self {
        Self {
            cell_type,
            source: source.into(),
            outputs: None,
            metadata: Map::new(),
            extra: Map::new(),
        }
    }

    /// Create a code cell with no outputs and no execution count.
    pub fn code(source: impl Into<String>) -> Self {
        let mut cell = Self::with_type(CellType::Code, source);
        cell.outputs = Some(Vec::new());
        cell.extra.insert("execution_count".into(), Value::Null);
        cell
    }

    pub fn markdown(source: impl Into<String>) -> Self {
        Self::with_type(CellType::Markdown, source)
    }

    pub fn raw(source: impl Into<String>) -> Self {
        Self::with_type(CellType::Raw, source)
    }

    /// Append an output. Only meaningful for code cells.
    pub fn with_output(mut self, output: Output) -> Self {
        self.outputs.get_or_insert_with(Vec::new).push(output);
        self
    }

    /// The cell's outputs, empty for cells without an `outputs` field.
    pub fn outputs(&self) -> &[Output] {
        self.outputs.as_deref().unwrap_or(&[])
    }
}

impl Output {
    fn with_type(output_type: OutputType) -> Self {
        Self {
            output_type,
            text: None,
            data: None,
            evalue: None,
            extra: Map::new(),
        }
    }

    /// A `stream` output on the named stream (`stdout` / `stderr`).
    pub fn stream(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut out = Self::with_type(OutputType::Stream);
        out.text = Some(text.into());
        out.extra.insert("name".into(), Value::String(name.into()));
        out
    }

    pub fn display_data(data: MimeBundle) -> Self {
        let mut out = Self::with_type(OutputType::DisplayData);
        out.data = Some(data);
        out.extra.insert("metadata".into(), Value::Object(Map::new()));
        out
    }

    pub fn execute_result(data: MimeBundle, execution_count: u32) -> Self {
        let mut out = Self::display_data(data);
        out.output_type = OutputType::ExecuteResult;
        out.extra
            .insert("execution_count".into(), Value::from(execution_count));
        out
    }

    pub fn error(ename: impl Into<String>, evalue: impl Into<String>) -> Self {
        let mut out = Self::with_type(OutputType::Error);
        out.evalue = Some(evalue.into());
        out.extra.insert("ename".into(), Value::String(ename.into()));
        out.extra.insert("traceback".into(), Value::Array(Vec::new()));
        out
    }

    /// The payload that participates in equality for this output's type.
    ///
    /// Returns `None` when the field required by `output_type` is absent.
    pub fn payload(&self) -> Option<OutputPayload<'_>> {
        match &self.output_type {
            OutputType::Stream => self.text.as_deref().map(OutputPayload::Stream),
            OutputType::DisplayData | OutputType::ExecuteResult => {
                self.data.as_ref().map(OutputPayload::Data)
            }
            OutputType::Error => self.evalue.as_deref().map(OutputPayload::Error),
            OutputType::Other(_) => Some(OutputPayload::None),
        }
    }
}

/// Stored notebooks may split multi-line strings into arrays of lines.
/// These helpers join them back on read, the same way the notebook
/// format's own reader does.
mod multiline {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Multiline {
        Single(String),
        Lines(Vec<String>),
    }

    impl Multiline {
        fn join(self) -> String {
            match self {
                Multiline::Single(s) => s,
                Multiline::Lines(lines) => lines.concat(),
            }
        }
    }

    pub(super) fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(Multiline::deserialize(d)?.join())
    }

    pub(super) fn optional_text<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(Option::<Multiline>::deserialize(d)?.map(Multiline::join))
    }

    pub(super) fn optional_bundle<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<MimeBundle>, D::Error> {
        let Some(mut bundle) = Option::<MimeBundle>::deserialize(d)? else {
            return Ok(None);
        };
        for (mime, value) in bundle.iter_mut() {
            if is_json_mime(mime) {
                continue;
            }
            if let Value::Array(items) = value
                && items.iter().all(Value::is_string)
            {
                let joined: String = items.iter().filter_map(Value::as_str).collect();
                *value = Value::String(joined);
            }
        }
        Ok(Some(bundle))
    }

    fn is_json_mime(mime: &str) -> bool {
        mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
    }
}
