//! Compiled representation of a template source.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::Result;

/// Key of the un-named body of a template.
pub const DEFAULT_SECTION: &str = "@main";

/// Map key of the user-named section `name`.
///
/// Names starting with `@` get one more `@`, so no `@section` directive can
/// produce [`DEFAULT_SECTION`].
pub fn section_key(name: &str) -> Cow<'_, str> {
    if name.starts_with('@') {
        Cow::Owned(format!("@{}", name))
    } else {
        Cow::Borrowed(name)
    }
}

/// Metadata of one compiled template, persisted as its sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Canonical absolute path of the source file
    pub source_path: PathBuf,
    /// Nanoseconds since the Unix epoch, captured before the source was read
    pub source_mod_time: u64,
    /// Section name -> compiled body file
    pub sections: IndexMap<String, PathBuf>,
    /// `@value` name -> literal payload
    pub values: IndexMap<String, String>,
    /// Canonical paths of directly included sources
    #[serde(default)]
    pub includes: Vec<PathBuf>,
    /// Sources still being compiled further up the include chain whose
    /// contents this artifact could not see. Non-empty means the artifact
    /// is partial: it lacks entries it gets when its source is requested on
    /// its own.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cycle_cuts: Vec<PathBuf>,
}

impl Artifact {
    pub fn new(source_path: PathBuf, source_mod_time: u64) -> Self {
        Self {
            source_path,
            source_mod_time,
            sections: IndexMap::new(),
            values: IndexMap::new(),
            includes: Vec::new(),
            cycle_cuts: Vec::new(),
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.cycle_cuts.is_empty()
    }

    /// Records that the include of `source` was skipped to break a cycle.
    pub fn cut_cycle(&mut self, source: &Path) {
        if !self.cycle_cuts.iter().any(|cut| cut == source) {
            self.cycle_cuts.push(source.to_path_buf());
        }
    }

    /// Adds the sections and values of an included artifact without
    /// replacing anything already present.
    ///
    /// Cycle cuts of the included artifact carry over to this one.
    pub fn merge_missing(&mut self, included: &Artifact) {
        for (name, location) in &included.sections {
            self.sections
                .entry(name.clone())
                .or_insert_with(|| location.clone());
        }
        for (name, value) in &included.values {
            self.values.entry(name.clone()).or_insert_with(|| value.clone());
        }
        for cut in &included.cycle_cuts {
            self.cut_cycle(cut);
        }
    }

    /// Closes the cycles that started at this artifact's own source.
    pub fn close_cycles(&mut self) {
        let source = self.source_path.clone();
        self.cycle_cuts.retain(|cut| *cut != source);
    }
}

/// Reads the modification time of `path` in the unit stored in sidecars.
pub fn modified_time(path: &Path) -> Result<u64> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0))
}

/// Text of one section together with the blank lines that precede it in the
/// compiled unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionBody {
    pub padding: usize,
    pub text: String,
}

const PADDING_OPEN: &str = "{#";
const PADDING_CLOSE: &str = "#}";

impl SectionBody {
    pub fn new(padding: usize, text: impl Into<String>) -> Self {
        Self {
            padding,
            text: text.into(),
        }
    }

    /// Compiled unit: a template comment holding `padding` newlines, then
    /// the text. The comment renders to nothing, so the text keeps its
    /// original line numbers.
    pub fn encode(&self) -> String {
        let capacity = PADDING_OPEN.len() + self.padding + PADDING_CLOSE.len() + self.text.len();
        let mut unit = String::with_capacity(capacity);
        unit.push_str(PADDING_OPEN);
        unit.extend(std::iter::repeat('\n').take(self.padding));
        unit.push_str(PADDING_CLOSE);
        unit.push_str(&self.text);
        unit
    }

    /// Inverse of [`SectionBody::encode`]; `None` if `unit` lacks the header.
    pub fn decode(unit: &str) -> Option<Self> {
        let rest = unit.strip_prefix(PADDING_OPEN)?;
        let padding = rest.bytes().take_while(|b| *b == b'\n').count();
        let text = rest[padding..].strip_prefix(PADDING_CLOSE)?;
        Some(Self::new(padding, text))
    }
}
