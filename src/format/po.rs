//! Gettext PO files
//!
//! Parsing keeps everything the spreadsheet round trip needs: contexts
//! (unset vs. empty), plurals, all comment kinds, previous strings and
//! obsolete entries. Writing never wraps lines.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{TransyncError, TransyncResult};

use super::{FileFormat, FormatKind, StoreUnit, TranslationStore};

/// Upper bound on `msgstr[N]` forms; no language comes close
const MAX_PLURAL_FORMS: usize = 16;

/// Parsed PO file: header fields plus entries in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoFile {
    /// Comment lines above the header entry, without the leading `# `
    pub header_comment: Vec<String>,
    pub metadata: Vec<(String, String)>,
    pub units: Vec<StoreUnit>,
}

impl PoFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_units(units: Vec<StoreUnit>) -> Self {
        Self {
            units,
            ..Default::default()
        }
    }

    pub fn open(path: &Path) -> TransyncResult<Self> {
        if !path.exists() {
            return Err(TransyncError::MissingFile(path.to_path_buf()));
        }
        let bytes = fs::read(path)?;
        let content = decode(&bytes).map_err(|e| TransyncError::parse(path, e))?;
        Self::parse(&content).map_err(|e| TransyncError::parse(path, e))
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        Parser::default().run(content)
    }

    pub fn save(&self, path: &Path) -> TransyncResult<()> {
        fs::write(path, self.to_po_string())?;
        Ok(())
    }

    pub fn metadata_value(&self, name: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_metadata(&mut self, name: &str, value: &str) {
        match self.metadata.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.metadata.push((name.to_string(), value.to_string())),
        }
    }

    /// Non-obsolete entries
    pub fn entries(&self) -> impl Iterator<Item = &StoreUnit> {
        self.units.iter().filter(|u| !u.obsolete)
    }

    pub fn obsolete_entries(&self) -> impl Iterator<Item = &StoreUnit> {
        self.units.iter().filter(|u| u.obsolete)
    }

    pub fn to_po_string(&self) -> String {
        let mut out = String::new();
        for line in &self.header_comment {
            push_comment(&mut out, "#", line);
        }
        out.push_str("msgid \"\"\n");
        let header: String = self
            .metadata
            .iter()
            .map(|(key, value)| format!("{}: {}\n", key, value))
            .collect();
        write_keyword(&mut out, "", "msgstr", &header);

        for unit in self.entries().chain(self.obsolete_entries()) {
            out.push('\n');
            write_unit(&mut out, unit);
        }
        out
    }
}

fn decode(bytes: &[u8]) -> Result<String, String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8(bytes.to_vec()).map_err(|e| format!("invalid UTF-8: {}", e))
}

fn push_comment(out: &mut String, marker: &str, text: &str) {
    if text.is_empty() {
        out.push_str(marker);
    } else {
        let _ = write!(out, "{} {}", marker, text);
    }
    out.push('\n');
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// `keyword "value"`, split after embedded newlines
fn write_keyword(out: &mut String, prefix: &str, keyword: &str, value: &str) {
    let trimmed = value.strip_suffix('\n').unwrap_or(value);
    if trimmed.contains('\n') {
        let _ = writeln!(out, "{}{} \"\"", prefix, keyword);
        for segment in value.split_inclusive('\n') {
            let _ = writeln!(out, "{}\"{}\"", prefix, escape(segment));
        }
    } else {
        let _ = writeln!(out, "{}{} \"{}\"", prefix, keyword, escape(value));
    }
}

fn format_occurrence(path: &str, line: &str) -> String {
    if line.is_empty() {
        path.to_string()
    } else {
        format!("{}:{}", path, line)
    }
}

fn write_unit(out: &mut String, unit: &StoreUnit) {
    for line in unit.translator_comment.lines() {
        push_comment(out, "#", line);
    }
    for line in unit.comment.lines() {
        push_comment(out, "#.", line);
    }
    if !unit.occurrences.is_empty() {
        let refs: Vec<String> = unit
            .occurrences
            .iter()
            .map(|(path, line)| format_occurrence(path, line))
            .collect();
        push_comment(out, "#:", &refs.join(" "));
    }
    let mut flags: Vec<&str> = Vec::new();
    if unit.fuzzy {
        flags.push("fuzzy");
    }
    flags.extend(unit.flags.iter().map(String::as_str));
    if !flags.is_empty() {
        push_comment(out, "#,", &flags.join(", "));
    }

    let prefix = if unit.obsolete { "#~ " } else { "" };
    let previous_prefix = if unit.obsolete { "#~| " } else { "#| " };
    if !unit.previous_context.is_empty() {
        write_keyword(out, previous_prefix, "msgctxt", &unit.previous_context);
    }
    if !unit.previous_source.is_empty() {
        write_keyword(out, previous_prefix, "msgid", &unit.previous_source);
    }
    if let Some(context) = &unit.context {
        write_keyword(out, prefix, "msgctxt", context);
    }
    write_keyword(out, prefix, "msgid", &unit.source);
    match &unit.source_plural {
        Some(plural) => {
            write_keyword(out, prefix, "msgid_plural", plural);
            let empty = vec![String::new(); 2];
            let forms = if unit.target.is_empty() {
                &empty
            } else {
                &unit.target
            };
            for (idx, form) in forms.iter().enumerate() {
                write_keyword(out, prefix, &format!("msgstr[{}]", idx), form);
            }
        }
        None => write_keyword(out, prefix, "msgstr", unit.target_text()),
    }
}

/// Which string a continuation line appends to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Context,
    Source,
    SourcePlural,
    Target(usize),
    PreviousContext,
    PreviousSource,
}

#[derive(Default)]
struct Parser {
    file: PoFile,
    current: StoreUnit,
    /// Something was read into `current`
    started: bool,
    /// A msgstr was seen, so the next keyword or comment starts a new entry
    has_target: bool,
    has_source: bool,
    field: Option<Field>,
    header_seen: bool,
}

impl Parser {
    fn run(mut self, content: &str) -> Result<PoFile, String> {
        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            self.line(raw.trim_end_matches('\r'))
                .map_err(|e| format!("line {}: {}", line_no, e))?;
        }
        self.finish_entry()?;
        Ok(self.file)
    }

    fn line(&mut self, raw: &str) -> Result<(), String> {
        let line = raw.trim_start();
        if line.is_empty() {
            return self.finish_entry();
        }

        if let Some(rest) = line.strip_prefix("#~|") {
            self.before_comment()?;
            self.current.obsolete = true;
            return self.previous(rest.trim_start());
        }
        if let Some(rest) = line.strip_prefix("#~") {
            self.keyword(rest.trim_start())?;
            self.current.obsolete = true;
            return Ok(());
        }
        if let Some(rest) = line.strip_prefix("#|") {
            self.before_comment()?;
            return self.previous(rest.trim_start());
        }
        if let Some(rest) = line.strip_prefix("#,") {
            self.before_comment()?;
            for flag in rest.split(',').map(str::trim).filter(|f| !f.is_empty()) {
                if flag == "fuzzy" {
                    self.current.fuzzy = true;
                } else {
                    self.current.flags.push(flag.to_string());
                }
            }
            return Ok(());
        }
        if let Some(rest) = line.strip_prefix("#:") {
            self.before_comment()?;
            for token in rest.split_whitespace() {
                self.current.occurrences.push(split_occurrence(token));
            }
            return Ok(());
        }
        if let Some(rest) = line.strip_prefix("#.") {
            self.before_comment()?;
            append_line(&mut self.current.comment, strip_one_space(rest));
            return Ok(());
        }
        if let Some(rest) = line.strip_prefix('#') {
            self.before_comment()?;
            append_line(&mut self.current.translator_comment, strip_one_space(rest));
            return Ok(());
        }
        self.keyword(line)
    }

    fn before_comment(&mut self) -> Result<(), String> {
        if self.has_source || self.has_target {
            self.finish_entry()?;
        }
        self.started = true;
        Ok(())
    }

    fn previous(&mut self, rest: &str) -> Result<(), String> {
        if let Some(value) = rest.strip_prefix("msgctxt") {
            self.current.previous_context = parse_quoted(value)?;
            self.field = Some(Field::PreviousContext);
        } else if let Some(value) = rest.strip_prefix("msgid_plural") {
            // previous plural source is not tracked
            parse_quoted(value)?;
            self.field = None;
        } else if let Some(value) = rest.strip_prefix("msgid") {
            self.current.previous_source = parse_quoted(value)?;
            self.field = Some(Field::PreviousSource);
        } else if rest.starts_with('"') {
            self.append(rest)?;
        } else {
            return Err(format!("unexpected previous-string line: {}", rest));
        }
        Ok(())
    }

    fn keyword(&mut self, line: &str) -> Result<(), String> {
        if line.starts_with('"') {
            return self.append(line);
        }

        let (keyword, value) = line
            .split_once(|c: char| c.is_whitespace())
            .ok_or_else(|| format!("unexpected line: {}", line))?;

        match keyword {
            "msgctxt" => {
                if self.has_source || self.has_target {
                    self.finish_entry()?;
                }
                self.started = true;
                self.current.context = Some(parse_quoted(value)?);
                self.field = Some(Field::Context);
            }
            "msgid" => {
                if self.has_source || self.has_target {
                    self.finish_entry()?;
                }
                self.started = true;
                self.has_source = true;
                self.current.source = parse_quoted(value)?;
                self.field = Some(Field::Source);
            }
            "msgid_plural" => {
                self.current.source_plural = Some(parse_quoted(value)?);
                self.field = Some(Field::SourcePlural);
            }
            "msgstr" => {
                self.require_source()?;
                self.has_target = true;
                self.current.target = vec![parse_quoted(value)?];
                self.field = Some(Field::Target(0));
            }
            other if other.starts_with("msgstr[") && other.ends_with(']') => {
                self.require_source()?;
                let index: usize = other["msgstr[".len()..other.len() - 1]
                    .parse()
                    .map_err(|_| format!("invalid plural index in {}", other))?;
                if index >= MAX_PLURAL_FORMS {
                    return Err(format!("plural index out of range in {}", other));
                }
                if !self.has_target {
                    self.current.target.clear();
                }
                self.has_target = true;
                if self.current.target.len() <= index {
                    self.current.target.resize(index + 1, String::new());
                }
                self.current.target[index] = parse_quoted(value)?;
                self.field = Some(Field::Target(index));
            }
            other => return Err(format!("unknown keyword '{}'", other)),
        }
        Ok(())
    }

    fn require_source(&self) -> Result<(), String> {
        if self.has_source {
            Ok(())
        } else {
            Err("msgstr without msgid".to_string())
        }
    }

    fn append(&mut self, line: &str) -> Result<(), String> {
        let value = parse_quoted(line)?;
        let unit = &mut self.current;
        match self.field {
            Some(Field::Context) => unit.context.get_or_insert_with(String::new).push_str(&value),
            Some(Field::Source) => unit.source.push_str(&value),
            Some(Field::SourcePlural) => unit
                .source_plural
                .get_or_insert_with(String::new)
                .push_str(&value),
            Some(Field::Target(idx)) => unit.target[idx].push_str(&value),
            Some(Field::PreviousContext) => unit.previous_context.push_str(&value),
            Some(Field::PreviousSource) => unit.previous_source.push_str(&value),
            None => return Err("string continuation without keyword".to_string()),
        }
        Ok(())
    }

    fn finish_entry(&mut self) -> Result<(), String> {
        let unit = std::mem::take(&mut self.current);
        let had_source = self.has_source;
        let started = self.started;
        self.started = false;
        self.has_source = false;
        self.has_target = false;
        self.field = None;

        if !had_source {
            if started && !self.header_seen && self.file.units.is_empty() {
                // comment block without entry, kept as header comment
                self.file
                    .header_comment
                    .extend(unit.translator_comment.lines().map(str::to_string));
            }
            return Ok(());
        }

        if !self.header_seen
            && self.file.units.is_empty()
            && unit.source.is_empty()
            && unit.context.is_none()
            && !unit.obsolete
        {
            self.header_seen = true;
            self.file
                .header_comment
                .extend(unit.translator_comment.lines().map(str::to_string));
            for line in unit.target_text().lines() {
                if let Some((key, value)) = line.split_once(':') {
                    self.file
                        .metadata
                        .push((key.trim().to_string(), value.trim().to_string()));
                }
            }
            return Ok(());
        }

        let mut unit = unit;
        if unit.target.is_empty() {
            unit.target.push(String::new());
        }
        self.file.units.push(unit);
        Ok(())
    }
}

fn strip_one_space(value: &str) -> &str {
    value.strip_prefix(' ').unwrap_or(value)
}

fn append_line(target: &mut String, line: &str) {
    if !target.is_empty() {
        target.push('\n');
    }
    target.push_str(line);
}

/// `path:line` when the suffix after the last colon is numeric
fn split_occurrence(token: &str) -> (String, String) {
    match token.rsplit_once(':') {
        Some((path, line)) if !line.is_empty() && line.chars().all(|c| c.is_ascii_digit()) => {
            (path.to_string(), line.to_string())
        }
        _ => (token.to_string(), String::new()),
    }
}

fn parse_quoted(value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.len() < 2 || !value.starts_with('"') || !value.ends_with('"') {
        return Err(format!("invalid quoted string: {}", value));
    }
    let inner = &value[1..value.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => return Err("dangling escape at end of string".to_string()),
        }
    }
    Ok(out)
}

/// PO file backed translation store
#[derive(Debug, Clone)]
pub struct PoStore {
    path: Option<PathBuf>,
    file: PoFile,
    template: Vec<StoreUnit>,
}

impl PoStore {
    pub fn from_file(file: PoFile, path: Option<PathBuf>) -> Self {
        Self {
            path,
            file,
            template: Vec::new(),
        }
    }

    pub fn with_template(mut self, template: PoFile) -> Self {
        self.template = template.units.into_iter().filter(|u| !u.obsolete).collect();
        self
    }

    pub fn file(&self) -> &PoFile {
        &self.file
    }
}

impl TranslationStore for PoStore {
    fn format(&self) -> FormatKind {
        FormatKind::Po
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn units(&self) -> &[StoreUnit] {
        &self.file.units
    }

    fn units_mut(&mut self) -> &mut Vec<StoreUnit> {
        &mut self.file.units
    }

    fn template_units(&self) -> &[StoreUnit] {
        &self.template
    }

    fn header(&self) -> Vec<(String, String)> {
        self.file.metadata.clone()
    }

    fn set_header_field(&mut self, name: &str, value: &str) {
        self.file.set_metadata(name, value);
    }

    fn to_bytes(&self) -> TransyncResult<Vec<u8>> {
        Ok(self.file.to_po_string().into_bytes())
    }
}

/// Gettext PO format
#[derive(Debug, Clone, Copy, Default)]
pub struct PoFormat;

impl FileFormat for PoFormat {
    fn id(&self) -> &'static str {
        "po"
    }

    fn name(&self) -> &'static str {
        "Gettext PO file"
    }

    fn extension(&self) -> &'static str {
        "po"
    }

    fn mimetype(&self) -> &'static str {
        "text/x-po"
    }

    fn parse(
        &self,
        path: &Path,
        template: Option<&Path>,
        _language_code: &str,
    ) -> TransyncResult<Box<dyn TranslationStore>> {
        let file = PoFile::open(path)?;
        let mut store = PoStore::from_file(file, Some(path.to_path_buf()));
        if let Some(template) = template.filter(|t| *t != path && t.exists()) {
            store = store.with_template(PoFile::open(template)?);
        }
        Ok(Box::new(store))
    }

    fn load(
        &self,
        name: &str,
        content: &[u8],
        _template: Option<&Path>,
    ) -> TransyncResult<Box<dyn TranslationStore>> {
        let text = decode(content).map_err(|e| TransyncError::parse(name, e))?;
        let file = PoFile::parse(&text).map_err(|e| TransyncError::parse(name, e))?;
        Ok(Box::new(PoStore::from_file(file, None)))
    }

    fn serialize(
        &self,
        header: &[(String, String)],
        units: &[StoreUnit],
    ) -> TransyncResult<Vec<u8>> {
        let file = PoFile {
            header_comment: Vec::new(),
            metadata: header.to_vec(),
            units: units.to_vec(),
        };
        Ok(file.to_po_string().into_bytes())
    }
}
