//! Translation file formats
//!
//! A [`FileFormat`] turns a file on disk (or uploaded bytes) into a
//! [`TranslationStore`]: an ordered list of [`StoreUnit`]s plus header fields.
//! Formats are selected by string id at the boundary ([`FormatKind::from_id`])
//! and dispatched statically afterwards.

pub mod json;
pub mod po;

use std::fmt;
use std::path::Path;

use crate::error::{TransyncError, TransyncResult};

pub use json::{JsonFormat, JsonStore};
pub use po::{PoFile, PoFormat, PoStore};

/// Identity of a unit for matching: context plus the first source plural form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitKey {
    pub context: String,
    pub source: String,
}

impl UnitKey {
    pub fn new(context: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            source: source.into(),
        }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "{:?}", self.source)
        } else {
            write!(f, "{}:{:?}", self.context, self.source)
        }
    }
}

/// One entry of a translation file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreUnit {
    /// `None` is an unset context, distinct from an explicit empty one
    pub context: Option<String>,
    pub source: String,
    pub source_plural: Option<String>,
    /// Target plural forms; a singular unit has exactly one
    pub target: Vec<String>,
    pub fuzzy: bool,
    pub obsolete: bool,
    /// Format flags, `fuzzy` excluded
    pub flags: Vec<String>,
    /// Extracted (developer) comment
    pub comment: String,
    pub translator_comment: String,
    /// `(path, line)` pairs; line may be empty
    pub occurrences: Vec<(String, String)>,
    pub previous_source: String,
    pub previous_context: String,
}

impl StoreUnit {
    pub fn new(context: Option<&str>, source: &str, target: &str) -> Self {
        Self {
            context: context.map(str::to_string),
            source: source.to_string(),
            target: vec![target.to_string()],
            ..Default::default()
        }
    }

    pub fn context_str(&self) -> &str {
        self.context.as_deref().unwrap_or("")
    }

    pub fn key(&self) -> UnitKey {
        UnitKey::new(self.context_str(), self.source.as_str())
    }

    pub fn is_plural(&self) -> bool {
        self.source_plural.is_some()
    }

    /// Source plural forms
    pub fn sources(&self) -> Vec<String> {
        let mut sources = vec![self.source.clone()];
        if let Some(plural) = &self.source_plural {
            sources.push(plural.clone());
        }
        sources
    }

    /// First target form, or an empty string
    pub fn target_text(&self) -> &str {
        self.target.first().map(String::as_str).unwrap_or("")
    }

    pub fn has_target(&self) -> bool {
        self.target.iter().any(|t| !t.is_empty())
    }

    pub fn is_translated(&self) -> bool {
        !self.fuzzy && self.has_target()
    }

    pub fn is_translatable(&self) -> bool {
        !self.obsolete && !self.source.is_empty()
    }

    /// Comma separated format flags as stored on the database unit
    pub fn flags_string(&self) -> String {
        self.flags.join(", ")
    }
}

/// Header fields refreshed when pending edits are flushed to a file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderUpdate {
    pub last_translator: Option<String>,
    pub plural_forms: Option<String>,
    pub language: Option<String>,
    pub revision_date: Option<String>,
    pub language_team: Option<String>,
    pub report_msgid_bugs_to: Option<String>,
}

impl HeaderUpdate {
    fn fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("Last-Translator", &self.last_translator),
            ("Language-Team", &self.language_team),
            ("Language", &self.language),
            ("Plural-Forms", &self.plural_forms),
            ("PO-Revision-Date", &self.revision_date),
            ("Report-Msgid-Bugs-To", &self.report_msgid_bugs_to),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
        .collect()
    }
}

/// Headers never taken over from an uploaded file
const MERGE_HEADER_SKIP: &[&str] = &[
    "Project-Id-Version",
    "POT-Creation-Date",
    "Language",
    "Plural-Forms",
    "Content-Type",
    "Content-Transfer-Encoding",
    "MIME-Version",
];

/// How fuzzy units of an external file are treated when merging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FuzzyMode {
    /// Leave fuzzy units out
    #[default]
    Skip,
    /// Import fuzzy units, keeping them fuzzy
    Process,
    /// Import fuzzy units as reviewed
    Approve,
}

impl FuzzyMode {
    pub fn from_id(id: &str) -> TransyncResult<Self> {
        match id {
            "" | "skip" => Ok(FuzzyMode::Skip),
            "process" => Ok(FuzzyMode::Process),
            "approve" => Ok(FuzzyMode::Approve),
            other => Err(TransyncError::NotFound(format!(
                "fuzzy handling '{}'",
                other
            ))),
        }
    }
}

/// Parsed translation file
pub trait TranslationStore: Send + Sync {
    fn format(&self) -> FormatKind;

    fn path(&self) -> Option<&Path>;

    /// Units in file order
    fn units(&self) -> &[StoreUnit];

    fn units_mut(&mut self) -> &mut Vec<StoreUnit>;

    /// Units known only from the template (monolingual workflows)
    fn template_units(&self) -> &[StoreUnit] {
        &[]
    }

    /// Header fields in file order
    fn header(&self) -> Vec<(String, String)>;

    fn set_header_field(&mut self, name: &str, value: &str);

    /// Serialize to the on-disk representation
    fn to_bytes(&self) -> TransyncResult<Vec<u8>>;

    fn extension(&self) -> &'static str {
        self.format().extension()
    }

    fn mimetype(&self) -> &'static str {
        self.format().mimetype()
    }

    fn header_value(&self, name: &str) -> Option<String> {
        self.header()
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// File units followed by template units the file lacks
    fn all_units(&self) -> Box<dyn Iterator<Item = &StoreUnit> + '_> {
        let units = self.units();
        let extra = self
            .template_units()
            .iter()
            .filter(move |t| !units.iter().any(|u| !u.obsolete && u.key() == t.key()));
        Box::new(units.iter().chain(extra))
    }

    /// Position of a non-obsolete unit in the file
    fn find_unit(&self, context: &str, source: &str) -> Option<usize> {
        self.units()
            .iter()
            .position(|u| !u.obsolete && u.context_str() == context && u.source == source)
    }

    /// Template unit to add when the file itself lacks the string
    fn find_template_unit(&self, context: &str, source: &str) -> Option<StoreUnit> {
        self.template_units()
            .iter()
            .find(|u| u.context_str() == context && u.source == source)
            .cloned()
    }

    fn unit(&self, index: usize) -> Option<&StoreUnit> {
        self.units().get(index)
    }

    fn add_unit(&mut self, unit: StoreUnit) -> usize {
        let units = self.units_mut();
        units.push(unit);
        units.len() - 1
    }

    fn set_target(&mut self, index: usize, target: Vec<String>) {
        if let Some(unit) = self.units_mut().get_mut(index) {
            unit.target = target;
        }
    }

    fn mark_fuzzy(&mut self, index: usize, fuzzy: bool) {
        if let Some(unit) = self.units_mut().get_mut(index) {
            unit.fuzzy = fuzzy;
        }
    }

    fn update_header(&mut self, update: &HeaderUpdate) {
        for (name, value) in update.fields() {
            self.set_header_field(name, value);
        }
    }

    /// Take over descriptive header fields from another store
    fn merge_header(&mut self, other: &dyn TranslationStore) {
        for (name, value) in other.header() {
            if value.is_empty() || MERGE_HEADER_SKIP.contains(&name.as_str()) {
                continue;
            }
            self.set_header_field(&name, &value);
        }
    }

    fn save(&self) -> TransyncResult<()> {
        let path = self.path().ok_or_else(|| {
            TransyncError::Config("store was loaded from memory and has no path".to_string())
        })?;
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Number of translatable units
    fn count_units(&self) -> usize {
        self.units().iter().filter(|u| u.is_translatable()).count()
    }

    /// Units to merge into a translation, with the fuzzy flag to apply.
    ///
    /// With `old` (the file as it was when it was handed out), units whose
    /// target did not change since are dropped, and an edited unit still
    /// marked fuzzy counts as reviewed.
    fn iterate_merge(
        &self,
        fuzzy: FuzzyMode,
        old: Option<&dyn TranslationStore>,
    ) -> Vec<(bool, StoreUnit)> {
        let mut result = Vec::new();
        for unit in self.units() {
            if !unit.is_translatable() || !unit.has_target() {
                continue;
            }

            let edited = match old {
                Some(old) => {
                    let previous = old
                        .find_unit(unit.context_str(), &unit.source)
                        .and_then(|idx| old.unit(idx));
                    match previous {
                        Some(previous) if previous.target == unit.target => continue,
                        _ => true,
                    }
                }
                None => false,
            };

            let set_fuzzy = if unit.fuzzy {
                if edited {
                    false
                } else {
                    match fuzzy {
                        FuzzyMode::Skip => continue,
                        FuzzyMode::Process => true,
                        FuzzyMode::Approve => false,
                    }
                }
            } else {
                false
            };

            let mut merged = unit.clone();
            merged.fuzzy = set_fuzzy;
            result.push((set_fuzzy, merged));
        }
        result
    }
}

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Po,
    Json,
}

/// Capabilities every file format provides
pub trait FileFormat {
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn extension(&self) -> &'static str;

    fn mimetype(&self) -> &'static str;

    fn parse(
        &self,
        path: &Path,
        template: Option<&Path>,
        language_code: &str,
    ) -> TransyncResult<Box<dyn TranslationStore>>;

    /// Parse uploaded content; `name` is only used in error messages
    fn load(
        &self,
        name: &str,
        content: &[u8],
        template: Option<&Path>,
    ) -> TransyncResult<Box<dyn TranslationStore>>;

    fn serialize(
        &self,
        header: &[(String, String)],
        units: &[StoreUnit],
    ) -> TransyncResult<Vec<u8>>;
}

impl FormatKind {
    pub const ALL: [FormatKind; 2] = [FormatKind::Po, FormatKind::Json];

    pub fn from_id(id: &str) -> TransyncResult<Self> {
        FormatKind::ALL
            .into_iter()
            .find(|kind| kind.id() == id)
            .ok_or_else(|| TransyncError::NotFound(format!("File format '{}' not supported", id)))
    }
}

impl FileFormat for FormatKind {
    fn id(&self) -> &'static str {
        match self {
            FormatKind::Po => PoFormat.id(),
            FormatKind::Json => JsonFormat.id(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FormatKind::Po => PoFormat.name(),
            FormatKind::Json => JsonFormat.name(),
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            FormatKind::Po => PoFormat.extension(),
            FormatKind::Json => JsonFormat.extension(),
        }
    }

    fn mimetype(&self) -> &'static str {
        match self {
            FormatKind::Po => PoFormat.mimetype(),
            FormatKind::Json => JsonFormat.mimetype(),
        }
    }

    fn parse(
        &self,
        path: &Path,
        template: Option<&Path>,
        language_code: &str,
    ) -> TransyncResult<Box<dyn TranslationStore>> {
        match self {
            FormatKind::Po => PoFormat.parse(path, template, language_code),
            FormatKind::Json => JsonFormat.parse(path, template, language_code),
        }
    }

    fn load(
        &self,
        name: &str,
        content: &[u8],
        template: Option<&Path>,
    ) -> TransyncResult<Box<dyn TranslationStore>> {
        match self {
            FormatKind::Po => PoFormat.load(name, content, template),
            FormatKind::Json => JsonFormat.load(name, content, template),
        }
    }

    fn serialize(
        &self,
        header: &[(String, String)],
        units: &[StoreUnit],
    ) -> TransyncResult<Vec<u8>> {
        match self {
            FormatKind::Po => PoFormat.serialize(header, units),
            FormatKind::Json => JsonFormat.serialize(header, units),
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(units: Vec<StoreUnit>) -> PoStore {
        PoStore::from_file(PoFile::with_units(units), None)
    }

    fn fuzzy_unit(source: &str, target: &str) -> StoreUnit {
        let mut unit = StoreUnit::new(None, source, target);
        unit.fuzzy = true;
        unit
    }

    #[test]
    fn test_format_kind_from_id() {
        assert_eq!(FormatKind::from_id("po").unwrap(), FormatKind::Po);
        assert_eq!(FormatKind::from_id("json").unwrap(), FormatKind::Json);
        assert!(matches!(
            FormatKind::from_id("xliff"),
            Err(TransyncError::NotFound(_))
        ));
    }

    #[test]
    fn test_store_unit_translated_state() {
        let mut unit = StoreUnit::new(None, "Hello", "");
        assert!(!unit.is_translated());
        unit.target = vec!["Hallo".to_string()];
        assert!(unit.is_translated());
        unit.fuzzy = true;
        assert!(!unit.is_translated());
    }

    #[test]
    fn test_unit_key_treats_missing_context_as_empty() {
        let a = StoreUnit::new(None, "Hello", "");
        let b = StoreUnit::new(Some(""), "Hello", "x");
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_iterate_merge_skips_untranslated_and_fuzzy() {
        let store = store_with(vec![
            StoreUnit::new(None, "one", "eins"),
            StoreUnit::new(None, "two", ""),
            fuzzy_unit("three", "drei"),
        ]);
        let merged = store.iterate_merge(FuzzyMode::Skip, None);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].1.source, "one");
        assert!(!merged[0].0);
    }

    #[test]
    fn test_iterate_merge_fuzzy_modes() {
        let store = store_with(vec![fuzzy_unit("three", "drei")]);
        let processed = store.iterate_merge(FuzzyMode::Process, None);
        assert!(processed[0].0);
        let approved = store.iterate_merge(FuzzyMode::Approve, None);
        assert!(!approved[0].0);
    }

    #[test]
    fn test_iterate_merge_with_old_revision_drops_unchanged() {
        let old = store_with(vec![
            StoreUnit::new(None, "one", "eins"),
            fuzzy_unit("two", "zwo"),
        ]);
        let new = store_with(vec![
            StoreUnit::new(None, "one", "eins"),
            fuzzy_unit("two", "zwei"),
        ]);
        let merged = new.iterate_merge(FuzzyMode::Skip, Some(&old));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].1.source, "two");
        // edited since export: counts as reviewed
        assert!(!merged[0].0);
    }

    #[test]
    fn test_merge_header_skips_language_fields() {
        let mut target = store_with(vec![]);
        target.set_header_field("Language", "de");
        let mut other = store_with(vec![]);
        other.set_header_field("Language", "fr");
        other.set_header_field("Last-Translator", "Jane <jane@example.com>");
        target.merge_header(&other);
        assert_eq!(target.header_value("Language").as_deref(), Some("de"));
        assert_eq!(
            target.header_value("Last-Translator").as_deref(),
            Some("Jane <jane@example.com>")
        );
    }

    #[test]
    fn test_all_units_appends_template_only_units() {
        let template = PoFile::with_units(vec![
            StoreUnit::new(None, "one", ""),
            StoreUnit::new(None, "two", ""),
        ]);
        let store = PoStore::from_file(
            PoFile::with_units(vec![StoreUnit::new(None, "one", "eins")]),
            None,
        )
        .with_template(template);
        let sources: Vec<&str> = store.all_units().map(|u| u.source.as_str()).collect();
        assert_eq!(sources, vec!["one", "two"]);
        assert!(store.find_unit("", "two").is_none());
        assert!(store.find_template_unit("", "two").is_some());
    }
}
