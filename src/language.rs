//! Language metadata and gettext plural forms

use serde::{Deserialize, Serialize};

/// A target language of a translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub code: String,
    pub name: String,
    pub nplurals: u32,
    pub plural_formula: String,
}

const DEFAULT_PLURAL: (u32, &str) = (2, "(n != 1)");

/// Built-in table: code, name, nplurals, formula
const KNOWN_LANGUAGES: &[(&str, &str, u32, &str)] = &[
    ("en", "English", 2, "(n != 1)"),
    ("en_GB", "English (United Kingdom)", 2, "(n != 1)"),
    ("en_US", "English (United States)", 2, "(n != 1)"),
    ("de", "German", 2, "(n != 1)"),
    ("nl", "Dutch", 2, "(n != 1)"),
    ("es", "Spanish", 2, "(n != 1)"),
    ("it", "Italian", 2, "(n != 1)"),
    ("pt", "Portuguese", 2, "(n != 1)"),
    ("pt_BR", "Portuguese (Brazil)", 2, "(n > 1)"),
    ("fr", "French", 2, "(n > 1)"),
    ("cs", "Czech", 3, "(n==1) ? 0 : (n>=2 && n<=4) ? 1 : 2"),
    ("sk", "Slovak", 3, "(n==1) ? 0 : (n>=2 && n<=4) ? 1 : 2"),
    (
        "pl",
        "Polish",
        3,
        "n==1 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2",
    ),
    (
        "ru",
        "Russian",
        3,
        "n%10==1 && n%100!=11 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2",
    ),
    (
        "uk",
        "Ukrainian",
        3,
        "n%10==1 && n%100!=11 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2",
    ),
    ("ja", "Japanese", 1, "0"),
    ("ko", "Korean", 1, "0"),
    ("zh_Hans", "Chinese (Simplified)", 1, "0"),
    ("zh_Hant", "Chinese (Traditional)", 1, "0"),
    ("tr", "Turkish", 2, "(n > 1)"),
];

impl Language {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        nplurals: u32,
        plural_formula: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            nplurals,
            plural_formula: plural_formula.into(),
        }
    }

    /// Look up a language by code, falling back to a generic two-form plural.
    ///
    /// Codes are compared after normalising `-` to `_`, so `pt-BR` finds `pt_BR`.
    pub fn from_code(code: &str) -> Self {
        let normalized = code.replace('-', "_");
        let found = KNOWN_LANGUAGES
            .iter()
            .find(|(known, ..)| known.eq_ignore_ascii_case(&normalized))
            .or_else(|| {
                let base = normalized.split('_').next().unwrap_or(&normalized);
                KNOWN_LANGUAGES
                    .iter()
                    .find(|(known, ..)| known.eq_ignore_ascii_case(base))
            });

        match found {
            Some((_, name, nplurals, formula)) => Self::new(code, *name, *nplurals, *formula),
            None => Self::new(code, code, DEFAULT_PLURAL.0, DEFAULT_PLURAL.1),
        }
    }

    /// Gettext `Plural-Forms` header value
    pub fn plural_form(&self) -> String {
        format!(
            "nplurals={}; plural={};",
            self.nplurals, self.plural_formula
        )
    }

    /// Compare a `Plural-Forms` header against this language, ignoring whitespace
    /// and a trailing semicolon.
    pub fn same_plural(&self, header: &str) -> bool {
        normalize_plural(header) == normalize_plural(&self.plural_form())
    }
}

fn normalize_plural(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .trim_end_matches(';')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_language() {
        let cs = Language::from_code("cs");
        assert_eq!(cs.name, "Czech");
        assert_eq!(cs.nplurals, 3);
    }

    #[test]
    fn test_region_falls_back_to_base_language() {
        let de = Language::from_code("de-AT");
        assert_eq!(de.code, "de-AT");
        assert_eq!(de.name, "German");
    }

    #[test]
    fn test_unknown_language_uses_default_plural() {
        let xx = Language::from_code("xx");
        assert_eq!(xx.plural_form(), "nplurals=2; plural=(n != 1);");
    }

    #[test]
    fn test_same_plural_ignores_whitespace() {
        let de = Language::from_code("de");
        assert!(de.same_plural("nplurals=2;plural=(n != 1)"));
        assert!(de.same_plural("nplurals=2; plural=(n!=1);"));
        assert!(!de.same_plural("nplurals=3; plural=(n==1) ? 0 : (n>=2 && n<=4) ? 1 : 2;"));
    }
}
