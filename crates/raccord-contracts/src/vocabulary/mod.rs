mod matcher;
mod tables;

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use matcher::{tokenize, TermMatcher, TokenMatcher};

use tables::{LocaleTables, ENGLISH, FIXABLE_ERROR_TYPES, FRENCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    English,
    French,
    Bilingual,
}

impl Locale {
    /// Accepts tags like `en`, `fr-FR` or `bilingual`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        let primary = normalized
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_string();
        match primary.as_str() {
            "en" | "english" => Some(Self::English),
            "fr" | "french" | "francais" => Some(Self::French),
            "bilingual" | "all" => Some(Self::Bilingual),
            _ => None,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::English => "en",
            Self::French => "fr",
            Self::Bilingual => "bilingual",
        };
        f.write_str(label)
    }
}

/// Lookup tables driving every keyword heuristic in the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub locale: Locale,
    pub pickup_verbs: Vec<String>,
    pub body_states: IndexMap<String, Vec<String>>,
    pub unfixable_keywords: Vec<String>,
    pub fixable_error_types: Vec<String>,
}

/// Partial vocabulary read from an override file; every list extends the
/// corresponding table.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VocabularyPatch {
    pickup_verbs: Vec<String>,
    body_states: IndexMap<String, Vec<String>>,
    unfixable_keywords: Vec<String>,
    fixable_error_types: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::bilingual()
    }
}

impl Vocabulary {
    pub fn english() -> Self {
        Self::from_tables(Locale::English, &[ENGLISH])
    }

    pub fn french() -> Self {
        Self::from_tables(Locale::French, &[FRENCH])
    }

    pub fn bilingual() -> Self {
        Self::from_tables(Locale::Bilingual, &[ENGLISH, FRENCH])
    }

    pub fn for_locale(locale: Locale) -> Self {
        match locale {
            Locale::English => Self::english(),
            Locale::French => Self::french(),
            Locale::Bilingual => Self::bilingual(),
        }
    }

    /// Built-in tables for `locale`, extended by the JSON file named in
    /// `RACCORD_VOCABULARY` when that variable is set.
    pub fn load(locale: Locale) -> anyhow::Result<Self> {
        Self::load_with_override(locale, vocabulary_override_path().as_deref())
    }

    pub fn load_with_override(locale: Locale, path: Option<&Path>) -> anyhow::Result<Self> {
        let mut vocabulary = Self::for_locale(locale);
        if let Some(path) = path {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("vocabulary file not readable ({})", path.display()))?;
            vocabulary
                .merge_json(&raw)
                .with_context(|| format!("invalid vocabulary file ({})", path.display()))?;
        }
        Ok(vocabulary)
    }

    fn from_tables(locale: Locale, tables: &[LocaleTables]) -> Self {
        let mut vocabulary = Self {
            locale,
            pickup_verbs: Vec::new(),
            body_states: IndexMap::new(),
            unfixable_keywords: Vec::new(),
            fixable_error_types: Vec::new(),
        };
        extend_unique(
            &mut vocabulary.fixable_error_types,
            FIXABLE_ERROR_TYPES.iter().map(|item| (*item).to_string()),
        );
        let mixed = tables.len() > 1;
        for table in tables {
            let usable = |item: &&&'static str| !mixed || !table.homographs.contains(*item);
            extend_unique(
                &mut vocabulary.pickup_verbs,
                table
                    .pickup_verbs
                    .iter()
                    .filter(usable)
                    .map(|item| (*item).to_string()),
            );
            extend_unique(
                &mut vocabulary.unfixable_keywords,
                table
                    .unfixable_keywords
                    .iter()
                    .filter(usable)
                    .map(|item| (*item).to_string()),
            );
            for spec in table.body_states {
                let terms = vocabulary
                    .body_states
                    .entry(spec.state.to_string())
                    .or_default();
                extend_unique(
                    terms,
                    spec.terms
                        .iter()
                        .filter(usable)
                        .map(|item| (*item).to_string()),
                );
            }
        }
        vocabulary
    }

    pub fn merge_json(&mut self, raw: &str) -> anyhow::Result<()> {
        let patch: VocabularyPatch = serde_json::from_str(raw)?;
        if patch
            .body_states
            .keys()
            .any(|state| state.trim().is_empty())
        {
            bail!("vocabulary override has a blank body state name");
        }
        extend_unique(&mut self.pickup_verbs, patch.pickup_verbs);
        extend_unique(&mut self.unfixable_keywords, patch.unfixable_keywords);
        extend_unique(
            &mut self.fixable_error_types,
            patch
                .fixable_error_types
                .into_iter()
                .map(|value| value.trim().to_ascii_lowercase()),
        );
        for (state, terms) in patch.body_states {
            let entry = self
                .body_states
                .entry(state.trim().to_ascii_lowercase())
                .or_default();
            extend_unique(entry, terms);
        }
        Ok(())
    }

    pub fn pickup_verb<'v>(&'v self, matcher: &dyn TermMatcher, text: &str) -> Option<&'v str> {
        matcher.find(text, &self.pickup_verbs)
    }

    /// First body state (in table order) mentioned in `text`.
    pub fn body_state<'v>(&'v self, matcher: &dyn TermMatcher, text: &str) -> Option<&'v str> {
        self.body_states
            .iter()
            .find(|(_, terms)| matcher.find(text, terms).is_some())
            .map(|(state, _)| state.as_str())
    }

    pub fn unfixable_keyword<'v>(
        &'v self,
        matcher: &dyn TermMatcher,
        text: &str,
    ) -> Option<&'v str> {
        matcher.find(text, &self.unfixable_keywords)
    }

    pub fn is_fixable_type(&self, error_type: &str) -> bool {
        let normalized = error_type.trim().to_ascii_lowercase();
        self.fixable_error_types
            .iter()
            .any(|item| *item == normalized)
    }
}

fn vocabulary_override_path() -> Option<PathBuf> {
    env::var_os("RACCORD_VOCABULARY")
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
}

fn extend_unique(target: &mut Vec<String>, items: impl IntoIterator<Item = String>) {
    for item in items {
        let trimmed = item.trim();
        if trimmed.is_empty() || target.iter().any(|existing| existing == trimmed) {
            continue;
        }
        target.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{Locale, TokenMatcher, Vocabulary};

    #[test]
    fn bilingual_tables_skip_french_homographs_of_english_words() {
        let vocabulary = Vocabulary::bilingual();
        assert_eq!(
            vocabulary.pickup_verb(&TokenMatcher, "Some sort of fog rolls over the deck"),
            None
        );
        assert_eq!(
            vocabulary.body_state(&TokenMatcher, "The king waits in the royal court"),
            None
        );
        assert_eq!(
            vocabulary.body_state(&TokenMatcher, "Riders cross the marche at dusk"),
            None
        );
        let french = Vocabulary::french();
        assert_eq!(
            french.pickup_verb(&TokenMatcher, "Il sort son couteau"),
            Some("sort")
        );
        assert_eq!(
            french.body_state(&TokenMatcher, "Elle court vers le quai"),
            Some("running")
        );
    }

    #[test]
    fn load_merges_override_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("vocabulary.json");
        fs::write(&path, r#"{"pickup_verbs": ["snatches"]}"#)?;

        let vocabulary = Vocabulary::load_with_override(Locale::English, Some(path.as_path()))?;
        assert_eq!(
            vocabulary.pickup_verb(&TokenMatcher, "she snatches the key"),
            Some("snatches")
        );
        assert_eq!(
            Vocabulary::load_with_override(Locale::French, None)?,
            Vocabulary::french()
        );
        Ok(())
    }

    #[test]
    fn load_reports_broken_override_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("vocabulary.json");
        fs::write(&path, "{ not json")?;

        let err = Vocabulary::load_with_override(Locale::English, Some(path.as_path()))
            .expect_err("broken file");
        let message = format!("{err:#}");
        assert!(message.contains("invalid vocabulary file"), "{message}");
        assert!(message.contains("vocabulary.json"), "{message}");

        let missing = temp.path().join("missing.json");
        let err = Vocabulary::load_with_override(Locale::English, Some(missing.as_path()))
            .expect_err("missing file");
        assert!(format!("{err:#}").contains("not readable"));
        Ok(())
    }

    #[test]
    fn load_reads_override_path_from_env() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("vocabulary.json");
        fs::write(&path, "{ not json")?;

        std::env::set_var("RACCORD_VOCABULARY", &path);
        let broken = Vocabulary::load(Locale::English);
        fs::write(&path, r#"{"unfixable_keywords": ["doppelganger"]}"#)?;
        let valid = Vocabulary::load(Locale::English);
        std::env::remove_var("RACCORD_VOCABULARY");

        assert!(broken.is_err());
        assert_eq!(
            valid?.unfixable_keyword(&TokenMatcher, "a doppelganger appears"),
            Some("doppelganger")
        );
        Ok(())
    }

    #[test]
    fn bilingual_tables_cover_both_languages() {
        let vocabulary = Vocabulary::bilingual();
        assert_eq!(
            vocabulary.pickup_verb(&TokenMatcher, "Il saisit la corde"),
            Some("saisit")
        );
        assert_eq!(
            vocabulary.pickup_verb(&TokenMatcher, "He grabs the rope"),
            Some("grabs")
        );
        assert_eq!(
            vocabulary.body_state(&TokenMatcher, "Elle est assise au bar"),
            Some("sitting")
        );
        assert_eq!(
            vocabulary.body_state(&TokenMatcher, "He is standing by the mast"),
            Some("standing")
        );
    }

    #[test]
    fn single_locale_tables_stay_separate() {
        let english = Vocabulary::english();
        assert_eq!(english.unfixable_keyword(&TokenMatcher, "visage différent"), None);
        let french = Vocabulary::french();
        assert_eq!(
            french.unfixable_keyword(&TokenMatcher, "visage différent"),
            Some("visage")
        );
        assert_eq!(french.body_states.len(), 5);
        assert!(french.is_fixable_type("Prop"));
    }

    #[test]
    fn body_states_keep_canonical_order() {
        let vocabulary = Vocabulary::english();
        let states: Vec<&str> = vocabulary.body_states.keys().map(String::as_str).collect();
        assert_eq!(
            states,
            vec!["sitting", "standing", "lying", "running", "walking"]
        );
    }

    #[test]
    fn merge_json_extends_tables() -> anyhow::Result<()> {
        let mut vocabulary = Vocabulary::english();
        vocabulary.merge_json(
            r#"{
                "pickup_verbs": ["snatches", "grabs"],
                "body_states": {"Kneeling": ["kneeling", "kneels"], "sitting": ["perched"]},
                "fixable_error_types": [" Costume "]
            }"#,
        )?;
        assert_eq!(
            vocabulary.pickup_verb(&TokenMatcher, "she snatches the key"),
            Some("snatches")
        );
        assert_eq!(
            vocabulary
                .pickup_verbs
                .iter()
                .filter(|verb| verb.as_str() == "grabs")
                .count(),
            1
        );
        assert_eq!(
            vocabulary.body_state(&TokenMatcher, "perched on the rail"),
            Some("sitting")
        );
        assert_eq!(
            vocabulary.body_state(&TokenMatcher, "he kneels"),
            Some("kneeling")
        );
        assert!(vocabulary.is_fixable_type("costume"));
        Ok(())
    }

    #[test]
    fn merge_json_rejects_bad_payloads() {
        let mut vocabulary = Vocabulary::english();
        assert!(vocabulary.merge_json("not json").is_err());
        assert!(vocabulary
            .merge_json(r#"{"body_states": {" ": ["x"]}}"#)
            .is_err());
        assert_eq!(vocabulary, Vocabulary::english());
    }

    #[test]
    fn locale_parses_tags() {
        assert_eq!(Locale::parse("fr-FR"), Some(Locale::French));
        assert_eq!(Locale::parse("EN_us"), Some(Locale::English));
        assert_eq!(Locale::parse("bilingual"), Some(Locale::Bilingual));
        assert_eq!(Locale::parse("de"), None);
        assert_eq!(Locale::French.to_string(), "fr");
    }
}
