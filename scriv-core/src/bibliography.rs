//! Bibliography loading and lookup for citation support.

use hayagriva::{io::from_biblatex_str, types::Person, Entry};
use std::{
    collections::HashMap,
    fs, mem,
    path::{Path, PathBuf},
};
use tracing::warn;

use crate::models::Diagnostic;

/// One author of a bibliographic entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub given: Option<String>,
    pub family: String,
}

impl Author {
    pub fn new(given: Option<&str>, family: &str) -> Self {
        Self {
            given: given.map(str::to_string),
            family: family.to_string(),
        }
    }

    /// Placeholder written as `and others` in BibLaTeX.
    pub fn is_others(&self) -> bool {
        self.given.is_none() && self.family.eq_ignore_ascii_case("others")
    }

    /// `J. R. Smith` for given names `John Ronald`.
    pub fn initials_and_family(&self) -> String {
        let mut out = String::new();
        if let Some(given) = &self.given {
            for part in given.split([' ', '-']).filter(|p| !p.is_empty()) {
                if let Some(first) = part.chars().next() {
                    out.push(first);
                    out.push_str(". ");
                }
            }
        }
        out.push_str(&self.family);
        out
    }
}

impl From<&Person> for Author {
    fn from(person: &Person) -> Self {
        let family = match &person.prefix {
            Some(prefix) => format!("{} {}", prefix, person.name),
            None => person.name.clone(),
        };
        Self {
            given: person.given_name.clone(),
            family,
        }
    }
}

/// The fields of a bibliographic record the reference list renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BibEntry {
    pub key: String,
    pub authors: Vec<Author>,
    pub title: Option<String>,
    pub journal: Option<String>,
    pub volume: Option<String>,
    pub year: Option<i32>,
    pub doi: Option<String>,
}

impl From<&Entry> for BibEntry {
    fn from(entry: &Entry) -> Self {
        let parent = entry.parents().first();

        let authors = entry
            .authors()
            .or_else(|| entry.editors())
            .map(|people| people.iter().map(Author::from).collect())
            .unwrap_or_default();

        let volume = entry
            .volume()
            .or_else(|| parent.and_then(|p| p.volume()))
            .map(|v| v.to_string());

        let year = entry
            .date()
            .or_else(|| parent.and_then(|p| p.date()))
            .map(|d| d.year);

        let doi = entry
            .serial_number()
            .and_then(|serial| serial.0.get("doi").cloned());

        Self {
            key: entry.key().to_string(),
            authors,
            title: entry.title().map(|t| t.to_string()),
            journal: parent.and_then(|p| p.title()).map(|t| t.to_string()),
            volume,
            year,
            doi,
        }
    }
}

/// Cached bibliography loader to avoid re-reading the same `.bib` files.
#[derive(Debug, Default)]
pub struct BibliographyStore {
    cache: HashMap<PathBuf, Vec<BibEntry>>,
    diagnostics: Vec<Diagnostic>,
}

impl BibliographyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a merged bibliography for the provided list of paths.
    ///
    /// Later files win on key conflicts.
    pub fn collect(&mut self, paths: &[PathBuf]) -> Bibliography {
        let mut entries: HashMap<String, BibEntry> = HashMap::new();
        for path in paths {
            self.ensure_loaded(path);
            if let Some(loaded) = self.cache.get(path) {
                for entry in loaded {
                    entries.insert(entry.key.clone(), entry.clone());
                }
            }
        }

        Bibliography { entries }
    }

    fn ensure_loaded(&mut self, path: &Path) {
        if self.cache.contains_key(path) {
            return;
        }

        let loaded = match fs::read_to_string(path) {
            Ok(contents) => match from_biblatex_str(&contents) {
                Ok(lib) => lib.iter().map(BibEntry::from).collect(),
                Err(errors) => {
                    let joined = errors
                        .iter()
                        .map(|e| e.to_string())
                        .collect::<Vec<_>>()
                        .join("; ");
                    warn!("Failed to parse bibliography {:?}: {}", path, joined);
                    self.diagnostics.push(
                        Diagnostic::error(
                            "bibliography.parse_failed",
                            format!("Failed to parse bibliography: {}", joined),
                        )
                        .with_path(path.to_string_lossy()),
                    );
                    Vec::new()
                }
            },
            Err(err) => {
                warn!("Failed to read bibliography {:?}: {}", path, err);
                self.diagnostics.push(
                    Diagnostic::error(
                        "bibliography.read_failed",
                        format!("Failed to read bibliography: {}", err),
                    )
                    .with_path(path.to_string_lossy()),
                );
                Vec::new()
            }
        };

        self.cache.insert(path.to_path_buf(), loaded);
    }

    /// Take accumulated diagnostics (clearing the internal buffer).
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        mem::take(&mut self.diagnostics)
    }
}

/// Resolved bibliography entries for a single post.
#[derive(Debug, Clone, Default)]
pub struct Bibliography {
    entries: HashMap<String, BibEntry>,
}

impl Bibliography {
    pub fn from_entries(entries: impl IntoIterator<Item = BibEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.key.clone(), e)).collect(),
        }
    }

    /// Lookup a bibliography entry by key.
    pub fn get(&self, key: &str) -> Option<&BibEntry> {
        self.entries.get(key)
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_initials() {
        let author = Author::new(Some("John Ronald"), "Tolkien");
        assert_eq!(author.initials_and_family(), "J. R. Tolkien");
        assert_eq!(Author::new(None, "Plato").initials_and_family(), "Plato");
        assert!(Author::new(None, "others").is_others());
    }

    #[test]
    fn test_store_loads_biblatex() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"@article{{bib_foo,
  author = {{Doe, Jane and Roe, Richard}},
  title = {{On Foo}},
  journal = {{Journal of Foo}},
  year = {{2019}},
}}

@book{{bib_bar,
  author = {{Smith, Alan}},
  title = {{Bar Book}},
  year = {{2001}},
}}"#
        )
        .unwrap();

        let mut store = BibliographyStore::new();
        let bib = store.collect(&[file.path().to_path_buf()]);
        assert_eq!(bib.len(), 2);

        let foo = bib.get("bib_foo").unwrap();
        assert_eq!(foo.title.as_deref(), Some("On Foo"));
        assert_eq!(foo.authors.len(), 2);
        assert_eq!(foo.authors[0].family, "Doe");
        assert_eq!(foo.year, Some(2019));
        assert!(store.take_diagnostics().is_empty());
    }

    #[test]
    fn test_missing_file_records_diagnostic() {
        let mut store = BibliographyStore::new();
        let bib = store.collect(&[PathBuf::from("/definitely/not/here.bib")]);
        assert!(bib.is_empty());
        let diags = store.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "bibliography.read_failed");
        assert!(store.take_diagnostics().is_empty());
    }
}
