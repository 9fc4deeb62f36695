//! Failure diagnostics
//!
//! Turns retrieval errors into actionable hints: similar-path suggestions
//! for missing files, the symbols a file actually defines, and the other
//! workspace files that define the requested name.

use std::collections::HashMap;
use std::sync::OnceLock;

use tracing::debug;

use crate::error::RetrieveError;
use crate::parser::{self, ParseCache};
use crate::workspace::Workspace;

/// Maximum segment-wise edit distance for path suggestions.
const MAX_SEGMENT_DISTANCE: usize = 4;
/// How many path suggestions to offer.
const MAX_PATH_SUGGESTIONS: usize = 3;

/// Lazily-built failure diagnostics for one bulk call.
pub(crate) struct DiagnosticHints<'a> {
    workspace: &'a Workspace,
    cache: &'a ParseCache,
    /// Inverted index from symbol name to the files defining it, built on
    /// first use.
    symbol_index: OnceLock<HashMap<String, Vec<String>>>,
}

impl<'a> DiagnosticHints<'a> {
    pub fn new(workspace: &'a Workspace, cache: &'a ParseCache) -> Self {
        Self {
            workspace,
            cache,
            symbol_index: OnceLock::new(),
        }
    }

    fn symbol_index(&self) -> &HashMap<String, Vec<String>> {
        self.symbol_index.get_or_init(|| {
            let mut index: HashMap<String, Vec<String>> = HashMap::new();
            self.workspace.walk_code_files(|absolute, relative| {
                let Ok(parsed) = self.cache.parse_file(absolute) else {
                    return;
                };
                for symbol in parser::all_alternative_file_symbols(&parsed) {
                    let files = index.entry(symbol.content).or_default();
                    if files.last().map(String::as_str) != Some(relative) {
                        files.push(relative.to_string());
                    }
                }
            });
            debug!("symbol index built with {} names", index.len());
            index
        })
    }

    /// Build the hint paragraph for one failed retrieval. The same text
    /// goes into the main output and the failures stream.
    pub fn hint_for_failure(
        &self,
        relative_path: &str,
        symbol_name: &str,
        error: &RetrieveError,
    ) -> String {
        let workspace_prefix = self.workspace.working_directory().to_string_lossy();
        let mut hint = error.to_string().replace(workspace_prefix.as_ref(), "");
        hint.push('\n');
        let mut advised = false;

        match error {
            RetrieveError::FileNotFound { .. } => {
                let suggestions = suggest_similar_paths(self.workspace, relative_path);
                if !suggestions.is_empty() {
                    hint.push_str(&format!("Did you mean: {}?\n", suggestions.join(", ")));
                    advised = true;
                }
            }
            RetrieveError::SymbolNotFound { .. } => {
                let absolute = self.workspace.absolute(relative_path);
                match self.cache.parse_file(&absolute) {
                    Ok(parsed) => {
                        let symbols = parser::file_symbols(&parsed);
                        if symbols.is_empty() {
                            hint.push_str(&format!(
                                "No symbols were found in {relative_path}; request \"*\" to retrieve the whole file.\n"
                            ));
                        } else {
                            let names: Vec<&str> =
                                symbols.iter().map(|s| s.content.as_str()).collect();
                            hint.push_str(&format!(
                                "Symbols defined in {relative_path}: {}\n",
                                names.join(", ")
                            ));
                            advised = true;
                        }
                    }
                    Err(e) => debug!("cannot list symbols of {relative_path}: {e}"),
                }
            }
            _ => {}
        }

        if !symbol_name.is_empty() && symbol_name != "*" {
            if let Some(files) = self.symbol_index().get(symbol_name) {
                let mut unique = files.clone();
                unique.sort();
                unique.dedup();
                hint.push_str(&format!(
                    "The symbol '{symbol_name}' is defined in: {}\n",
                    unique.join(", ")
                ));
                advised = true;
            } else if !advised {
                hint.push_str(&format!(
                    "The symbol '{symbol_name}' is not defined in any repo files.\n"
                ));
            }
        }
        hint
    }
}

// ============================================================================
// Path Suggestions
// ============================================================================

/// Suggest workspace paths similar to a missing one. Candidates are
/// compared segment-wise: the edit distance is computed over path
/// segments, the threshold is raised from 1 until something is retained,
/// and ties rank by whole-string similarity.
fn suggest_similar_paths(workspace: &Workspace, requested: &str) -> Vec<String> {
    let requested_segments: Vec<&str> = requested.split('/').collect();
    let mut candidates: Vec<(String, usize, f64)> = Vec::new();
    workspace.walk_code_files(|_, relative| {
        let segments: Vec<&str> = relative.split('/').collect();
        let distance = segment_levenshtein(&requested_segments, &segments);
        if distance <= MAX_SEGMENT_DISTANCE {
            let ratio =
                1.0 - distance as f64 / requested_segments.len().max(segments.len()) as f64;
            candidates.push((relative.to_string(), distance, ratio));
        }
    });

    for threshold in 1..=MAX_SEGMENT_DISTANCE {
        let mut retained: Vec<&(String, usize, f64)> = candidates
            .iter()
            .filter(|(_, distance, _)| *distance <= threshold)
            .collect();
        if retained.is_empty() {
            continue;
        }
        retained.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let sim_a = strsim::jaro_winkler(requested, &a.0);
                    let sim_b = strsim::jaro_winkler(requested, &b.0);
                    sim_b
                        .partial_cmp(&sim_a)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        return retained
            .into_iter()
            .take(MAX_PATH_SUGGESTIONS)
            .map(|(path, _, _)| path.clone())
            .collect();
    }
    Vec::new()
}

/// Edit distance where the alphabet is whole path segments.
fn segment_levenshtein(a: &[&str], b: &[&str]) -> usize {
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, seg_a) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, seg_b) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(seg_a != seg_b);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn segment_distance_counts_differing_segments() {
        assert_eq!(segment_levenshtein(&["a", "b", "c"], &["a", "b", "c"]), 0);
        assert_eq!(segment_levenshtein(&["a", "b", "c"], &["a", "x", "c"]), 1);
        assert_eq!(segment_levenshtein(&["a", "b"], &["a", "b", "c"]), 1);
        assert_eq!(segment_levenshtein(&[], &["a"]), 1);
    }

    #[test]
    fn suggests_the_closest_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pkg/server")).unwrap();
        fs::write(dir.path().join("pkg/server/main.go"), "package server\n").unwrap();
        fs::write(dir.path().join("pkg/util.go"), "package pkg\n").unwrap();

        let workspace = Workspace::new(dir.path());
        let suggestions = suggest_similar_paths(&workspace, "pkg/server/mian.go");
        assert_eq!(suggestions[0], "pkg/server/main.go");
    }

    #[test]
    fn hint_lists_symbols_defined_in_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a.go"),
            "package a\n\nfunc Defined() {}\n",
        )
        .unwrap();
        let workspace = Workspace::new(dir.path());
        let cache = ParseCache::new();
        let hints = DiagnosticHints::new(&workspace, &cache);

        let error = RetrieveError::SymbolNotFound {
            name: "Missing".to_string(),
            path: "a.go".to_string(),
        };
        let hint = hints.hint_for_failure("a.go", "Missing", &error);
        assert!(hint.contains("Symbols defined in a.go: Defined"));
        assert!(!hint.contains("not defined in any repo files"));
    }

    #[test]
    fn hint_points_to_other_defining_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.go"), "package a\n").unwrap();
        fs::write(
            dir.path().join("other_file.go"),
            "package a\n\nfunc ExistsElsewhere() {}\n",
        )
        .unwrap();
        let workspace = Workspace::new(dir.path());
        let cache = ParseCache::new();
        let hints = DiagnosticHints::new(&workspace, &cache);

        let error = RetrieveError::SymbolNotFound {
            name: "ExistsElsewhere".to_string(),
            path: "a.go".to_string(),
        };
        let hint = hints.hint_for_failure("a.go", "ExistsElsewhere", &error);
        assert!(hint.contains("'ExistsElsewhere' is defined in: other_file.go"));
    }

    #[test]
    fn hint_falls_back_to_terminal_line() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.go"), "package a\n").unwrap();
        let workspace = Workspace::new(dir.path());
        let cache = ParseCache::new();
        let hints = DiagnosticHints::new(&workspace, &cache);

        let error = RetrieveError::SymbolNotFound {
            name: "Ghost".to_string(),
            path: "a.go".to_string(),
        };
        let hint = hints.hint_for_failure("a.go", "Ghost", &error);
        assert!(hint.contains("The symbol 'Ghost' is not defined in any repo files."));
    }

    #[test]
    fn hint_redacts_workspace_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path());
        let cache = ParseCache::new();
        let hints = DiagnosticHints::new(&workspace, &cache);

        let error = RetrieveError::FileNotFound {
            path: format!("{}/missing.go", dir.path().display()),
        };
        let hint = hints.hint_for_failure("missing.go", "X", &error);
        assert!(!hint.contains(&dir.path().display().to_string()));
    }
}
