//! Loads `.xtd` parser definition files from one or more glob patterns and
//! merges them into a single definition set, the same file-concatenation
//! semantics the original `ReadXpafParserDefs` used for its proto-text files.

use std::fs;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::{ParserDef, ParserDefFile};

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("invalid glob pattern `{pattern}`: {source}")]
    Pattern { pattern: String, source: glob::PatternError },

    #[error("failed to enumerate glob match: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("failed to read `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to parse `{path}`: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },

    #[error("no `.xtd` files matched any of the given patterns")]
    NoMatches,
}

/// Expands `patterns` (each a glob, e.g. `defs/**/*.xtd`) and concatenates
/// every matched file's `[[parser]]` entries into one list.
pub fn load_parser_defs(patterns: &[String]) -> Result<Vec<ParserDef>, LoaderError> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let matches = glob::glob(pattern)
            .map_err(|source| LoaderError::Pattern { pattern: pattern.clone(), source })?;
        for entry in matches {
            paths.push(entry?);
        }
    }
    if paths.is_empty() {
        return Err(LoaderError::NoMatches);
    }

    let mut defs = Vec::new();
    for path in paths {
        let text = fs::read_to_string(&path)
            .map_err(|source| LoaderError::Read { path: path.clone(), source })?;
        let file: ParserDefFile =
            toml::from_str(&text).map_err(|source| LoaderError::Parse { path: path.clone(), source })?;
        defs.extend(file.parser);
    }
    Ok(defs)
}
