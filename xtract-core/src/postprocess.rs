//! Post-processing pipeline: the sequence of `PostProcessingOp`s a raw query
//! result string passes through before it is interned as a candidate value.

use regex::Regex;

use crate::model::PostProcessingOp;

/// The outcome of running a value through a query's post-processing pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessResult {
    /// The value survived every op and should be kept.
    Ok(String),
    /// An `extract` op's regex did not match; per §9 open question iii, a
    /// non-matching `extract` silently drops the value rather than erroring.
    Dropped,
}

/// Applies `ops` in order to `input`. An `extract` with no match short
/// circuits the remaining ops and returns `Dropped`.
pub fn apply(ops: &[PostProcessingOp], input: &str) -> Result<PostProcessResult, String> {
    let mut current = input.to_string();
    for op in ops {
        match op {
            PostProcessingOp::Replace { regexp, rewrite, global } => {
                let re = Regex::new(regexp).map_err(|e| e.to_string())?;
                current = if *global {
                    re.replace_all(&current, rewrite.as_str()).into_owned()
                } else {
                    re.replace(&current, rewrite.as_str()).into_owned()
                };
            }
            PostProcessingOp::Extract { regexp } => {
                let re = Regex::new(regexp).map_err(|e| e.to_string())?;
                match re.captures(&current) {
                    Some(caps) => {
                        // Capture group 1 if present, else the whole match;
                        // an empty captured group is still a match (§9.iii).
                        current = caps
                            .get(1)
                            .or_else(|| caps.get(0))
                            .map(|m| m.as_str().to_string())
                            .unwrap_or_default();
                    }
                    None => return Ok(PostProcessResult::Dropped),
                }
            }
            PostProcessingOp::Substr | PostProcessingOp::Convert => {
                // Rejected at compile time by `compiler::reject_reserved_ops`;
                // unreachable once a parser definition has compiled.
                return Err("reserved post-processing op reached runtime".to_string());
            }
        }
    }
    Ok(PostProcessResult::Ok(current))
}
