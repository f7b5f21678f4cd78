//! `xtract` CLI: loads a `.xtd` parser definition bank, runs it against one
//! `URL\nRAW_HTTP_RESPONSE` document, and prints the resulting relations.
//!
//! Structured the way the teacher repo's `main.rs` drives its own
//! read-args / load-input / run / render pipeline, but built around
//! `xtract_core::ParserBank` instead of a tree-sitter query engine.

mod cli;

use std::io::Read as _;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser as _;
use rayon::prelude::*;

use cli::{Args, ContentTypeArg, OutputFormatArg};
use xtract_core::{
    compile_bank, load_parser_defs, document, ContentType, ErrorPolicy, ParsedDocument,
    ParserBank, ParserDefFile, RuntimeError,
};

fn main() -> ExitCode {
    let args = Args::parse();
    let use_color = should_use_color(&args.color);

    match run(&args, use_color) {
        Ok(aborted) => {
            if aborted {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            report_fatal(&err, use_color);
            ExitCode::from(2)
        }
    }
}

/// Runs the tool end to end. Returns `Ok(true)` if any document's parse was
/// aborted under `ErrorPolicy::AbortProcess` (a non-fatal, reportable
/// outcome distinct from the `Err` cases below, which signal malformed
/// input or a bad definition bank and stop the whole run).
fn run(args: &Args, use_color: bool) -> Result<bool> {
    let raws = read_inputs(args)?;

    let defs = load_parser_defs(&args.parser_defs_glob)
        .with_context(|| format!("loading parser definitions from {:?}", args.parser_defs_glob))?;
    let file = ParserDefFile { parser: defs };
    let compiled = compile_bank(&file).context("compiling parser definitions")?;
    let bank = ParserBank::new(compiled);
    let policy = resolve_error_policy(args);

    if args.verbose {
        for raw in &raws {
            let (url, _) = document::split_url_and_body(raw);
            eprintln!(
                "xtract: {} applicable parser(s) of {} total for {url}",
                bank.applicable(url).count(),
                bank.len()
            );
        }
    }

    // One document's parse is independent of every other's, so with more
    // than one `--input-file-path` the whole batch fans out across threads,
    // same as `tractor_core::parallel::process_files_parallel`.
    let outcomes: Vec<Result<ParsedDocument, RuntimeError>> = raws
        .par_iter()
        .map(|raw| {
            let (url, body) = document::split_url_and_body(raw);
            let content_type = resolve_content_type(args.content_type, body);
            bank.parse_document(url, body, content_type, policy)
        })
        .collect();

    let mut any_aborted = false;
    for outcome in outcomes {
        let doc = match outcome {
            Ok(doc) => doc,
            Err(RuntimeError::Aborted(msg)) => {
                report_error(&format!("aborted: {msg}"), use_color);
                any_aborted = true;
                continue;
            }
            Err(other) => return Err(other.into()),
        };

        if args.verbose {
            for output in &doc.outputs {
                eprintln!(
                    "xtract: parser `{}` produced {} relation(s)",
                    output.parser_name,
                    output.relations.len()
                );
            }
        }

        render(&doc, args.output)?;
    }
    Ok(any_aborted)
}

fn read_inputs(args: &Args) -> Result<Vec<String>> {
    if args.stdin {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading document from stdin")?;
        Ok(vec![buf])
    } else {
        args.input_file_path
            .iter()
            .map(|path| std::fs::read_to_string(path).with_context(|| format!("reading input file `{path}`")))
            .collect()
    }
}

/// `--content-type auto` sniffs the body for telltale markers rather than
/// attempting a real parse, matching the best-effort nature of the original
/// `DetermineContentType` heuristic this stands in for.
fn resolve_content_type(flag: ContentTypeArg, body: &str) -> ContentType {
    match flag {
        ContentTypeArg::Html => ContentType::Html,
        ContentTypeArg::Xml => ContentType::Xml,
        ContentTypeArg::Auto => {
            let trimmed = body.trim_start();
            let lower_prefix: String = trimmed.chars().take(64).collect::<String>().to_ascii_lowercase();
            if trimmed.starts_with("<?xml") {
                ContentType::Xml
            } else if lower_prefix.starts_with("<!doctype html") || lower_prefix.contains("<html") {
                ContentType::Html
            } else {
                ContentType::Unknown
            }
        }
    }
}

fn resolve_error_policy(args: &Args) -> ErrorPolicy {
    if args.abort_on_parse_error {
        ErrorPolicy::AbortProcess
    } else if args.ignore_errors {
        ErrorPolicy::Ignore
    } else {
        ErrorPolicy::LogError
    }
}

fn render(doc: &ParsedDocument, format: OutputFormatArg) -> Result<()> {
    match format {
        OutputFormatArg::Json => {
            let rendered = serde_json::to_string_pretty(doc).context("serializing relations to JSON")?;
            println!("{rendered}");
        }
        OutputFormatArg::Debug => print_debug(doc),
    }
    Ok(())
}

/// A plain indented debug rendering: one block per parser, one line per
/// relation, annotations listed beneath it. Not meant to be machine-parsed;
/// `--output json` is the stable surface.
fn print_debug(doc: &ParsedDocument) {
    println!("document: {}", doc.url);
    if doc.outputs.is_empty() {
        println!("  (no relations)");
        return;
    }
    for output in &doc.outputs {
        println!("  parser: {}", output.parser_name);
        for rel in &output.relations {
            print!("    {} -[{}]-> {}", rel.subject, rel.predicate, rel.object);
            if let Some(userdata) = &rel.userdata {
                print!(" (userdata: {userdata})");
            }
            println!();
            for ann in &rel.annotations {
                println!("      + {}: {}", ann.name, ann.value);
            }
        }
    }
}

fn should_use_color(flag: &str) -> bool {
    match flag {
        "always" => true,
        "never" => false,
        _ => atty::is(atty::Stream::Stderr),
    }
}

fn report_error(msg: &str, use_color: bool) {
    if use_color {
        eprintln!("\x1b[33merror:\x1b[0m {msg}");
    } else {
        eprintln!("error: {msg}");
    }
}

fn report_fatal(err: &anyhow::Error, use_color: bool) {
    if use_color {
        eprintln!("\x1b[31mfatal:\x1b[0m {err:#}");
    } else {
        eprintln!("fatal: {err:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_detects_xml_declaration() {
        assert_eq!(resolve_content_type(ContentTypeArg::Auto, "<?xml version=\"1.0\"?><r/>"), ContentType::Xml);
    }

    #[test]
    fn auto_detects_html_doctype() {
        assert_eq!(
            resolve_content_type(ContentTypeArg::Auto, "<!DOCTYPE html><html></html>"),
            ContentType::Html
        );
    }

    #[test]
    fn auto_falls_back_to_unknown() {
        assert_eq!(resolve_content_type(ContentTypeArg::Auto, "{\"not\": \"markup\"}"), ContentType::Unknown);
    }

    #[test]
    fn explicit_content_type_overrides_sniffing() {
        assert_eq!(resolve_content_type(ContentTypeArg::Html, "{\"not\": \"markup\"}"), ContentType::Html);
    }
}
