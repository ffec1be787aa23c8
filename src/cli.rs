//! Minimal CLI: resolve shape specs → (schema | range)
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;

use crate::ir::Resolved;
use crate::resolve::resolve;
use crate::spec::ArrayShapeSpec;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// resolve array shape specifications and output either a JSON schema view or
/// a rendered range expression
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// resolve and print the JSON-schema view
    Schema(JsonSchemaOut),
    /// resolve and emit the rendered range expression with its support block
    Range(RangeOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// element (leaf) type token for the arrays being shaped
    #[arg(long, default_value = "Any")]
    dtype: String,

    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /slots/0/array)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct JsonSchemaOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct RangeOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

static DTYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").unwrap());

impl InputSettings {
    /// Load every shape spec the settings select, labeled by source path.
    fn load_specs(&self) -> Result<Vec<(String, ArrayShapeSpec)>> {
        if !DTYPE_RE.is_match(&self.dtype) {
            bail!("invalid dtype token: {:?}", self.dtype);
        }

        let source_paths =
            resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;

        let mut out = Vec::new();
        for source_path in source_paths {
            let label = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file {label}"))?;

            let documents: Vec<serde_json::Value> = if self.ndjson {
                source
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(|line| {
                        serde_json::from_str(line)
                            .with_context(|| format!("failed to parse NDJSON line in {label}"))
                    })
                    .collect::<Result<_>>()?
            } else {
                vec![serde_json::from_str(&source)
                    .with_context(|| format!("failed to parse JSON source file {label}"))?]
            };

            for document in documents {
                let selected = match self.jq_expr.as_ref() {
                    Some(expr) => crate::jq_exec::apply_filter(expr, &document)
                        .with_context(|| format!("failed to apply jq expression to {label}"))?,
                    None => vec![document],
                };
                for value in selected {
                    let value = match self.json_pointer.as_ref() {
                        Some(pointer) => value
                            .pointer(pointer)
                            .cloned()
                            .ok_or_else(|| anyhow!("json pointer {pointer} not found in {label}"))?,
                        None => value,
                    };
                    let spec = crate::path_de::from_value_with_path::<ArrayShapeSpec>(value)
                        .map_err(|e| anyhow!("{label}: {e}"))?;
                    out.push((label.clone(), spec));
                }
            }
        }
        Ok(out)
    }

    /// Load and resolve everything. Inputs are independent, so resolution
    /// fans out across threads; contradictions are reported per input.
    fn resolve_all(&self) -> Result<Vec<(String, Resolved)>> {
        let specs = self.load_specs()?;
        if specs.is_empty() {
            bail!("no shape specifications found in the given inputs");
        }

        let results: Vec<_> = specs
            .par_iter()
            .map(|(label, spec)| (label.clone(), resolve(spec, &self.dtype)))
            .collect();

        let mut resolved = Vec::new();
        let mut failures = 0usize;
        for (label, result) in results {
            match result {
                Ok(res) => resolved.push((label, res)),
                Err(err) => {
                    failures += 1;
                    eprintln!("{} {label}: {err}", "contradiction:".red().bold());
                }
            }
        }
        if failures > 0 {
            bail!("{failures} input spec(s) could not be resolved");
        }
        Ok(resolved)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Schema(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }

                let resolved = target.input_settings.resolve_all()?;
                let schema = if resolved.len() == 1 {
                    crate::schema::emit_schema(&resolved[0].1)
                } else {
                    serde_json::Value::Array(
                        resolved
                            .iter()
                            .map(|(label, res)| {
                                serde_json::json!({
                                    "input": label,
                                    "schema": crate::schema::emit_schema(res),
                                })
                            })
                            .collect(),
                    )
                };
                let schema_src = serde_json::to_string_pretty(&schema)?;
                write_output(target.out.as_ref(), &schema_src, None)
            }
            Command::Range(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }

                let resolved = target.input_settings.resolve_all()?;
                let mut blocks = Vec::new();
                for (label, res) in &resolved {
                    let mut block = String::new();
                    if resolved.len() > 1 {
                        block.push_str(&format!("# {label}\n"));
                    }
                    block.push_str(&crate::render::render_module(res));
                    blocks.push(block);
                }
                let banner = format!(
                    "# Generated by shape-range at {}\n",
                    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S")
                );
                write_output(target.out.as_ref(), &blocks.join("\n"), Some(&banner))
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Write to the output file (banner prepended) or plain stdout.
fn write_output(out: Option<&PathBuf>, content: &str, banner: Option<&str>) -> Result<()> {
    match out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let mut full = String::new();
            if let Some(banner) = banner {
                full.push_str(banner);
            }
            full.push_str(content);
            std::fs::write(path, full)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        None => {
            println!("{content}");
        }
    }
    Ok(())
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            // Treat as a glob pattern
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            // Treat as a literal path
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
