//! CLI: check documents against a schema, or describe a schema.
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;

use crate::config::{DecodeConfig, Mode};
use crate::decode::Decoder;
use crate::jq_exec::JqFilter;
use crate::schema::Registry;
use crate::types::Type;
use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// decode JSON documents against named types from a schema document
#[derive(Parser, Debug)]
#[command(name = "json-decode")]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// decode every input document and report failures
    Check(CheckCmd),
    /// list the types a schema declares
    Describe(DescribeCmd),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document; every output is checked.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct CheckCmd {
    #[command(flatten)]
    input_settings: InputSettings,

    /// schema document (.json)
    #[arg(long, short)]
    schema: PathBuf,

    /// type to decode as (defaults to the schema's `root`)
    #[arg(long = "type", short = 't')]
    type_name: Option<String>,

    /// strict checks everything; fast trusts the input's shape
    #[arg(long, value_enum, default_value_t = Mode::Strict)]
    mode: Mode,

    /// only print failures
    #[arg(long, short)]
    quiet: bool,
}

#[derive(clap::Parser, Debug)]
struct DescribeCmd {
    /// schema document (.json)
    #[arg(long, short)]
    schema: PathBuf,
}

/// One document to decode, with where it came from.
#[derive(Debug)]
struct Document {
    source: String,
    json: serde_json::Value,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_documents(&self) -> Result<Vec<Document>> {
        let jq = self.jq_expr.as_deref().map(JqFilter::compile).transpose()?;
        let source_paths = resolve_file_path_patterns(&self.input)
            .context("failed to resolve input file paths")?;

        let mut out = Vec::new();
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file ({source_path_str})"))?;

            let parsed: Vec<(String, serde_json::Value)> = if self.ndjson {
                source
                    .lines()
                    .enumerate()
                    .filter(|(_, line)| !line.trim().is_empty())
                    .map(|(i, line)| {
                        let label = format!("{source_path_str}:{}", i + 1);
                        serde_json::from_str(line)
                            .with_context(|| format!("failed to parse JSON ({label})"))
                            .map(|json| (label, json))
                    })
                    .collect::<Result<_>>()?
            } else {
                let json = serde_json::from_str(&source).with_context(|| {
                    format!("failed to parse JSON source file ({source_path_str})")
                })?;
                vec![(source_path_str.clone(), json)]
            };

            for (label, json) in parsed {
                let json = match self.json_pointer.as_deref() {
                    None => json,
                    Some(ptr) => json
                        .pointer(ptr)
                        .cloned()
                        .ok_or_else(|| anyhow!("JSON pointer {ptr} selects nothing in {label}"))?,
                };
                match jq.as_ref() {
                    None => out.push(Document { source: label, json }),
                    Some(filter) => {
                        let results = filter
                            .run(&json)
                            .with_context(|| format!("failed to apply jq expression to {label}"))?;
                        let many = results.len() > 1;
                        for (i, json) in results.into_iter().enumerate() {
                            let source = if many { format!("{label}#{i}") } else { label.clone() };
                            out.push(Document { source, json });
                        }
                    }
                }
            }
        }
        tracing::debug!(documents = out.len(), "inputs loaded");
        Ok(out)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// `Ok(false)` when some document failed to decode.
    pub fn run(&self) -> Result<bool> {
        match &self.cmd {
            Command::Check(target) => target.run(),
            Command::Describe(target) => {
                let registry = load_registry(&target.schema)?;
                let root = registry.root();
                for (name, ty) in registry.iter() {
                    let is_root = root.as_ref().is_some_and(|r| r.ptr_eq(ty));
                    let marker = if is_root { " (root)" } else { "" };
                    println!("{}{marker} = {}", name.bold(), ty.shape_name());
                }
                Ok(true)
            }
        }
    }
}

impl CheckCmd {
    fn run(&self) -> Result<bool> {
        let registry = load_registry(&self.schema)?;
        let ty = self.target_type(&registry)?;
        let decoder = Decoder::new(DecodeConfig::from(self.mode));
        let documents = self.input_settings.load_documents()?;
        tracing::info!(
            target_type = %ty.display_name(),
            mode = ?self.mode,
            documents = documents.len(),
            "checking"
        );

        let outcomes: Vec<(&Document, Result<(), String>)> = documents
            .par_iter()
            .map(|doc| {
                let outcome = decoder
                    .decode(&Value::from(&doc.json), &ty)
                    .map(drop)
                    .map_err(|e| e.to_string());
                (doc, outcome)
            })
            .collect();

        let mut failures = 0usize;
        for (doc, outcome) in &outcomes {
            match outcome {
                Ok(()) if !self.quiet => println!("{} {}", "✅".green(), doc.source),
                Ok(()) => {}
                Err(message) => {
                    failures += 1;
                    println!("{} {}: {}", "❌".red(), doc.source.bold(), message);
                }
            }
        }
        if failures > 0 {
            eprintln!("{}", format!("{failures} of {} documents failed", outcomes.len()).red());
        }
        Ok(failures == 0)
    }

    fn target_type(&self, registry: &Registry) -> Result<Type> {
        match self.type_name.as_deref() {
            Some(name) => registry
                .get(name)
                .ok_or_else(|| anyhow!("type `{name}` is not declared")),
            None => match registry.root() {
                Some(root) => Ok(root),
                None => bail!("schema declares no `root`; pass --type"),
            },
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn load_registry(path: &std::path::Path) -> Result<Registry> {
    Registry::load(path).with_context(|| format!("failed to load schema ({})", path.display()))
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
            let before = out.len();
            for entry in glob::glob(pattern)? {
                out.push(entry?);
            }
            if out.len() == before {
                // explicitly a glob but matched nothing
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
