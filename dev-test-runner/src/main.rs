//! Runs the JSON decode fixtures under `fixtures/`.
//!
//! A fixture pairs a schema with cases:
//! `{ "schema": {..}, "type": "Name", "mode"?: "strict" | "fast",
//!    "cases": [{ "name", "value", "ok", "error_kind"?, "message"? }] }`
//! where `message` is a regex matched against the rendered error.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use json_decode::{Decoder, Mode, Registry, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static FIXTURE_DIR: Lazy<PathBuf> =
    Lazy::new(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures"));

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Deserialize)]
struct Fixture {
    schema: serde_json::Value,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    mode: Mode,
    cases: Vec<Case>,
}

#[derive(Debug, Deserialize)]
struct Case {
    name: String,
    value: serde_json::Value,
    ok: bool,
    #[serde(default)]
    error_kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default)]
struct Tally {
    passed: usize,
    failed: Vec<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

fn load_fixture(path: &Path) -> Result<Fixture, String> {
    let src = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let de = &mut serde_json::Deserializer::from_str(&src);
    serde_path_to_error::deserialize(de)
        .map_err(|e| format!("{}: at JSON path {} → {}", path.display(), e.path(), e.inner()))
}

/// `Err` describes why the case did not behave as declared.
fn run_case(
    decoder: &Decoder,
    registry: &Registry,
    type_name: &str,
    case: &Case,
) -> Result<(), String> {
    let ty = registry
        .get(type_name)
        .ok_or_else(|| format!("type `{type_name}` is not declared"))?;
    match (decoder.decode(&Value::from(&case.value), &ty), case.ok) {
        (Ok(_), true) => Ok(()),
        (Ok(out), false) => Err(format!("expected a failure, decoded to {out}")),
        (Err(err), true) => Err(format!("expected success, got: {err}")),
        (Err(err), false) => {
            if let Some(kind) = &case.error_kind {
                let actual = format!("{:?}", err.kind());
                if &actual != kind {
                    return Err(format!("expected error kind {kind}, got {actual}: {err}"));
                }
            }
            if let Some(pattern) = &case.message {
                let re = Regex::new(pattern).map_err(|e| format!("bad message regex: {e}"))?;
                if !re.is_match(&err.to_string()) {
                    return Err(format!("message {:?} does not match /{pattern}/", err.to_string()));
                }
            }
            Ok(())
        }
    }
}

fn run_fixture(path: &Path, tally: &mut Tally) {
    let label = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let fixture = match load_fixture(path) {
        Ok(f) => f,
        Err(error) => {
            eprintln!("❌ {label}: {error}");
            tally.failed.push(label);
            return;
        }
    };
    let registry = match Registry::from_json_value(fixture.schema.clone()) {
        Ok(r) => r,
        Err(error) => {
            eprintln!("❌ {label}: schema: {error}");
            tally.failed.push(label);
            return;
        }
    };
    let decoder = Decoder::new(fixture.mode.into());
    for case in &fixture.cases {
        match run_case(&decoder, &registry, &fixture.type_name, case) {
            Ok(()) => {
                tally.passed += 1;
                eprintln!("✅ {label} / {}", case.name);
            }
            Err(why) => {
                eprintln!("❌ {label} / {}: {why}", case.name);
                tally.failed.push(format!("{label} / {}", case.name));
            }
        }
    }
}

fn run_all() -> Tally {
    let mut paths = std::fs::read_dir(&*FIXTURE_DIR)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    paths.sort();

    let mut tally = Tally::default();
    for path in &paths {
        run_fixture(path, &mut tally);
    }
    tally
}

fn main() -> ExitCode {
    let tally = run_all();
    eprintln!("—— {} passed, {} failed ——", tally.passed, tally.failed.len());
    if tally.failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
