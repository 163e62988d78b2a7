//! Course content command-line tool.
//!
//! Provides the `coursegraph` binary for checking and converting course
//! files offline, and for inspecting and migrating stored courses. Stored
//! course commands go through the same `CourseService` an editor backend
//! uses, so both entry points apply identical validation.
//!
//! Output is JSON on stdout; logs go to stderr. Exit codes:
//! 0 = success, 1 = usage or conversion error, 2 = validation failure,
//! 3 = I/O or storage error.

mod config;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;

use coursegraph_check::{check_flow, validate_course, CheckMode, FlowFinding, Problem};
use coursegraph_core::codec::block::{decode_block_values, encode_blocks};
use coursegraph_core::codec::yaml::{parse_yaml, to_yaml_string};
use coursegraph_core::codec::Decoded;
use coursegraph_core::id::{CourseKey, ElementId};
use coursegraph_service::{CourseService, ServiceError};
use coursegraph_storage::{FsCourseFiles, SqliteStore};

use crate::config::{Config, Overrides};

const EXIT_OK: i32 = 0;
const EXIT_USAGE: i32 = 1;
const EXIT_INVALID: i32 = 2;
const EXIT_IO: i32 = 3;

/// Course content tools.
#[derive(Parser)]
#[command(name = "coursegraph", about = "Validate, convert, and migrate course content")]
struct Cli {
    /// SQLite database file [env: COURSEGRAPH_DB_PATH].
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Scripts folder holding courses.yml [env: COURSEGRAPH_SCRIPTS_DIR].
    #[arg(long, global = true)]
    scripts: Option<PathBuf>,

    /// Account owning database courses [env: COURSEGRAPH_ACCOUNT_ID].
    #[arg(long, global = true)]
    account: Option<i64>,

    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Validate a course file (YAML document or JSON block array).
    Validate {
        file: PathBuf,

        /// Apply the import policy: every problem blocks.
        #[arg(long)]
        import: bool,

        /// Element the course starts from (default: the first).
        #[arg(long)]
        entry: Option<String>,
    },

    /// Convert a course file to another representation.
    Convert {
        file: PathBuf,

        #[arg(long, value_enum)]
        to: Target,
    },

    /// Print a stored course as the editor sees it.
    Show {
        #[arg(long)]
        course: String,
    },

    /// List indexed and database courses.
    List,

    /// Move a YAML course into the database.
    Import {
        #[arg(long)]
        course: String,
    },

    /// Move a database course into a YAML file.
    Export {
        #[arg(long)]
        course: String,

        /// Document path, relative to the scripts folder.
        #[arg(long)]
        path: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Target {
    /// Editor block JSON.
    Blocks,
    /// YAML course document.
    Yaml,
    /// Canonical element JSON.
    Json,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_OK };
            let _ = e.print();
            process::exit(code);
        }
    };

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    let overrides = Overrides {
        db_path: cli.db,
        scripts_dir: cli.scripts,
        account: cli.account,
    };

    let exit_code = match cli.command {
        Commands::Validate {
            file,
            import,
            entry,
        } => run_validate(&file, import, entry.map(ElementId::from)),
        Commands::Convert { file, to } => run_convert(&file, to),
        command => match Config::from_env(overrides) {
            Ok(config) => run_stored(&config, command),
            Err(e) => {
                eprintln!("Error: {e}");
                EXIT_USAGE
            }
        },
    };
    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Offline file commands
// ---------------------------------------------------------------------------

/// Reads a course file: `.json` files hold editor blocks, anything else is
/// a YAML course document.
fn read_course_file(path: &Path) -> Result<Decoded, i32> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        eprintln!("Error: failed to read '{}': {e}", path.display());
        EXIT_IO
    })?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(values)) => Ok(decode_block_values(values)),
            Ok(_) => {
                eprintln!("Error: '{}' is not a JSON array of blocks", path.display());
                Err(EXIT_USAGE)
            }
            Err(e) => {
                eprintln!("Error: '{}' is not valid JSON: {e}", path.display());
                Err(EXIT_USAGE)
            }
        }
    } else {
        parse_yaml(&text).map_err(|e| {
            eprintln!("Error: '{}': {e}", path.display());
            EXIT_USAGE
        })
    }
}

#[derive(Serialize)]
struct ValidateOutput<'a> {
    valid: bool,
    mode: CheckMode,
    elements: usize,
    problems: &'a [Problem],
    findings: &'a [FlowFinding],
}

/// Execute the validate subcommand.
fn run_validate(path: &Path, import: bool, entry: Option<ElementId>) -> i32 {
    let decoded = match read_course_file(path) {
        Ok(decoded) => decoded,
        Err(code) => return code,
    };
    let mode = if import {
        CheckMode::ImportSave
    } else {
        CheckMode::EditorSave
    };

    let report = validate_course(&decoded, entry.as_ref());
    let flow = check_flow(&decoded.elements, entry.as_ref());
    let valid = !report.blocks(mode) && !flow.has_errors();

    print_json(&ValidateOutput {
        valid,
        mode,
        elements: decoded.input_len(),
        problems: &report.problems,
        findings: &flow.findings,
    });
    if valid {
        EXIT_OK
    } else {
        EXIT_INVALID
    }
}

/// Execute the convert subcommand. Skipped elements are reported on stderr
/// and fail the conversion, since the output would silently lose them.
fn run_convert(path: &Path, to: Target) -> i32 {
    let decoded = match read_course_file(path) {
        Ok(decoded) => decoded,
        Err(code) => return code,
    };
    if !decoded.is_clean() {
        for skipped in &decoded.skipped {
            eprintln!(
                "Error: element {} at position {}: {}",
                skipped.element.as_ref().map_or("?", |id| id.as_str()),
                skipped.position,
                skipped.message
            );
        }
        return EXIT_USAGE;
    }

    match to {
        Target::Blocks => print_json(&encode_blocks(&decoded.elements)),
        Target::Json => print_json(&decoded.elements),
        Target::Yaml => match to_yaml_string(&decoded.elements) {
            Ok(text) => print!("{text}"),
            Err(e) => {
                eprintln!("Error: {e}");
                return EXIT_USAGE;
            }
        },
    }
    EXIT_OK
}

// ---------------------------------------------------------------------------
// Stored course commands
// ---------------------------------------------------------------------------

fn run_stored(config: &Config, command: Commands) -> i32 {
    let store = match SqliteStore::new(&config.db_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!(
                "Error: failed to open database '{}': {e}",
                config.db_path.display()
            );
            return EXIT_IO;
        }
    };
    let files = FsCourseFiles::new(&config.scripts_dir);
    let mut service = CourseService::new(store, files);
    let key = |course: &str| CourseKey::new(config.account, course);

    let result = match command {
        Commands::Show { course } => service.get_course(&key(&course)).map(|c| to_json(&c)),
        Commands::List => service.list_courses(config.account).map(|l| to_json(&l)),
        Commands::Import { course } => service
            .migrate_to_database(&key(&course))
            .map(|r| to_json(&r)),
        Commands::Export { course, path } => service
            .export_to_yaml(&key(&course), &path)
            .map(|r| to_json(&r)),
        Commands::Validate { .. } | Commands::Convert { .. } => return EXIT_USAGE,
    };

    match result {
        Ok(value) => {
            print_json(&value);
            EXIT_OK
        }
        Err(e) => {
            tracing::error!(code = e.code(), "{e}");
            print_json(&serde_json::json!({ "success": false, "error": e.detail() }));
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(err: &ServiceError) -> i32 {
    match err.code() {
        "VALIDATION_FAILED" => EXIT_INVALID,
        "BAD_REQUEST" => EXIT_USAGE,
        _ => EXIT_IO,
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|e| serde_json::json!({ "error": format!("failed to serialize result: {e}") }))
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize result: {e}\"}}"));
    println!("{json}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "coursegraph",
            "export",
            "--course",
            "python",
            "--path",
            "python.yml",
            "--db",
            "x.db",
        ])
        .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("x.db")));
        assert!(matches!(cli.command, Commands::Export { .. }));
    }

    #[test]
    fn convert_requires_known_target() {
        assert!(Cli::try_parse_from(["coursegraph", "convert", "c.yml", "--to", "xml"]).is_err());
        let cli =
            Cli::try_parse_from(["coursegraph", "convert", "c.yml", "--to", "blocks"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Convert {
                to: Target::Blocks,
                ..
            }
        ));
    }

    #[test]
    fn validation_failures_map_to_exit_two() {
        let err = ServiceError::ValidationFailed {
            errors: Vec::new(),
            warnings: Vec::new(),
        };
        assert_eq!(exit_code_for(&err), EXIT_INVALID);
    }

    #[test]
    fn yaml_files_validate() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.yml");
        std::fs::write(&good, "m:\n  type: message\n  text: Hi\nfin:\n  type: end\n").unwrap();
        let bad = dir.path().join("bad.yml");
        std::fs::write(
            &bad,
            "m:\n  type: message\n  text: Hi\n  options:\n    - text: Go\n      goto: nowhere\n",
        )
        .unwrap();

        assert_eq!(run_validate(&good, false, None), EXIT_OK);
        assert_eq!(run_validate(&bad, false, None), EXIT_INVALID);
        assert_eq!(run_convert(&good, Target::Blocks), EXIT_OK);
        assert_eq!(run_validate(&dir.path().join("missing.yml"), false, None), EXIT_IO);
    }
}
