//! schema-synth CLI
//!
//! Command-line interface for resolving, collating and typing JSON Schemas.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use schema_synth::{
    collate, load_document_auto, DeclaredName, DefaultSource, Diagnostic, Document, Resolver,
    Schema, SynthOptions, Synthesis, Synthesizer, TypeNameTable,
};
use serde::Serialize;
use tracing::Level;

#[derive(Parser)]
#[command(name = "schema-synth")]
#[command(about = "Resolve JSON Schema references and synthesize static types")]
#[command(version)]
struct Cli {
    /// Log resolution and fetch details to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Exit with code 1 if any diagnostic was reported
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize the type of a schema
    Type {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// JSON Pointer to the schema inside the document (default: root)
        #[arg(long)]
        pointer: Option<String>,

        /// Declared name for the schema at a pointer: PTR=NAME or PTR=NS.NAME
        #[arg(long = "name", value_name = "PTR=NAME")]
        names: Vec<String>,

        /// Namespace the generated code lives in
        #[arg(long, default_value = "")]
        namespace: String,

        /// Recursion limit for nested schemas
        #[arg(long, default_value_t = schema_synth::DEFAULT_MAX_DEPTH)]
        max_depth: usize,

        /// Output the type node and diagnostics as JSON
        #[arg(long)]
        json: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Resolve a $ref against a schema document and print the target
    Resolve {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Reference to resolve (e.g. "#/$defs/pet" or "common.json#/$defs/id")
        reference: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the effective schema after merging allOf branches
    Collate {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// JSON Pointer to the schema inside the document (default: root)
        #[arg(long)]
        pointer: Option<String>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Type {
            schema,
            pointer,
            names,
            namespace,
            max_depth,
            json,
            pretty,
        } => run_type(TypeArgs {
            schema,
            pointer,
            names,
            options: SynthOptions::new(namespace).max_depth(max_depth),
            json_output: json,
            pretty,
            strict: cli.strict,
        }),
        Commands::Resolve {
            schema,
            reference,
            pretty,
        } => run_resolve(&schema, &reference, pretty, cli.strict),
        Commands::Collate {
            schema,
            pointer,
            pretty,
        } => run_collate(&schema, pointer.as_deref(), pretty, cli.strict),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

struct TypeArgs {
    schema: String,
    pointer: Option<String>,
    names: Vec<String>,
    options: SynthOptions,
    json_output: bool,
    pretty: bool,
    strict: bool,
}

fn run_type(args: TypeArgs) -> Result<(), u8> {
    let TypeArgs {
        schema,
        pointer,
        names,
        options,
        json_output,
        pretty,
        strict,
    } = args;

    let document = load(&schema)?;
    let table = name_table(&document, &names, &options.namespace)?;
    let source = DefaultSource;
    let mut synthesizer = Synthesizer::new(&document, &source, &table, options);

    let ty = match pointer.as_deref() {
        Some(pointer) => synthesizer.type_of_reference(&fragment(pointer)),
        None => {
            let root = document.root_schema().map_err(|e| {
                eprintln!("Error: {}", e);
                e.exit_code() as u8
            })?;
            synthesizer.type_of(&root)
        }
    }
    .map_err(|e| {
        eprintln!("Error: {}", e);
        2u8
    })?;

    let synthesis = Synthesis {
        ty,
        diagnostics: synthesizer.take_diagnostics(),
    };
    if json_output {
        println!("{}", to_json(&synthesis, pretty)?);
    } else {
        println!("{}", synthesis.ty);
    }
    check_strict(strict, &synthesis.diagnostics)
}

fn run_resolve(schema: &str, reference: &str, pretty: bool, strict: bool) -> Result<(), u8> {
    let document = load(schema)?;
    let source = DefaultSource;
    let mut resolver = Resolver::new(&source);

    let Some(resolved) = resolver.resolve_reference(&document, reference) else {
        eprintln!("Error: cannot resolve {}", reference);
        return Err(1);
    };
    println!("{}", to_json(&resolved.schema, pretty)?);
    check_strict(strict, resolver.diagnostics())
}

fn run_collate(schema: &str, pointer: Option<&str>, pretty: bool, strict: bool) -> Result<(), u8> {
    let document = load(schema)?;
    let source = DefaultSource;
    let mut resolver = Resolver::new(&source);

    let target = match pointer {
        Some(pointer) => match resolver.resolve_reference(&document, &fragment(pointer)) {
            Some(resolved) => resolved.schema,
            None => {
                eprintln!("Error: no schema at {}", pointer);
                return Err(1);
            }
        },
        None => document.root_schema().map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?,
    };

    let collated = match target {
        Schema::Object(object) => collate(&mut resolver, &document, &object).map_err(|e| {
            eprintln!("Error: {}", e);
            2u8
        })?,
        boolean => boolean,
    };
    println!("{}", to_json(&collated, pretty)?);
    check_strict(strict, resolver.diagnostics())
}

fn load(source: &str) -> Result<Document, u8> {
    load_document_auto(source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

/// Accept pointers with or without the leading `#`.
fn fragment(pointer: &str) -> String {
    if pointer.starts_with('#') {
        pointer.to_string()
    } else {
        format!("#{}", pointer)
    }
}

/// Build the type-name table from `PTR=NAME` arguments. A dotted name is
/// split into namespace and name at the last dot.
fn name_table(document: &Document, names: &[String], namespace: &str) -> Result<TypeNameTable, u8> {
    let mut table = TypeNameTable::new();
    for entry in names {
        let Some((pointer, name)) = entry.split_once('=') else {
            eprintln!("Error: expected PTR=NAME, got \"{}\"", entry);
            return Err(2);
        };
        let declared = match name.rsplit_once('.') {
            Some((ns, name)) => DeclaredName::new(ns, name),
            None => DeclaredName::new(namespace, name),
        };
        let uri = document.join(&fragment(pointer)).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;
        table.insert_reference(&uri, declared);
    }
    Ok(table)
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String, u8> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })
}

fn check_strict(strict: bool, diagnostics: &[Diagnostic]) -> Result<(), u8> {
    if strict && !diagnostics.is_empty() {
        eprintln!("{} diagnostic(s) reported", diagnostics.len());
        return Err(1);
    }
    Ok(())
}
