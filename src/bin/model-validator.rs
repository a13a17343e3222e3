//! # Content Model Validator
//!
//! A command-line utility for validating content model files to ensure they conform to the
//! expected format and can be deployed by the content model engine library.
//!
//! ## Overview
//!
//! This utility performs comprehensive validation of model files, including:
//! - JSON syntax validation
//! - Required field presence checking
//! - Namespace declaration and import resolution
//! - Property type and constraint reference validation
//! - Wildcard property pattern validation
//! - Class hierarchy checks (parent presence, property references)
//! - Combined registration tests across a whole directory
//!
//! ## Usage
//!
//! ### Validate a Single Model File
//!
//! ```bash
//! cargo run --bin model-validator models/forum.json
//! ```
//!
//! ### Validate All Models in a Directory
//!
//! ```bash
//! cargo run --bin model-validator ./models/
//! ```
//!
//! ### Choose the Input Format
//!
//! Files are read as the compact format by default; pass `--format definition`
//! for verbose model-definition documents.
//!
//! ```bash
//! cargo run --bin model-validator -- --format definition models/forum.json
//! ```
//!
//! ## Output Examples
//!
//! ### Successful Validation
//!
//! ```text
//! Validating model file: models/forum.json
//! ✓ Model is valid!
//!
//! Model Summary:
//!   Name: fm:forumModel
//!   Description: Discussion board content types
//!   Namespaces: 1
//!     - fm -> http://example.com/model/forum/1.0
//!   Types: 3
//!   Aspects: 1
//!   Properties: 7
//!   Indexed properties: 6
//!   Property data types:
//!     - d:text: 4
//!     - d:int: 2
//!     - d:datetime: 1
//! ```
//!
//! ### Directory Validation
//!
//! ```text
//! Validating models in directory: ./models/
//!
//! Validating: base.json
//!   ✓ Parsed - sys:baseModel (2 types, 5 properties)
//!
//! Validating: forum.json
//!   ✓ Parsed - fm:forumModel (3 types, 7 properties)
//!
//! Validation Summary:
//!   Parsed models: 2
//!   Invalid models: 0
//!
//! Testing combined registration...
//! ✓ All models registered together
//!   Total models: 2
//!     - fm:forumModel
//!     - sys:baseModel
//! ```
//!
//! ### Error Output
//!
//! ```text
//! Validating model file: broken.json
//! ❌ Model validation failed: Model 'fm:forumModel' imports unresolved namespace prefix 'd'
//! ```
//!
//! ## Validation Rules
//!
//! The validator enforces these rules:
//!
//! ### Document Structure
//! - Must be valid JSON
//! - Must have a non-empty `name` field
//! - Namespace prefixes and URIs must be unique within the document
//!
//! ### Definitions
//! - Every qualified name must use a declared or imported prefix
//! - Property types must resolve to known data types (`d:text`, `d:int`, ...)
//! - Constraint references must point at declared constraints
//! - Wildcard property names must end in exactly one `*` and must not
//!   overlap with another wildcard's stem
//! - Every type except the root type must name a parent
//!
//! A single file is validated in isolation, so imports of prefixes defined in
//! *other* files fail; validate the whole directory to resolve imports across
//! files in any order.
//!
//! ## Exit Codes
//!
//! - `0`: All models are valid
//! - `1`: One or more models are invalid or validation error occurred
//!
//! ## Integration with the Engine
//!
//! This utility uses the same parser and validator as the engine's deploy
//! path, ensuring that models validated here will deploy correctly into a
//! running engine instance.

use content_model_engine::constraints::ConstraintRegistry;
use content_model_engine::engine::EngineConfig;
use content_model_engine::model::{Model, ModelFormat, ModelParser, ModelValidator};
use content_model_engine::registry::TenantGraph;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut format = ModelFormat::Compact;
    let mut target: Option<String> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--format" => {
                i += 1;
                format = match args.get(i).map(String::as_str).and_then(ModelFormat::from_tag) {
                    Some(format) => format,
                    None => {
                        eprintln!("Error: --format expects 'compact' or 'definition'");
                        process::exit(1);
                    }
                };
            }
            other => target = Some(other.to_string()),
        }
        i += 1;
    }

    let Some(target) = target else {
        eprintln!(
            "Usage: {} [--format <compact|definition>] <model-file-or-directory>",
            args[0]
        );
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  {} models/forum.json", args[0]);
        eprintln!("  {} ./models/", args[0]);
        process::exit(1);
    };

    let path = Path::new(&target);

    if path.is_file() {
        validate_single_file(path, format);
    } else if path.is_dir() {
        validate_directory(path, format);
    } else {
        eprintln!(
            "Error: '{}' is not a valid file or directory",
            path.display()
        );
        process::exit(1);
    }
}

fn validate_single_file(file_path: &Path, format: ModelFormat) {
    println!("Validating model file: {}", file_path.display());

    match load_and_validate_model(file_path, format) {
        Ok(model) => {
            println!("✓ Model is valid!");
            print_model_summary(&model);
        }
        Err(e) => {
            eprintln!("❌ Model validation failed: {}", e);
            process::exit(1);
        }
    }
}

fn validate_directory(dir_path: &Path, format: ModelFormat) {
    println!("Validating models in directory: {}", dir_path.display());

    let mut parsed = Vec::new();
    let mut error_count = 0;

    // Look for JSON files in the directory, in a stable order.
    let mut paths: Vec<PathBuf> = match fs::read_dir(dir_path) {
        Ok(entries) => entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("json"))
            .collect(),
        Err(e) => {
            eprintln!("Error reading directory: {}", e);
            process::exit(1);
        }
    };
    paths.sort();

    for path in &paths {
        println!(
            "\nValidating: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match parse_model_file(path, format) {
            Ok(model) => {
                println!(
                    "  ✓ Parsed - {} ({} types, {} properties)",
                    model.name,
                    model.types.len(),
                    model.properties.len()
                );
                parsed.push(model);
            }
            Err(e) => {
                eprintln!("  ❌ Invalid - {}", e);
                error_count += 1;
            }
        }
    }

    println!("\nValidation Summary:");
    println!("  Parsed models: {}", parsed.len());
    println!("  Invalid models: {}", error_count);

    if error_count > 0 {
        process::exit(1);
    }

    // Register everything into one graph, the way the engine loads a tenant.
    println!("\nTesting combined registration...");
    match register_all(parsed) {
        Ok(graph) => {
            println!("✓ All models registered together");
            let models = graph.models();
            println!("  Total models: {}", models.len());
            for model in models {
                println!("    - {}", model.name);
            }
        }
        Err(e) => {
            eprintln!("❌ Combined registration failed: {}", e);
            process::exit(1);
        }
    }
}

fn parse_model_file(
    file_path: &Path,
    format: ModelFormat,
) -> Result<Model, Box<dyn std::error::Error>> {
    // Read the file
    let content = fs::read_to_string(file_path)?;

    // Parse as JSON first
    let json_value: serde_json::Value = serde_json::from_str(&content)?;

    // Definition documents may wrap everything in a top-level "model" key
    let doc = json_value.get("model").unwrap_or(&json_value);
    let obj = doc.as_object().ok_or("Model document must be a JSON object")?;

    if !obj.contains_key("name") {
        return Err("Model document missing required 'name' field".into());
    }

    let constraints = ConstraintRegistry::new();
    let parser = ModelParser::new(&constraints);
    let model = parser.parse_source(&content, format)?;
    Ok(model)
}

fn load_and_validate_model(
    file_path: &Path,
    format: ModelFormat,
) -> Result<Model, Box<dyn std::error::Error>> {
    let model = parse_model_file(file_path, format)?;

    // Validate against empty graphs; cross-file imports need directory mode
    let constraints = ConstraintRegistry::new();
    let config = EngineConfig::default();
    let validator = ModelValidator::new(&constraints, &config.root_type);
    let tenant = TenantGraph::new("validator");
    let common = TenantGraph::new("validator");
    validator.validate(&model, &tenant, &common)?;

    Ok(model)
}

fn register_all(models: Vec<Model>) -> Result<TenantGraph, Box<dyn std::error::Error>> {
    let constraints = ConstraintRegistry::new();
    let config = EngineConfig::default();
    let validator = ModelValidator::new(&constraints, &config.root_type);
    let common = TenantGraph::new("validator");
    let mut graph = TenantGraph::new("validator");

    // Fix-point loop; registration order must not matter, as in the engine.
    let mut pending: Vec<Arc<Model>> = models.into_iter().map(Arc::new).collect();
    while !pending.is_empty() {
        let before = pending.len();
        let mut retry = Vec::new();
        let mut last_error = None;

        for model in pending {
            match validator
                .validate(&model, &graph, &common)
                .and_then(|_| graph.with_model(Arc::clone(&model)))
            {
                Ok(next) => graph = next,
                Err(e) => {
                    last_error = Some(format!("{}: {}", model.name, e));
                    retry.push(model);
                }
            }
        }

        if retry.len() == before {
            let reason =
                last_error.unwrap_or_else(|| "registration made no progress".to_string());
            return Err(reason.into());
        }
        pending = retry;
    }

    Ok(graph)
}

fn print_model_summary(model: &Model) {
    println!();
    println!("Model Summary:");
    println!("  Name: {}", model.name);
    if let Some(description) = &model.description {
        println!("  Description: {}", description);
    }
    println!("  Namespaces: {}", model.namespaces.len());
    for ns in &model.namespaces {
        println!("    - {} -> {}", ns.prefix, ns.uri);
    }
    if !model.imports.is_empty() {
        println!("  Imports: {}", model.imports.join(", "));
    }
    println!("  Types: {}", model.types.len());
    println!("  Aspects: {}", model.aspects.len());
    println!("  Properties: {}", model.properties.len());
    if !model.dynamic_properties.is_empty() {
        println!("  Dynamic properties: {}", model.dynamic_properties.len());
    }
    if !model.constraints.is_empty() {
        println!("  Constraints: {}", model.constraints.len());
    }
    if !model.associations.is_empty() {
        println!("  Associations: {}", model.associations.len());
    }

    // Count property data types and indexing
    let mut type_counts = std::collections::HashMap::new();
    let mut indexed_count = 0;

    for property in &model.properties {
        *type_counts
            .entry(property.property_type.clone())
            .or_insert(0) += 1;
        if property.indexed {
            indexed_count += 1;
        }
    }

    println!("  Indexed properties: {}", indexed_count);
    if !type_counts.is_empty() {
        println!("  Property data types:");
        for (data_type, count) in type_counts {
            println!("    - {}: {}", data_type, count);
        }
    }
}
