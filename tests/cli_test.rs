//! CLI integration tests for schema-synth binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("schema-synth"))
}

// Helper to create a temp schema file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

mod type_command {
    use super::*;

    #[test]
    fn basic_type() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r#"{ "type": "integer", "minimum": 0, "maximum": 255 }"#,
        );

        cmd()
            .args(["type", schema.to_str().unwrap()])
            .assert()
            .success()
            .stdout("UInt8\n");
    }

    #[test]
    fn type_at_pointer() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r#"{
                "$defs": {
                    "name": { "type": "string", "minLength": 1, "maxLength": 64 }
                }
            }"#,
        );

        cmd()
            .args(["type", schema.to_str().unwrap(), "--pointer", "/$defs/name"])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "String where this.length.isBetween(1, 64)",
            ));
    }

    #[test]
    fn type_as_json() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", r#"{ "type": ["string", "null"] }"#);

        cmd()
            .args(["type", schema.to_str().unwrap(), "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""kind":"nullable""#))
            .stdout(predicate::str::contains(r#""builtin":"string""#))
            .stdout(predicate::str::contains(r#""diagnostics":[]"#));
    }

    #[test]
    fn declared_names() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r##"{
                "type": "array",
                "items": { "$ref": "#/$defs/pet" },
                "$defs": { "pet": { "type": "object" } }
            }"##,
        );

        cmd()
            .args([
                "type",
                schema.to_str().unwrap(),
                "--name",
                "/$defs/pet=zoo.Pet",
                "--namespace",
                "app",
            ])
            .assert()
            .success()
            .stdout("List<zoo.Pet>\n");

        cmd()
            .args([
                "type",
                schema.to_str().unwrap(),
                "--name",
                "#/$defs/pet=Pet",
            ])
            .assert()
            .success()
            .stdout("List<Pet>\n");
    }

    #[test]
    fn malformed_name_argument() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", r#"{}"#);

        cmd()
            .args(["type", schema.to_str().unwrap(), "--name", "Pet"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("PTR=NAME"));
    }

    #[test]
    fn yaml_schema() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.yaml",
            "type: object\nadditionalProperties:\n  type: boolean\n",
        );

        cmd()
            .args(["type", schema.to_str().unwrap()])
            .assert()
            .success()
            .stdout("Map<String, Boolean>\n");
    }

    #[test]
    fn cross_file_reference() {
        let dir = TempDir::new().unwrap();
        write_temp_file(
            &dir,
            "common.json",
            r#"{ "$defs": { "id": { "type": "string", "format": "uri" } } }"#,
        );
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r#"{ "type": "array", "items": { "$ref": "common.json#/$defs/id" } }"#,
        );

        cmd()
            .args(["type", schema.to_str().unwrap()])
            .assert()
            .success()
            .stdout("List<Uri>\n");
    }
}

mod resolve_command {
    use super::*;

    #[test]
    fn resolves_pointer() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r##"{ "$defs": { "a": { "$ref": "#/$defs/b" }, "b": { "type": "boolean" } } }"##,
        );

        cmd()
            .args(["resolve", schema.to_str().unwrap(), "#/$defs/a"])
            .assert()
            .success()
            .stdout(r#"{"type":"boolean"}"#.to_owned() + "\n");
    }

    #[test]
    fn resolve_with_pretty() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r#"{ "$defs": { "a": { "type": "string" } } }"#,
        );

        cmd()
            .args(["resolve", schema.to_str().unwrap(), "#/$defs/a", "--pretty"])
            .assert()
            .success()
            .stdout(predicate::str::contains("{\n  \"type\": \"string\"\n}"));
    }

    #[test]
    fn unresolvable_reference() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", r#"{ "$defs": {} }"#);

        cmd()
            .args(["resolve", schema.to_str().unwrap(), "#/$defs/missing"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("R005"))
            .stderr(predicate::str::contains("cannot resolve"));
    }
}

mod collate_command {
    use super::*;

    #[test]
    fn merges_all_of() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r#"{
                "allOf": [
                    { "type": "object", "required": ["a"] },
                    { "required": ["b"], "minProperties": 1 }
                ]
            }"#,
        );

        cmd()
            .args(["collate", schema.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""required":["a","b"]"#))
            .stdout(predicate::str::contains(r#""type":"object""#))
            .stdout(predicate::str::contains("allOf").not());
    }

    #[test]
    fn collate_at_pointer() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r#"{
                "$defs": {
                    "range": { "allOf": [{ "minimum": 2 }, { "minimum": 5 }] }
                }
            }"#,
        );

        cmd()
            .args([
                "collate",
                schema.to_str().unwrap(),
                "--pointer",
                "/$defs/range",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""minimum":5.0"#));
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn file_not_found() {
        cmd()
            .args(["type", "/nonexistent/schema.json"])
            .assert()
            .code(3)
            .stderr(
                predicate::str::contains("not found").or(predicate::str::contains("No such file")),
            );
    }

    #[test]
    fn invalid_json_schema() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "bad.json", r#"{ not valid json"#);

        cmd()
            .args(["type", schema.to_str().unwrap()])
            .assert()
            .code(2);
    }

    #[test]
    fn merge_conflict() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r#"{ "allOf": [{ "type": "string" }, { "type": "integer" }] }"#,
        );

        cmd()
            .args(["type", schema.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("conflicting values for `type`"));
    }

    #[test]
    fn unresolved_reference_degrades() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r##"{ "type": "array", "items": { "$ref": "#/missing" } }"##,
        );

        cmd()
            .args(["type", schema.to_str().unwrap()])
            .assert()
            .success()
            .stdout("List<Unknown>\n")
            .stderr(predicate::str::contains("R005"));
    }

    #[test]
    fn strict_fails_on_diagnostics() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r#"{ "type": "array", "items": { "$ref": "missing.json" } }"#,
        );

        cmd()
            .args(["type", schema.to_str().unwrap(), "--strict"])
            .assert()
            .code(1)
            .stdout("List<Unknown>\n")
            .stderr(predicate::str::contains("1 diagnostic(s) reported"));
    }
}

mod required_args {
    use super::*;

    #[test]
    fn missing_schema_path() {
        cmd().args(["type"]).assert().failure();
    }

    #[test]
    fn missing_reference() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", r#"{}"#);

        cmd()
            .args(["resolve", schema.to_str().unwrap()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("REFERENCE"));
    }
}

mod help_and_version {
    use super::*;

    #[test]
    fn help_flag() {
        cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Resolve JSON Schema references and synthesize static types",
            ));
    }

    #[test]
    fn version_flag() {
        cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("schema-synth"));
    }

    #[test]
    fn type_help() {
        cmd()
            .args(["type", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--pointer"))
            .stdout(predicate::str::contains("--name"))
            .stdout(predicate::str::contains("--namespace"));
    }
}
