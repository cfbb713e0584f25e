use assert_cmd::cargo::cargo_bin_cmd;
use lopdf::{dictionary, Document, Object, Stream};
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn reals(values: [f32; 4]) -> Object {
    Object::Array(values.into_iter().map(Object::Real).collect())
}

/// Two-page US Letter PDF; page 1 carries a square and a link
fn write_fixture(dir: &Path) -> PathBuf {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let content_id = document.add_object(Stream::new(dictionary! {}, Vec::new()));

    let square_id = document.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Square",
        "Rect" => reals([100.0, 600.0, 200.0, 700.0]),
        "C" => Object::Array(vec![Object::Real(1.0), Object::Real(0.0), Object::Real(0.0)]),
        "T" => Object::string_literal("Fixture"),
    });
    let link_id = document.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "Rect" => reals([10.0, 10.0, 50.0, 20.0]),
    });

    let first = document.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "Contents" => Object::Reference(content_id),
        "Annots" => vec![Object::Reference(square_id), Object::Reference(link_id)],
    });
    let second = document.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "Contents" => Object::Reference(content_id),
    });
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(first), Object::Reference(second)],
            "Count" => 2,
            "MediaBox" => reals([0.0, 0.0, 612.0, 792.0]),
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    document.trailer.set("Root", Object::Reference(catalog_id));

    let path = dir.join("fixture.pdf");
    document.save(&path).expect("fixture should be written");
    path
}

fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout should contain valid json")
}

#[test]
fn info_reports_pages_and_import_counts() {
    let temp = TempDir::new().expect("temp dir should be created");
    let pdf = write_fixture(temp.path());

    let output = cargo_bin_cmd!("pdf-annotator").arg("info").arg(&pdf).assert().success().get_output().stdout.clone();

    let value = stdout_json(&output);
    assert_eq!(value["page_count"], 2);
    assert_eq!(value["pages"][0]["width"], 612.0);
    assert_eq!(value["pages"][0]["height"], 792.0);
    assert_eq!(value["annotation_count"], 1);
    assert_eq!(value["import"]["total_found"], 2);
    assert_eq!(value["import"]["skipped_unsupported"], 1);
}

#[test]
fn list_filters_by_page() {
    let temp = TempDir::new().expect("temp dir should be created");
    let pdf = write_fixture(temp.path());

    let output = cargo_bin_cmd!("pdf-annotator").arg("list").arg(&pdf).assert().success().get_output().stdout.clone();
    let value = stdout_json(&output);
    assert_eq!(value["version"], 1);
    let annotations = value["annotations"].as_array().expect("annotations array");
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0]["style"]["stroke_color"], "#ff0000");
    assert_eq!(annotations[0]["metadata"]["author"], "Fixture");

    let output = cargo_bin_cmd!("pdf-annotator")
        .args(["list", "--page", "2"])
        .arg(&pdf)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(stdout_json(&output)["annotations"].as_array().map(Vec::len), Some(0));
}

#[test]
fn list_rejects_out_of_range_page() {
    let temp = TempDir::new().expect("temp dir should be created");
    let pdf = write_fixture(temp.path());

    cargo_bin_cmd!("pdf-annotator")
        .args(["list", "--page", "5"])
        .arg(&pdf)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--page must be between 1 and 2"));
}

#[test]
fn export_then_apply_round_trips_annotations() {
    let temp = TempDir::new().expect("temp dir should be created");
    let pdf = write_fixture(temp.path());
    let json_path = temp.path().join("out/annotations.json");
    let applied = temp.path().join("applied.pdf");

    cargo_bin_cmd!("pdf-annotator")
        .arg("export")
        .arg(&pdf)
        .arg("--output")
        .arg(&json_path)
        .assert()
        .success();

    // Move the square to page 2 before applying
    let mut set: Value = serde_json::from_str(&std::fs::read_to_string(&json_path).expect("export written"))
        .expect("export should be json");
    set["annotations"][0]["page"] = Value::from(2);
    std::fs::write(&json_path, serde_json::to_string(&set).expect("serializes")).expect("json rewritten");

    cargo_bin_cmd!("pdf-annotator")
        .arg("apply")
        .arg(&pdf)
        .arg("--annotations")
        .arg(&json_path)
        .arg("--output")
        .arg(&applied)
        .assert()
        .success()
        .stdout(predicate::str::contains("applied.pdf"));

    let output = cargo_bin_cmd!("pdf-annotator")
        .args(["list", "--page", "2"])
        .arg(&applied)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value = stdout_json(&output);
    let annotations = value["annotations"].as_array().expect("annotations array");
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0]["id"], set["annotations"][0]["id"]);

    // The link on page 1 is preserved, the square is gone from it
    let document = Document::load(&applied).expect("applied PDF should parse");
    let first_page = *document.get_pages().get(&1).expect("page 1");
    let annots = document
        .get_dictionary(first_page)
        .and_then(|page| page.get(b"Annots"))
        .and_then(Object::as_array)
        .expect("page 1 keeps /Annots");
    assert_eq!(annots.len(), 1);
}

#[test]
fn apply_rejects_page_zero_without_panicking() {
    let temp = TempDir::new().expect("temp dir should be created");
    let pdf = write_fixture(temp.path());
    let json_path = temp.path().join("annotations.json");
    let never = temp.path().join("never.pdf");

    cargo_bin_cmd!("pdf-annotator")
        .arg("export")
        .arg(&pdf)
        .arg("--output")
        .arg(&json_path)
        .assert()
        .success();

    let mut set: Value = serde_json::from_str(&std::fs::read_to_string(&json_path).expect("export written"))
        .expect("export should be json");
    set["annotations"][0]["page"] = Value::from(0);
    std::fs::write(&json_path, serde_json::to_string(&set).expect("serializes")).expect("json rewritten");

    cargo_bin_cmd!("pdf-annotator")
        .arg("apply")
        .arg(&pdf)
        .arg("--annotations")
        .arg(&json_path)
        .arg("--output")
        .arg(&never)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("page numbers start at 1"))
        .stderr(predicate::str::contains("panicked").not());

    assert!(!never.exists());
}

#[test]
fn apply_rejects_unknown_version() {
    let temp = TempDir::new().expect("temp dir should be created");
    let pdf = write_fixture(temp.path());
    let json_path = temp.path().join("future.json");
    std::fs::write(&json_path, r#"{"version": 9, "annotations": []}"#).expect("json written");

    cargo_bin_cmd!("pdf-annotator")
        .arg("apply")
        .arg(&pdf)
        .arg("--annotations")
        .arg(&json_path)
        .arg("--output")
        .arg(temp.path().join("never.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported annotation set version 9"));
}

#[test]
fn config_file_is_validated() {
    let temp = TempDir::new().expect("temp dir should be created");
    let pdf = write_fixture(temp.path());
    let config = temp.path().join("config.json");
    std::fs::write(&config, r#"{"default_scale": 100.0}"#).expect("config written");

    cargo_bin_cmd!("pdf-annotator")
        .arg("--config")
        .arg(&config)
        .arg("info")
        .arg(&pdf)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("pdf-annotator")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn info_fails_for_missing_file() {
    let temp = TempDir::new().expect("temp dir should be created");

    cargo_bin_cmd!("pdf-annotator")
        .arg("info")
        .arg(temp.path().join("missing.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn info_fails_for_invalid_pdf() {
    let temp = TempDir::new().expect("temp dir should be created");
    let path = temp.path().join("invalid.pdf");
    std::fs::write(&path, b"not a pdf").expect("file written");

    cargo_bin_cmd!("pdf-annotator")
        .arg("info")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open PDF"));
}

#[test]
fn info_fails_for_encrypted_marker_pdf() {
    let temp = TempDir::new().expect("temp dir should be created");
    let path = temp.path().join("encrypted.pdf");
    std::fs::write(&path, b"%PDF-1.7\n1 0 obj\n<< /Encrypt 2 0 R >>\nendobj\n%%EOF\n").expect("file written");

    cargo_bin_cmd!("pdf-annotator")
        .arg("info")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("encrypted PDFs are not supported"));
}
