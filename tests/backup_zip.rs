#[path = "../src/backup.rs"]
mod backup;

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

#[test]
fn zip_export_and_import_roundtrip() {
    let workspace = temp_dir("screener-backup-src");
    let workspace2 = temp_dir("screener-backup-dst");
    let out_dir = temp_dir("screener-backup-out");

    let db_src = workspace.join("screener.sqlite3");
    let bytes = b"sqlite-test-payload";
    std::fs::write(&db_src, bytes).expect("write source db");

    let bundle_path = out_dir.join("workspace.scrbackup.zip");
    let export = backup::export_workspace_bundle(&workspace, &bundle_path).expect("export bundle");
    assert_eq!(export.bundle_format, backup::BUNDLE_FORMAT_V1);
    assert_eq!(export.db_sha256.len(), 64, "hex-encoded sha-256");

    let f = File::open(&bundle_path).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut manifest_text = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest_text)
        .expect("read manifest");
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).expect("parse manifest");
    assert_eq!(
        manifest.get("format").and_then(|v| v.as_str()),
        Some(backup::BUNDLE_FORMAT_V1)
    );
    assert_eq!(
        manifest.get("dbSha256").and_then(|v| v.as_str()),
        Some(export.db_sha256.as_str())
    );
    archive
        .by_name("db/screener.sqlite3")
        .expect("database entry in bundle");

    let import = backup::import_workspace_bundle(&bundle_path, &workspace2).expect("import bundle");
    assert_eq!(import.bundle_format_detected, backup::BUNDLE_FORMAT_V1);

    let db_dst = workspace2.join("screener.sqlite3");
    let restored = std::fs::read(&db_dst).expect("read restored db");
    assert_eq!(restored, bytes);

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(workspace2);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn tampered_bundle_fails_checksum_verification() {
    let workspace = temp_dir("screener-backup-tamper-src");
    let workspace2 = temp_dir("screener-backup-tamper-dst");
    let out_dir = temp_dir("screener-backup-tamper-out");

    std::fs::write(workspace.join("screener.sqlite3"), b"original-payload")
        .expect("write source db");
    let bundle_path = out_dir.join("workspace.scrbackup.zip");
    let export = backup::export_workspace_bundle(&workspace, &bundle_path).expect("export bundle");

    // Rebuild the bundle with the same manifest but a different database body.
    use std::io::Write;
    let tampered_path = out_dir.join("tampered.scrbackup.zip");
    let f = File::create(&tampered_path).expect("create tampered bundle");
    let mut zip = zip::ZipWriter::new(f);
    let opts = zip::write::FileOptions::default();
    zip.start_file("manifest.json", opts).expect("manifest");
    zip.write_all(
        serde_json::json!({
            "format": backup::BUNDLE_FORMAT_V1,
            "version": 1,
            "dbSha256": export.db_sha256,
        })
        .to_string()
        .as_bytes(),
    )
    .expect("write manifest");
    zip.start_file("db/screener.sqlite3", opts).expect("db entry");
    zip.write_all(b"not-the-original-payload").expect("write db");
    zip.finish().expect("finish zip");

    let err = backup::import_workspace_bundle(&tampered_path, &workspace2)
        .expect_err("tampered bundle must be rejected");
    assert!(err.to_string().contains("checksum mismatch"), "{}", err);

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(workspace2);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn bare_sqlite_import_is_supported() {
    let out_dir = temp_dir("screener-backup-bare");
    let workspace = temp_dir("screener-backup-bare-dst");

    let bare_file = out_dir.join("copy.sqlite3");
    let bytes = b"bare-sqlite-copy";
    std::fs::write(&bare_file, bytes).expect("write bare sqlite file");

    let import =
        backup::import_workspace_bundle(&bare_file, &workspace).expect("import bare sqlite");
    assert_eq!(import.bundle_format_detected, "bare-sqlite3");

    let restored = std::fs::read(workspace.join("screener.sqlite3")).expect("read restored sqlite");
    assert_eq!(restored, bytes);

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}
