use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use std::process::{Command, Output};

fn run(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_catalog-export"))
        .args(args)
        .current_dir(cwd)
        .env_remove("CATALOG_DATA_DIR")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn write_catalog(dir: &Path) {
    fs::write(
        dir.join("books.json"),
        r#"[{"id":"1700000000000","title":"شازده کوچولو","author":"سنت اگزوپری","pages":96}]"#,
    )
    .unwrap();
    fs::write(
        dir.join("users.json"),
        r#"[{"id":"1","email":"admin@example.com","password":"$2a$10$abc","role":"admin"}]"#,
    )
    .unwrap();
    // posts.json is left missing on purpose
}

#[test]
fn zip_exports_all_datasets() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    write_catalog(&data);

    let out = run(
        &["zip", "-d", "data", "--verify", "--redact", "users:password"],
        dir.path(),
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let bytes = fs::read(dir.path().join("all-json-files.zip")).unwrap();
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let names: Vec<_> = zip.file_names().map(str::to_string).collect();
    assert_eq!(names, ["books.json", "posts.json", "users.json"]);

    let mut posts = String::new();
    zip.by_name("posts.json")
        .unwrap()
        .read_to_string(&mut posts)
        .unwrap();
    assert_eq!(posts, "[]");

    let mut users = String::new();
    zip.by_name("users.json")
        .unwrap()
        .read_to_string(&mut users)
        .unwrap();
    assert!(!users.contains("password"));
    assert!(users.contains("admin@example.com"));

    let mut books = String::new();
    zip.by_name("books.json")
        .unwrap()
        .read_to_string(&mut books)
        .unwrap();
    assert!(books.starts_with("[\n  {\n    \"id\": \"1700000000000\""));
    assert!(books.contains("شازده کوچولو"));
}

#[test]
fn json_writes_single_dataset() {
    let dir = tempfile::tempdir().unwrap();
    write_catalog(dir.path());

    let out = run(&["json", "books", "-d", ".", "-o", "export/books.json", "-q"], dir.path());
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.is_empty());

    let text = fs::read_to_string(dir.path().join("export/books.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value[0]["pages"], 96);
}

#[test]
fn list_and_verify_exported_archive() {
    let dir = tempfile::tempdir().unwrap();
    write_catalog(dir.path());
    assert!(run(&["zip", "-d", ".", "-o", "out.zip"], dir.path()).status.success());

    let listed = run(&["list", "out.zip"], dir.path());
    assert!(listed.status.success());
    assert_eq!(
        String::from_utf8_lossy(&listed.stdout),
        "books.json\nposts.json\nusers.json\n"
    );

    let verified = run(&["verify", "out.zip"], dir.path());
    assert!(verified.status.success());
    assert!(String::from_utf8_lossy(&verified.stdout).contains("3 entries OK"));
}

#[test]
fn verify_rejects_corrupted_archive() {
    let dir = tempfile::tempdir().unwrap();
    write_catalog(dir.path());
    assert!(run(&["zip", "-d", ".", "-o", "out.zip"], dir.path()).status.success());

    let path = dir.path().join("out.zip");
    let mut bytes = fs::read(&path).unwrap();
    // First byte of books.json content: 30-byte header plus the name
    bytes[30 + "books.json".len()] ^= 0x20;
    fs::write(&path, bytes).unwrap();

    let verified = run(&["verify", "out.zip"], dir.path());
    assert!(!verified.status.success());
    assert!(String::from_utf8_lossy(&verified.stderr).contains("CRC-32 mismatch"));
}
