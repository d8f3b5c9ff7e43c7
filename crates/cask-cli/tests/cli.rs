mod common;

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use common::{app_zip, manifest, sha256_hex};
use tempfile::TempDir;

struct TestContext {
    _root: TempDir,
    home: PathBuf,
    apps: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let home = root.path().join("cask-home");
        let apps = root.path().join("Applications");
        std::fs::create_dir_all(&home).unwrap();
        Self {
            _root: root,
            home,
            apps,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_cask"));
        cmd.env("CASK_HOME", &self.home)
            .env("CASK_APPDIR", &self.apps)
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.cmd().args(args).output().expect("failed to run cask")
    }

    fn write_manifest(&self, file: &str, body: &str) -> PathBuf {
        let path = self.home.join(file);
        std::fs::write(&path, body).unwrap();
        path
    }
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn help_prints_usage() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--help"]);
    assert!(output.status.success());
    assert!(text(&output.stdout).contains("Usage:"));
}

#[test]
fn list_is_empty_on_fresh_home() {
    let ctx = TestContext::new();
    let output = ctx.run(&["list"]);
    assert!(output.status.success());
    assert!(text(&output.stdout).contains("No packages installed."));
}

#[test]
fn force_unchecked_is_refused_as_usage_error() {
    let ctx = TestContext::new();
    let path = ctx.write_manifest(
        "example.toml",
        &manifest(
            "Example",
            "1.2.0",
            "https://example.test/a.zip",
            &"a".repeat(64),
            "Example.app",
        ),
    );

    let output = ctx.run(&["install", "--force-unchecked", arg(&path)]);
    assert_eq!(output.status.code(), Some(2));
    assert!(text(&output.stderr).contains("--force-unchecked"));
    assert!(!ctx.apps.exists());
}

#[test]
fn malformed_manifest_exits_one() {
    let ctx = TestContext::new();
    let path = ctx.write_manifest("broken.toml", "name = \"Example\"\n");

    let output = ctx.run(&["install", arg(&path)]);
    assert_eq!(output.status.code(), Some(1));
    assert!(text(&output.stderr).contains("parsing failed"));
}

#[test]
fn remove_unknown_package_exits_one() {
    let ctx = TestContext::new();
    let output = ctx.run(&["remove", "Nothing"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(text(&output.stderr).contains("Nothing"));
}

#[test]
fn not_found_exits_one_and_names_stage() {
    let ctx = TestContext::new();
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/Example.zip")
        .with_status(404)
        .create();

    let path = ctx.write_manifest(
        "example.toml",
        &manifest(
            "Example",
            "1.2.0",
            &format!("{}/Example.zip", server.url()),
            &"a".repeat(64),
            "Example.app",
        ),
    );

    let output = ctx.run(&["install", arg(&path)]);
    assert_eq!(output.status.code(), Some(1));
    assert!(
        text(&output.stderr).contains("fetching failed for Example"),
        "{}",
        text(&output.stderr)
    );

    let list = ctx.run(&["list"]);
    assert!(text(&list.stdout).contains("No packages installed."));
}

#[test]
fn install_list_info_remove() {
    let ctx = TestContext::new();
    let body = app_zip("Example.app", "v1.2.0");
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/Example.zip")
        .with_status(200)
        .with_body(&body)
        .create();

    let path = ctx.write_manifest(
        "example.toml",
        &manifest(
            "Example",
            "1.2.0",
            &format!("{}/Example.zip", server.url()),
            &sha256_hex(&body),
            "Example.app",
        ),
    );

    let output = ctx.run(&["install", arg(&path)]);
    assert!(output.status.success(), "{}", text(&output.stderr));
    assert!(ctx.apps.join("Example.app/Contents/Info.plist").exists());

    let list = text(&ctx.run(&["list"]).stdout);
    assert!(list.contains("Example"));
    assert!(list.contains("1.2.0"));

    let info = ctx.run(&["info", "Example", "--json"]);
    assert!(info.status.success());
    let json: serde_json::Value = serde_json::from_slice(&info.stdout).unwrap();
    assert_eq!(json["package_name"], "Example");
    assert_eq!(json["installed_version"], "1.2.0");
    assert_eq!(json["source_checksum"], sha256_hex(&body));

    let history = text(&ctx.run(&["history", "Example"]).stdout);
    assert!(history.contains("Installed"));

    let remove = ctx.run(&["remove", "Example"]);
    assert!(remove.status.success(), "{}", text(&remove.stderr));
    assert!(!ctx.apps.join("Example.app").exists());
    assert!(text(&ctx.run(&["list"]).stdout).contains("No packages installed."));
}
