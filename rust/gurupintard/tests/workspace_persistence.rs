mod ipc_support;

use ipc_support::{spawn_sidecar, spawn_with_workspace};
use serde_json::json;

#[test]
fn snapshot_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (class_id, before) = {
        let mut sc = spawn_with_workspace(dir.path());
        let class_id = sc.create_class("XI Bahasa");
        sc.ok("settings.update", json!({ "kkm": 80, "teacherName": "Bu Sari" }));
        (class_id, sc.state())
    };
    assert!(dir.path().join("gurupintar.sqlite3").is_file());

    let mut sc = spawn_with_workspace(dir.path());
    assert_eq!(sc.state(), before);
    let classes = sc.ok("classes.list", json!({}));
    assert_eq!(classes["classes"][0]["id"], class_id.as_str());
    assert_eq!(classes["classes"][0]["studentCount"], 0);
}

#[test]
fn workspace_env_opens_at_startup() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let mut sc = spawn_with_workspace(dir.path());
        sc.create_class("Auto");
    }

    let exe = env!("CARGO_BIN_EXE_gurupintard");
    let mut child = std::process::Command::new(exe)
        .env("GURUPINTAR_WORKSPACE", dir.path())
        .env_remove("GEMINI_API_KEY")
        .env_remove("API_KEY")
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .spawn()
        .expect("spawn gurupintard");
    {
        use std::io::{BufRead, BufReader, Write};
        let mut stdin = child.stdin.take().expect("stdin");
        let mut reader = BufReader::new(child.stdout.take().expect("stdout"));
        writeln!(stdin, "{}", json!({ "id": "1", "method": "classes.list", "params": {} }))
            .expect("write");
        stdin.flush().expect("flush");
        let mut line = String::new();
        reader.read_line(&mut line).expect("read");
        let resp: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
        assert_eq!(resp["ok"], true);
        assert_eq!(resp["result"]["classes"][0]["name"], "Auto");
    }
    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn login_roles() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut sc = spawn_with_workspace(dir.path());
    let class_id = sc.create_class("X");
    let student_id = sc.create_student(&class_id, "5", "Kiki");

    assert_eq!(
        sc.err_code("auth.login", json!({ "identifier": "admin@sekolah.id", "password": "salah" })),
        "auth_failed"
    );

    let teacher = sc.ok(
        "auth.login",
        json!({ "identifier": "admin@sekolah.id", "password": "admin123" }),
    );
    assert_eq!(teacher["session"]["role"], "TEACHER");

    let student = sc.ok("auth.login", json!({ "identifier": student_id }));
    assert_eq!(student["session"]["role"], "STUDENT");
    assert_eq!(student["session"]["classId"], class_id.as_str());
    assert_eq!(sc.ok("auth.session", json!({}))["session"]["displayName"], "Kiki");

    sc.ok("auth.logout", json!({}));
    assert!(sc.ok("auth.session", json!({}))["session"].is_null());
}

#[test]
fn select_requires_a_usable_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, "x").expect("write");

    let mut sc = spawn_sidecar();
    assert_eq!(
        sc.err_code("workspace.select", json!({ "path": blocker.join("ws").to_string_lossy() })),
        "db_open_failed"
    );
}

#[test]
fn state_replace_rejects_incomplete_documents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut sc = spawn_with_workspace(dir.path());
    sc.create_class("Tetap Ada");
    let before = sc.state();

    assert_eq!(
        sc.err_code("state.replace", json!({ "state": {} })),
        "import_invalid_format"
    );
    assert_eq!(
        sc.err_code("state.replace", json!({ "state": { "classes": [], "settings": {} } })),
        "import_invalid_format"
    );
    assert_eq!(sc.state(), before);

    let mut edited = before.clone();
    edited["classes"][0]["name"] = json!("Sudah Diganti");
    sc.ok("state.replace", json!({ "state": edited }));
    assert_eq!(sc.state()["classes"][0]["name"], "Sudah Diganti");
}
