#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Spawns the sidecar with AI credentials stripped so narrative features
/// take their fallback path.
pub fn spawn_sidecar() -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_gurupintard");
    let mut child = Command::new(exe)
        .env_remove("GEMINI_API_KEY")
        .env_remove("API_KEY")
        .env_remove("GURUPINTAR_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gurupintard");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
        next_id: 0,
    }
}

pub fn spawn_with_workspace(workspace: &Path) -> Sidecar {
    let mut sc = spawn_sidecar();
    sc.ok(
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    sc
}

impl Sidecar {
    pub fn send_line(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");

        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        let value = self.send_line(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    /// Expects a failure and returns its error code.
    pub fn err_code(&mut self, method: &str, params: serde_json::Value) -> String {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value
            .pointer("/error/code")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string()
    }

    pub fn create_class(&mut self, name: &str) -> String {
        let res = self.ok("classes.create", json!({ "name": name }));
        res["classId"].as_str().expect("classId").to_string()
    }

    pub fn create_student(&mut self, class_id: &str, nis: &str, name: &str) -> String {
        let res = self.ok(
            "students.create",
            json!({ "classId": class_id, "nis": nis, "name": name }),
        );
        res["studentId"].as_str().expect("studentId").to_string()
    }

    pub fn create_assessment(&mut self, class_id: &str, title: &str, kind: &str, date: &str) -> String {
        let res = self.ok(
            "assessments.create",
            json!({ "classId": class_id, "title": title, "type": kind, "date": date }),
        );
        res["assessmentId"].as_str().expect("assessmentId").to_string()
    }

    pub fn state(&mut self) -> serde_json::Value {
        self.ok("state.get", json!({}))["state"].clone()
    }
}
