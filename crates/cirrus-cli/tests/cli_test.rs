//! End-to-end tests of the `cirrus` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const API_KEY: &str = "cli-weather-key";

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new(public_port: u16) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = dir.path().join("app");
        std::fs::create_dir(&app).expect("app dir");
        std::fs::write(
            app.join("Dockerfile"),
            "FROM node:20-alpine AS production\nCMD [\"node\", \"index.js\"]\n",
        )
        .expect("Dockerfile");
        let stack = format!(
            "project: weather\n\
             stack: dev\n\
             config:\n  \
               weather:appPath: \"{}\"\n  \
               weather:prefixName: demo\n  \
               weather:imageTag: v1\n  \
               weather:containerPort: 8080\n  \
               weather:publicPort: {public_port}\n  \
               weather:cpu: 1\n  \
               weather:memory: 1.5\n  \
               weather:weatherApiKey:\n    \
                 secure: {API_KEY}\n",
            app.display()
        );
        std::fs::write(dir.path().join("Cirrus.dev.yaml"), stack).expect("stack file");
        Self { dir }
    }

    fn stack_file(&self) -> PathBuf {
        self.dir.path().join("Cirrus.dev.yaml")
    }

    fn state_file(&self) -> PathBuf {
        self.dir.path().join(".cirrus").join("state.json")
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_cirrus"))
            .arg("--config")
            .arg(self.stack_file())
            .arg("--state-file")
            .arg(self.state_file())
            .args(args)
            .env_remove("RUST_LOG")
            .output()
            .expect("run cirrus")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn preview_lists_every_node_without_secrets() {
    let fixture = Fixture::new(8080);
    let output = fixture.run(&["preview"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    for name in ["demo-rg", "demo-redis", "demoACR", "demo-image", "demo-container-group"] {
        assert!(text.contains(name), "missing {name} in:\n{text}");
    }
    assert!(text.contains("[secret]"));
    assert!(!text.contains(API_KEY));
    assert!(text.contains("timeout 30m"));
}

#[test]
fn up_records_outputs_that_outputs_reads_back() {
    let fixture = Fixture::new(8080);
    let up = fixture.run(&["up"]);
    assert!(up.status.success(), "stderr: {}", stderr(&up));
    assert!(Path::new(&fixture.state_file()).exists());

    let outputs = fixture.run(&["outputs", "--json"]);
    assert!(outputs.status.success(), "stderr: {}", stderr(&outputs));
    let json: serde_json::Value = serde_json::from_slice(&outputs.stdout).expect("json");
    let hostname = json["hostname"].as_str().expect("hostname");
    assert_eq!(hostname, "demo.westus3.azurecontainer.io");
    assert_eq!(json["url"], format!("http://{hostname}:8080"));
    assert!(json["ip"].as_str().is_some_and(|ip| ip.starts_with("20.")));

    let url = fixture.run(&["outputs", "url"]);
    assert_eq!(stdout(&url).trim(), format!("http://{hostname}:8080"));

    let state = std::fs::read_to_string(fixture.state_file()).expect("state");
    assert!(!state.contains(API_KEY));
}

#[test]
fn unequal_ports_fail_before_anything_is_deployed() {
    let fixture = Fixture::new(80);
    let output = fixture.run(&["up"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("8080"), "stderr: {}", stderr(&output));
    assert!(!fixture.state_file().exists());
}

#[test]
fn outputs_without_a_deployment_fails() {
    let fixture = Fixture::new(8080);
    let output = fixture.run(&["outputs"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("cirrus up"));
}

#[test]
fn graph_prints_dot() {
    let fixture = Fixture::new(8080);
    let output = fixture.run(&["graph"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let dot = stdout(&output);
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("demo-container-group"));
}
