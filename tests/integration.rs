//! End-to-end tests of the `plu` binary.
//!
//! Embeddings come from the offline hashing provider. Generation goes to a
//! fake Ollama server on a local port that answers with the last number in
//! the prompt's context, which is what a well-behaved model does with the
//! extraction template.

use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

const PLU_TEXT: &str = "Article U1-10 : Hauteur des constructions.\n\n\
Dans la zone U1, la hauteur maximum des constructions est de 9 mètres.\n\n\
Article U1-9 : Emprise au sol.\n\n\
Dans la zone U1, l'emprise au sol maximale des constructions est de 60 %.";

fn plu_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("plu");
    path
}

/// Last run of ASCII digits between `Context:` and `Answer:`.
fn answer_from_prompt(prompt: &str) -> String {
    let context = prompt
        .split("Context:")
        .nth(1)
        .and_then(|s| s.split("Answer:").next())
        .unwrap_or("");
    context
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .last()
        .unwrap_or("")
        .to_string()
}

/// Serve `/api/generate` on an ephemeral port; returns the base URL.
fn spawn_fake_ollama() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                    break;
                }
                let lower = line.to_ascii_lowercase();
                if let Some(value) = lower.strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();

            let request: serde_json::Value = serde_json::from_slice(&body).unwrap();
            let prompt = request["prompt"].as_str().unwrap_or("");
            let reply = serde_json::json!({
                "model": request["model"],
                "response": answer_from_prompt(prompt),
                "done": true,
            })
            .to_string();

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                reply.len(),
                reply
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    url
}

struct TestEnv {
    tmp: TempDir,
    config_path: PathBuf,
}

impl TestEnv {
    fn new(generation_url: &str, extra: &str) -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();
        fs::write(root.join("plu_0.txt"), PLU_TEXT).unwrap();

        let config_content = format!(
            r#"[db]
path = "{}/data/plu.sqlite"

[chunking]
chunk_size = 120

[embedding]
provider = "hashing"
dims = 1024

[generation]
provider = "ollama"
model = "fake"
url = "{}"
timeout_secs = 10
{}"#,
            root.display(),
            generation_url,
            extra
        );
        let config_path = root.join("plu.toml");
        fs::write(&config_path, config_content).unwrap();

        Self { tmp, config_path }
    }

    fn document(&self) -> String {
        self.tmp.path().join("plu_0.txt").display().to_string()
    }

    fn run(&self, args: &[&str]) -> (String, String, bool) {
        run_plu(&self.config_path, args, None)
    }
}

fn run_plu(config_path: &Path, args: &[&str], stdin: Option<&str>) -> (String, String, bool) {
    let binary = plu_binary();
    let mut child = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|e| panic!("Failed to run plu binary at {:?}: {}", binary, e));

    {
        let mut child_stdin = child.stdin.take().unwrap();
        if let Some(input) = stdin {
            child_stdin.write_all(input.as_bytes()).unwrap();
        }
    }

    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn extract_args(document: &str) -> Vec<&str> {
    vec![
        "extract",
        document,
        "--territoire",
        "T01",
        "--codcom",
        "33063",
        "--annee",
        "2024",
        "--section",
        "UA",
        "--zone",
        "U1",
    ]
}

#[test]
fn test_init_creates_database() {
    let env = TestEnv::new("http://127.0.0.1:9", "");
    let (stdout, stderr, success) = env.run(&["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(env.tmp.path().join("data/plu.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let env = TestEnv::new("http://127.0.0.1:9", "");
    let (_, _, success1) = env.run(&["init"]);
    assert!(success1, "First init failed");
    let (_, _, success2) = env.run(&["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_invalid_config_is_rejected() {
    let env = TestEnv::new("http://127.0.0.1:9", "\n[retrieval]\nscore_threshold = 2.0\n");
    let (_, stderr, success) = env.run(&["init"]);
    assert!(!success);
    assert!(stderr.contains("score_threshold"), "stderr={}", stderr);
}

#[test]
fn test_missing_config_file() {
    let (_, stderr, success) = run_plu(Path::new("/nonexistent/plu.toml"), &["init"], None);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_ask_missing_document() {
    let env = TestEnv::new("http://127.0.0.1:9", "");
    let missing = env.tmp.path().join("absent.pdf").display().to_string();
    let (_, stderr, success) = env.run(&["ask", &missing, "--query", "Hauteur ?"]);
    assert!(!success);
    assert!(stderr.contains("document unreadable"), "stderr={}", stderr);
}

#[test]
fn test_ask_single_query() {
    let url = spawn_fake_ollama();
    let env = TestEnv::new(&url, "");
    let (stdout, stderr, success) = env.run(&[
        "ask",
        &env.document(),
        "--query",
        "Quelle est la hauteur maximum des constructions dans la zone U1 ?",
    ]);
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Réponse : 9"), "stdout={}", stdout);
    assert!(stdout.contains("Mémoire nettoyée."));
}

#[test]
fn test_ask_repl_until_exit() {
    let url = spawn_fake_ollama();
    let env = TestEnv::new(&url, "");
    let (stdout, stderr, success) = run_plu(
        &env.config_path,
        &["ask", &env.document()],
        Some(
            "Quelle est l'emprise au sol maximale des constructions dans la zone U1 ?\n\
             exit\n\
             Quelle est la hauteur maximum des constructions dans la zone U1 ?\n",
        ),
    );
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Réponse : 60"), "stdout={}", stdout);
    assert!(!stdout.contains("Réponse : 9"), "asked after exit: {}", stdout);
    assert!(stdout.contains("Fin de l'interaction."));
}

#[test]
fn test_ask_unreachable_generator_reports_error() {
    let env = TestEnv::new("http://127.0.0.1:9", "");
    let (_, stderr, success) = env.run(&[
        "ask",
        &env.document(),
        "--query",
        "Quelle est la hauteur maximum des constructions dans la zone U1 ?",
    ]);
    assert!(!success);
    assert!(stderr.contains("generation"), "stderr={}", stderr);
}

#[test]
fn test_extract_dry_run_writes_nothing() {
    let url = spawn_fake_ollama();
    let env = TestEnv::new(&url, "");
    let document = env.document();
    let mut args = extract_args(&document);
    args.push("--dry-run");

    let (stdout, stderr, success) = env.run(&args);
    assert!(success, "extract failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("hauteur=9.00 emprise=60.00"), "stdout={}", stdout);
    assert!(stdout.contains("dry run"));

    let (stdout, _, success) = env.run(&["facts"]);
    assert!(success);
    assert!(stdout.contains("No facts stored."));
}

#[test]
fn test_extract_commits_and_lists_facts() {
    let url = spawn_fake_ollama();
    let env = TestEnv::new(&url, "");
    env.run(&["init"]);
    let document = env.document();

    let (stdout, stderr, success) = env.run(&extract_args(&document));
    assert!(success, "extract failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("committed 1 records"));

    let (stdout, _, success) = env.run(&["facts", "--codcom", "33063"]);
    assert!(success);
    assert!(stdout.contains("9.00"), "stdout={}", stdout);
    assert!(stdout.contains("60.00"));
    assert!(stdout.contains("1 facts"));

    // Same key again with plain inserts: the batch fails and nothing changes.
    let (_, stderr, success) = env.run(&extract_args(&document));
    assert!(!success);
    assert!(stderr.contains("rolled back"), "stderr={}", stderr);
    let (stdout, _, _) = env.run(&["facts"]);
    assert!(stdout.contains("1 facts"));
}

#[test]
fn test_extract_upsert_mode() {
    let url = spawn_fake_ollama();
    let env = TestEnv::new(&url, "\n[facts]\ninsert_mode = \"upsert\"\n");
    let document = env.document();

    let (_, stderr, success) = env.run(&extract_args(&document));
    assert!(success, "stderr={}", stderr);
    let (_, stderr, success) = env.run(&extract_args(&document));
    assert!(success, "upsert failed: {}", stderr);

    let (stdout, _, _) = env.run(&["facts"]);
    assert!(stdout.contains("1 facts"));
}

#[test]
fn test_extract_rejects_bad_zone_before_ingest() {
    let env = TestEnv::new("http://127.0.0.1:9", "");
    let missing = env.tmp.path().join("absent.pdf").display().to_string();
    let mut args = extract_args(&missing);
    args.pop();
    args.push("U1a");
    let (_, stderr, success) = env.run(&args);
    assert!(!success);
    assert!(stderr.contains("zone"), "stderr={}", stderr);
    assert!(!stderr.contains("document unreadable"));
}
