use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_snipvault"))
}

/// Isolated XDG config and data homes for one test.
struct Sandbox {
    root: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir_all(root.path().join("c")).expect("create config dir");
        std::fs::create_dir_all(root.path().join("d")).expect("create data dir");
        Self { root }
    }

    /// A sandbox with an initialized store using the file vault.
    fn initialized() -> Self {
        let sandbox = Self::new();
        let output = sandbox.run(&["init", "--vault", "file"], &[]);
        assert_success(&output, "init");
        sandbox
    }

    fn path(&self) -> &Path {
        self.root.path()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(bin());
        cmd.env("XDG_CONFIG_HOME", self.path().join("c"))
            .env("XDG_DATA_HOME", self.path().join("d"))
            .env("HOME", self.path())
            .env_remove("SNIPVAULT_STORE")
            .env_remove("SNIPVAULT_CONFIG")
            .env_remove("SNIPVAULT_PIN")
            .env_remove("SNIPVAULT_NEW_PIN")
            .env_remove("SNIPVAULT_EMERGENCY_CODE")
            .env_remove("SNIPVAULT_LOG")
            .env_remove("EDITOR");
        cmd
    }

    fn run(&self, args: &[&str], envs: &[(&str, &str)]) -> Output {
        let mut cmd = self.command();
        cmd.args(args);
        for (key, value) in envs {
            cmd.env(key, value);
        }
        cmd.output().expect("run snipvault")
    }

    fn json(&self, args: &[&str], envs: &[(&str, &str)]) -> Value {
        let output = self.run(args, envs);
        assert_success(&output, &args.join(" "));
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
    }

    fn add(&self, name: &str, prefix: &str, body: &str, extra: &[&str]) -> String {
        let mut args = vec![
            "add", "--name", name, "--prefix", prefix, "--body", body, "--json",
        ];
        args.extend_from_slice(extra);
        let created = self.json(&args, &[]);
        created["id"].as_str().expect("id").to_string()
    }
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{} failed: stdout={} stderr={}",
        what,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn assert_exit(output: &Output, code: i32, what: &str) {
    assert_eq!(
        output.status.code(),
        Some(code),
        "{}: stdout={} stderr={}",
        what,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn emergency_code(output: &Output) -> String {
    stderr(output)
        .lines()
        .find_map(|line| line.strip_prefix("Emergency code: "))
        .map(|code| code.trim().to_string())
        .expect("emergency code should be printed")
}

#[test]
fn test_init_add_list_show_use() {
    let sandbox = Sandbox::initialized();
    let id = sandbox.add("Console log", "clog", "console.log(x);", &["--tag", "js"]);

    let listed = sandbox.json(&["list", "--json"], &[]);
    assert_eq!(listed.as_array().expect("array").len(), 1);

    let shown = sandbox.json(&["show", &id, "--json"], &[]);
    assert_eq!(shown["name"], "Console log");
    assert_eq!(shown["tags"][0], "js");

    let used = sandbox.run(&["use", &id], &[]);
    assert_success(&used, "use");
    assert_eq!(String::from_utf8_lossy(&used.stdout).trim_end(), "console.log(x);");

    let stats = sandbox.json(&["stats", "--json"], &[]);
    assert_eq!(stats["totalSnippets"], 1);
    assert_eq!(stats["totalUsage"], 1);

    let store = sandbox.path().join("d").join("snipvault").join("store");
    assert!(store.join("snippets.json").exists());
}

#[test]
fn test_commands_require_init() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["list"], &[]);
    assert_exit(&output, 3, "list before init");
    assert!(stderr(&output).contains("snipvault init"));
}

#[test]
fn test_init_refuses_to_overwrite_config() {
    let sandbox = Sandbox::initialized();
    let output = sandbox.run(&["init", "--vault", "file"], &[]);
    assert_exit(&output, 4, "second init");
    let forced = sandbox.run(&["init", "--vault", "file", "--force"], &[]);
    assert_success(&forced, "forced init");
}

#[test]
fn test_script_body_rejected() {
    let sandbox = Sandbox::initialized();
    let output = sandbox.run(
        &[
            "add",
            "--name",
            "Evil",
            "--prefix",
            "evil",
            "--body",
            "javascript:alert(document.cookie)",
        ],
        &[],
    );
    assert_exit(&output, 4, "script body");
    assert!(stderr(&output).contains("javascript:"));

    let listed = sandbox.json(&["list", "--json"], &[]);
    assert!(listed.as_array().expect("array").is_empty());
}

#[test]
fn test_missing_snippet_is_not_found() {
    let sandbox = Sandbox::initialized();
    assert_exit(&sandbox.run(&["show", "nope"], &[]), 3, "show");
    assert_exit(&sandbox.run(&["use", "nope"], &[]), 3, "use");
    assert_exit(&sandbox.run(&["rm", "nope"], &[]), 3, "rm");
}

#[test]
fn test_edit_updates_fields() {
    let sandbox = Sandbox::initialized();
    let id = sandbox.add("Old", "old", "body", &["--tag", "a,b"]);

    let updated = sandbox.json(
        &["edit", &id, "--name", "New", "--favorite", "true", "--tag", "", "--json"],
        &[],
    );
    assert_eq!(updated["name"], "New");
    assert_eq!(updated["isFavorite"], true);
    assert!(updated["tags"].as_array().expect("tags").is_empty());

    let nothing = sandbox.run(&["edit", &id], &[]);
    assert_exit(&nothing, 4, "empty edit");
}

#[test]
fn test_search_favorites_tagged_react() {
    let sandbox = Sandbox::initialized();
    let favorite = sandbox.add(
        "useEffect cleanup",
        "uec",
        "useEffect(() => () => {}, []);",
        &["--tag", "react", "--favorite"],
    );
    sandbox.add("useState", "ust", "const [v, setV] = useState();", &["--tag", "react"]);
    sandbox.add("Vue ref", "vref", "const v = ref(0);", &["--tag", "vue", "--favorite"]);

    let results = sandbox.json(&["search", "react", "--favorites", "--json"], &[]);
    let results = results.as_array().expect("array");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"], favorite.as_str());

    let favorites = sandbox.json(&["list", "--favorites", "--json"], &[]);
    assert_eq!(favorites.as_array().expect("array").len(), 2);
}

#[test]
fn test_export_then_import() {
    let sandbox = Sandbox::initialized();
    sandbox.add("A", "a", "alpha", &[]);
    sandbox.add("B", "b", "beta", &[]);

    let export = sandbox.path().join("export.json");
    let export_arg = export.to_string_lossy().to_string();
    assert_success(&sandbox.run(&["export", &export_arg], &[]), "export");

    let report = sandbox.json(&["import", &export_arg, "--json"], &[]);
    assert_eq!(report["imported"], 2);
    assert_eq!(report["cleared"], 0);

    let listed = sandbox.json(&["list", "--json"], &[]);
    assert_eq!(listed.as_array().expect("array").len(), 4);

    let replaced = sandbox.json(&["import", &export_arg, "--replace", "--json"], &[]);
    assert_eq!(replaced["cleared"], 4);
    let listed = sandbox.json(&["list", "--json"], &[]);
    assert_eq!(listed.as_array().expect("array").len(), 2);
}

#[test]
fn test_import_rejects_pollution_marker() {
    let sandbox = Sandbox::initialized();
    sandbox.add("A", "a", "alpha", &[]);

    let source = sandbox.path().join("evil.json");
    std::fs::write(&source, r#"[{"__proto__":{"polluted":true}}]"#).expect("write source");
    let output = sandbox.run(
        &["import", &source.to_string_lossy(), "--replace"],
        &[],
    );
    assert_exit(&output, 7, "polluted import");

    let listed = sandbox.json(&["list", "--json"], &[]);
    assert_eq!(listed.as_array().expect("array").len(), 1);
}

#[test]
fn test_import_rejects_oversized_and_non_utf8_sources() {
    let sandbox = Sandbox::initialized();
    sandbox.add("A", "a", "alpha", &[]);

    let big = sandbox.path().join("big.json");
    let file = std::fs::File::create(&big).expect("create big source");
    file.set_len(10 * 1024 * 1024 + 1).expect("size big source");
    let output = sandbox.run(&["import", &big.to_string_lossy(), "--replace"], &[]);
    assert_exit(&output, 7, "oversized import");
    assert!(stderr(&output).contains("bytes"));

    let binary = sandbox.path().join("binary.json");
    std::fs::write(&binary, [b'[', 0xff, 0xfe, b']']).expect("write binary source");
    let output = sandbox.run(&["import", &binary.to_string_lossy(), "--replace"], &[]);
    assert_exit(&output, 7, "non-UTF-8 import");
    assert!(stderr(&output).contains("UTF-8"));

    let listed = sandbox.json(&["list", "--json"], &[]);
    assert_eq!(listed.as_array().expect("array").len(), 1);
}

#[test]
fn test_pin_session_persists_across_runs() {
    let sandbox = Sandbox::initialized();
    sandbox.add("A", "a", "alpha", &[]);

    let set = sandbox.run(&["pin", "set"], &[("SNIPVAULT_NEW_PIN", "2468")]);
    assert_success(&set, "pin set");
    emergency_code(&set);

    let status = sandbox.json(&["pin", "status", "--json"], &[]);
    assert_eq!(status["state"], "unlocked");

    // Still inside the session: no PIN needed.
    let listed = sandbox.json(&["list", "--json"], &[]);
    assert_eq!(listed.as_array().expect("array").len(), 1);

    assert_success(&sandbox.run(&["pin", "lock"], &[]), "pin lock");
    let denied = sandbox.run(&["list"], &[]);
    assert_exit(&denied, 5, "list while locked");

    let wrong = sandbox.run(&["list"], &[("SNIPVAULT_PIN", "1111")]);
    assert_exit(&wrong, 5, "list with wrong PIN");

    let allowed = sandbox.json(&["list", "--json"], &[("SNIPVAULT_PIN", "2468")]);
    assert_eq!(allowed.as_array().expect("array").len(), 1);

    let vault = std::fs::read_to_string(sandbox.path().join("c").join("snipvault").join("vault.json"))
        .expect("vault file");
    assert!(vault.contains("$argon2id$"));
}

#[test]
fn test_lockout_and_emergency_recovery() {
    let sandbox = Sandbox::initialized();
    let set = sandbox.run(&["pin", "set"], &[("SNIPVAULT_NEW_PIN", "2468")]);
    assert_success(&set, "pin set");
    let code = emergency_code(&set);
    assert_success(&sandbox.run(&["pin", "lock"], &[]), "pin lock");

    for attempt in 0..5 {
        let output = sandbox.run(&["list"], &[("SNIPVAULT_PIN", "1111")]);
        assert_exit(&output, 5, &format!("wrong PIN attempt {}", attempt));
    }

    let locked = sandbox.run(&["list"], &[("SNIPVAULT_PIN", "2468")]);
    assert_exit(&locked, 5, "correct PIN during lockout");
    assert!(stderr(&locked).contains("Locked out"));

    let status = sandbox.json(&["pin", "status", "--json"], &[]);
    assert_eq!(status["state"], "locked-out");

    let recovered = sandbox.run(
        &["pin", "recover"],
        &[
            ("SNIPVAULT_EMERGENCY_CODE", code.as_str()),
            ("SNIPVAULT_NEW_PIN", "1357"),
        ],
    );
    assert_success(&recovered, "pin recover");
    assert_ne!(emergency_code(&recovered), code);

    assert_success(&sandbox.run(&["list"], &[]), "list after recovery");
    assert_success(&sandbox.run(&["pin", "lock"], &[]), "pin lock");
    let with_new_pin = sandbox.run(&["list"], &[("SNIPVAULT_PIN", "1357")]);
    assert_success(&with_new_pin, "list with new PIN");
}

#[test]
fn test_pin_change_and_disable() {
    let sandbox = Sandbox::initialized();
    assert_success(
        &sandbox.run(&["pin", "set"], &[("SNIPVAULT_NEW_PIN", "2468")]),
        "pin set",
    );

    let wrong = sandbox.run(
        &["pin", "change"],
        &[("SNIPVAULT_PIN", "9999"), ("SNIPVAULT_NEW_PIN", "1357")],
    );
    assert_exit(&wrong, 5, "change with wrong PIN");

    assert_success(
        &sandbox.run(
            &["pin", "change"],
            &[("SNIPVAULT_PIN", "2468"), ("SNIPVAULT_NEW_PIN", "1357")],
        ),
        "pin change",
    );
    assert_success(
        &sandbox.run(&["pin", "disable"], &[("SNIPVAULT_PIN", "1357")]),
        "pin disable",
    );

    let status = sandbox.json(&["pin", "status", "--json"], &[]);
    assert_eq!(status["state"], "disabled");
    assert_exit(&sandbox.run(&["pin", "lock"], &[]), 4, "lock without PIN");
}

#[test]
fn test_completions_generate() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["completions", "bash"], &[]);
    assert_success(&output, "completions");
    assert!(String::from_utf8_lossy(&output.stdout).contains("snipvault"));
}
