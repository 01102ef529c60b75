//! Integration tests for Shelf

mod support {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use std::collections::HashMap;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::path::{Path, PathBuf};
    use std::thread;
    use tempfile::TempDir;

    /// Throwaway HTTP/1.1 server answering canned routes; unknown paths 404
    pub fn serve(routes: &[(&str, u16, &str)]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: HashMap<String, (u16, String)> = routes
            .iter()
            .map(|(path, status, body)| (path.to_string(), (*status, body.to_string())))
            .collect();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let Ok(clone) = stream.try_clone() else { continue };
                let mut reader = BufReader::new(clone);

                let mut request_line = String::new();
                if reader.read_line(&mut request_line).is_err() {
                    continue;
                }
                loop {
                    let mut line = String::new();
                    match reader.read_line(&mut line) {
                        Ok(0) | Err(_) => break,
                        Ok(_) if line == "\r\n" => break,
                        Ok(_) => {}
                    }
                }

                let path = request_line.split_whitespace().nth(1).unwrap_or("/");
                let (status, body) = routes
                    .get(path)
                    .cloned()
                    .unwrap_or((404, "not found".to_string()));
                let reason = if status == 200 { "OK" } else { "Not Found" };
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        format!("http://{}", addr)
    }

    /// Isolated config, partition store and record store
    pub struct Sandbox {
        pub dir: TempDir,
    }

    impl Sandbox {
        pub fn new(origin: &str, version: &str) -> Self {
            let sandbox = Self {
                dir: TempDir::new().unwrap(),
            };
            sandbox.write_config(origin, version);
            sandbox
        }

        pub fn config_path(&self) -> PathBuf {
            self.dir.path().join("config.toml")
        }

        fn path_str(path: &Path) -> String {
            path.display().to_string().replace('\\', "/")
        }

        pub fn write_config(&self, origin: &str, version: &str) {
            let config = format!(
                r#"
[cache]
version = "{version}"
global_resources = []
precache = ["index.html", "manifest.json"]

[[cache.apps]]
name = "User-Manager"

[network]
origin = "{origin}"
timeout_secs = 5

[store]
root = "{root}"
records = "{records}"
"#,
                root = Self::path_str(&self.dir.path().join("partitions")),
                records = Self::path_str(&self.dir.path().join("records")),
            );
            std::fs::write(self.config_path(), config).unwrap();
        }

        pub fn shelf(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("shelf");
            cmd.env("SHELF_CONFIG", self.config_path()).env("CI", "1");
            cmd
        }
    }

    pub fn user_manager_routes() -> Vec<(&'static str, u16, &'static str)> {
        vec![
            ("/User-Manager/", 200, "<html>root</html>"),
            ("/User-Manager/index.html", 200, "<html>user manager</html>"),
            ("/User-Manager/manifest.json", 200, r#"{"short_name": "User-Manager"}"#),
        ]
    }
}

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn shelf() -> Command {
        cargo_bin_cmd!("shelf")
    }

    #[test]
    fn help_displays() {
        shelf()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("shared offline cache"));
    }

    #[test]
    fn version_displays() {
        shelf()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("shelf"));
    }

    #[test]
    fn config_path_honors_flag() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");
        shelf()
            .args(["--config", path.to_str().unwrap(), "config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_init_then_show() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        shelf()
            .env("CI", "1")
            .args(["--config", path.to_str().unwrap(), "config", "init"])
            .assert()
            .success();
        assert!(path.exists());

        shelf()
            .args(["--config", path.to_str().unwrap(), "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("scheme = \"versioned\""));
    }

    #[test]
    fn invalid_config_is_reported() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[network]\ntimeout_secs = 0\n").unwrap();

        shelf()
            .args(["--config", path.to_str().unwrap(), "status"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }
}

mod lifecycle_tests {
    use super::support::{serve, user_manager_routes, Sandbox};
    use predicates::prelude::*;

    #[test]
    fn install_activate_then_serve_from_cache() {
        let origin = serve(&user_manager_routes());
        let sandbox = Sandbox::new(&origin, "v2");

        sandbox
            .shelf()
            .arg("install")
            .assert()
            .success()
            .stdout(predicate::str::contains("User-Manager-cache-v2"));

        sandbox.shelf().arg("activate").assert().success();

        sandbox
            .shelf()
            .args(["fetch", "/User-Manager/index.html"])
            .assert()
            .success()
            .stdout("<html>user manager</html>")
            .stderr(predicate::str::contains("served from cache"));

        sandbox
            .shelf()
            .args(["status", "--format", "plain"])
            .assert()
            .success()
            .stdout("activated\n");
    }

    #[test]
    fn fetch_before_activation_passes_through() {
        let origin = serve(&user_manager_routes());
        let sandbox = Sandbox::new(&origin, "v2");

        sandbox
            .shelf()
            .args(["fetch", "/User-Manager/index.html"])
            .assert()
            .success()
            .stdout("<html>user manager</html>")
            .stderr(predicate::str::contains("passed through"));
    }

    #[test]
    fn miss_is_cached_for_the_next_request() {
        let mut routes = user_manager_routes();
        routes.push(("/User-Manager/app.js", 200, "console.log(1)"));
        let origin = serve(&routes);
        let sandbox = Sandbox::new(&origin, "v2");
        sandbox.shelf().arg("update").assert().success();

        sandbox
            .shelf()
            .args(["fetch", "/User-Manager/app.js"])
            .assert()
            .success()
            .stderr(predicate::str::contains("served from network (cached)"));

        sandbox
            .shelf()
            .args(["fetch", "/User-Manager/app.js"])
            .assert()
            .success()
            .stdout("console.log(1)")
            .stderr(predicate::str::contains("served from cache"));
    }

    #[test]
    fn failed_install_commits_nothing() {
        let origin = serve(&[("/User-Manager/", 200, "root"), ("/User-Manager/index.html", 200, "x")]);
        let sandbox = Sandbox::new(&origin, "v2");

        sandbox
            .shelf()
            .arg("install")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Preload of partition User-Manager-cache-v2"));

        sandbox
            .shelf()
            .args(["partitions", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout("");

        sandbox
            .shelf()
            .arg("activate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("expected installed"));
    }

    #[test]
    fn activate_requires_install() {
        let origin = serve(&user_manager_routes());
        let sandbox = Sandbox::new(&origin, "v2");

        sandbox
            .shelf()
            .arg("activate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Run: shelf install"));
    }

    #[test]
    fn update_reclaims_previous_generation() {
        let origin = serve(&user_manager_routes());
        let sandbox = Sandbox::new(&origin, "v1");
        sandbox.shelf().arg("update").assert().success();

        sandbox.write_config(&origin, "v2");
        sandbox
            .shelf()
            .arg("update")
            .assert()
            .success()
            .stdout(predicate::str::contains("User-Manager-cache-v1"));

        sandbox
            .shelf()
            .args(["partitions", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout("User-Manager-cache-v2\n");
    }

    #[test]
    fn install_keeps_serving_generation_until_activate() {
        let origin = serve(&user_manager_routes());
        let sandbox = Sandbox::new(&origin, "v2");
        sandbox.shelf().arg("update").assert().success();
        sandbox.shelf().arg("install").assert().success();

        sandbox
            .shelf()
            .args(["fetch", "/User-Manager/index.html"])
            .assert()
            .success()
            .stderr(predicate::str::contains("served from cache"));

        sandbox
            .shelf()
            .args(["status", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"state\": \"activated\""))
            .stdout(predicate::str::contains("\"pending\": \"installed\""));

        sandbox.shelf().arg("activate").assert().success();

        sandbox
            .shelf()
            .args(["status", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"state\": \"activated\""))
            .stdout(predicate::str::contains("pending").not());
    }

    #[test]
    fn resolve_reports_scope() {
        let origin = serve(&[]);
        let sandbox = Sandbox::new(&origin, "v2");

        sandbox
            .shelf()
            .args(["resolve", "/User-Manager/index.html", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"partition\": \"User-Manager-cache-v2\""))
            .stdout(predicate::str::contains("\"intercepted\": true"));

        sandbox
            .shelf()
            .args(["resolve", "/favicon.ico", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"intercepted\": false"));
    }

    #[test]
    fn partitions_show_lists_entries() {
        let origin = serve(&user_manager_routes());
        let sandbox = Sandbox::new(&origin, "v2");
        sandbox.shelf().arg("install").assert().success();

        sandbox
            .shelf()
            .args(["partitions", "show", "User-Manager-cache-v2", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("/User-Manager/index.html"))
            .stdout(predicate::str::contains("/User-Manager/manifest.json"));

        sandbox
            .shelf()
            .args(["partitions", "delete", "User-Manager-cache-v2", "--yes"])
            .assert()
            .success();

        sandbox
            .shelf()
            .args(["partitions", "delete", "User-Manager-cache-v2", "--yes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Partition not found"));
    }
}

mod record_tests {
    use super::support::{serve, Sandbox};
    use predicates::prelude::*;

    #[test]
    fn record_crud() {
        let origin = serve(&[]);
        let sandbox = Sandbox::new(&origin, "v2");

        sandbox
            .shelf()
            .args(["records", "--store", "users", "add", "name=Alice", "age=30"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Added record"));

        sandbox
            .shelf()
            .args(["records", "--store", "users", "update", "1", "name=Alicia"])
            .assert()
            .success();

        sandbox
            .shelf()
            .args(["records", "--store", "users", "get", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"name\": \"Alicia\""))
            .stdout(predicate::str::contains("\"age\": 30"));

        sandbox
            .shelf()
            .args(["records", "--store", "users", "delete", "1"])
            .assert()
            .success();

        sandbox
            .shelf()
            .args(["records", "--store", "users", "get", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Record not found: 1"));

        sandbox
            .shelf()
            .args(["records", "--store", "users", "list", "--format", "json"])
            .assert()
            .success()
            .stdout("[]\n");
    }

    #[test]
    fn store_name_outside_records_dir_is_rejected() {
        let origin = serve(&[]);
        let sandbox = Sandbox::new(&origin, "v2");

        sandbox
            .shelf()
            .args(["records", "--store", "../../escaped", "add", "a=1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid record store name"));

        assert!(!sandbox.dir.path().join("escaped.json").exists());
        assert!(!sandbox.dir.path().parent().unwrap().join("escaped.json").exists());
    }
}
