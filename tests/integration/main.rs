//! Integration tests for pybake

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    const DJANGO_REQUIREMENTS: &str = "\
Django==5.0.6
gunicorn==22.0.0
psycopg2==2.9.9  # needs libpq headers
";

    /// Command isolated from the user's config and state directories
    fn pybake(home: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("pybake");
        cmd.env("HOME", home.path())
            .env("XDG_CONFIG_HOME", home.path().join("config"))
            .env("XDG_STATE_HOME", home.path().join("state"))
            .env("PYBAKE_CONFIG", home.path().join("config/pybake/config.toml"))
            .env("CI", "1");
        cmd
    }

    fn project(requirements: &str, local_config: Option<&str>) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("requirements.txt"), requirements).unwrap();
        std::fs::write(dir.path().join("manage.py"), "import sys\n").unwrap();
        if let Some(config) = local_config {
            std::fs::write(dir.path().join("pybake.toml"), config).unwrap();
        }
        dir
    }

    fn context_arg(dir: &TempDir) -> &Path {
        dir.path()
    }

    #[test]
    fn help_displays() {
        let home = TempDir::new().unwrap();
        pybake(&home)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("least-privilege"));
    }

    #[test]
    fn version_displays() {
        let home = TempDir::new().unwrap();
        pybake(&home)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("pybake"));
    }

    #[test]
    fn render_orders_dependencies_before_source() {
        let home = TempDir::new().unwrap();
        let dir = project(DJANGO_REQUIREMENTS, Some("[variant]\nexposed_port = 8000\n"));

        let output = pybake(&home)
            .arg("render")
            .arg("--context")
            .arg(context_arg(&dir))
            .output()
            .unwrap();
        assert!(output.status.success());

        let dockerfile = String::from_utf8(output.stdout).unwrap();
        let pos = |needle: &str| {
            dockerfile
                .find(needle)
                .unwrap_or_else(|| panic!("missing {needle} in\n{dockerfile}"))
        };

        assert!(dockerfile.contains("FROM python:3.12-slim"));
        assert!(dockerfile.contains("PYTHONUNBUFFERED=1"));
        assert!(dockerfile.contains("libpq-dev"));
        assert!(pos("COPY requirements.txt") < pos("RUN pip install"));
        assert!(pos("RUN pip install") < pos("COPY . /app"));
        assert!(pos("useradd") < pos("USER appuser"));
        assert!(pos("chown -R appuser:appuser /app/staticfiles") < pos("USER appuser"));
        assert!(pos("USER appuser") < pos("EXPOSE 8000"));
    }

    #[test]
    fn render_without_db_driver_skips_headers() {
        let home = TempDir::new().unwrap();
        let dir = project("flask==3.0.0\n", None);

        pybake(&home)
            .arg("render")
            .arg("-C")
            .arg(context_arg(&dir))
            .assert()
            .success()
            .stdout(predicate::str::contains("build-essential"))
            .stdout(predicate::str::contains("libpq-dev").not())
            .stdout(predicate::str::contains("EXPOSE").not());
    }

    #[test]
    fn render_writes_output_file() {
        let home = TempDir::new().unwrap();
        let dir = project("flask==3.0.0\n", None);
        let out = dir.path().join("Dockerfile.generated");

        pybake(&home)
            .arg("render")
            .arg("-C")
            .arg(context_arg(&dir))
            .arg("--output")
            .arg(&out)
            .assert()
            .success();

        let content = std::fs::read_to_string(out).unwrap();
        assert!(content.starts_with("# Generated by pybake"));
    }

    #[test]
    fn plan_lists_steps() {
        let home = TempDir::new().unwrap();
        let dir = project(DJANGO_REQUIREMENTS, None);

        pybake(&home)
            .arg("plan")
            .arg("-C")
            .arg(context_arg(&dir))
            .assert()
            .success()
            .stdout(predicate::str::contains("install Python dependencies"))
            .stdout(predicate::str::contains("pybake-"))
            .stdout(predicate::str::contains("No previous build recorded"));
    }

    #[test]
    fn plan_missing_manifest_fails() {
        let home = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();

        pybake(&home)
            .arg("plan")
            .arg("-C")
            .arg(dir.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("Dependency manifest not found"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn plan_missing_source_fails() {
        let home = TempDir::new().unwrap();
        let dir = project("flask==3.0.0\n", Some("[image]\nsource = \"src\"\n"));

        pybake(&home)
            .arg("plan")
            .arg("-C")
            .arg(context_arg(&dir))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Source path not found"));
    }

    #[test]
    fn unpinned_base_fails() {
        let home = TempDir::new().unwrap();
        let dir = project("flask==3.0.0\n", Some("[image]\nbase = \"python:latest\"\n"));

        pybake(&home)
            .arg("render")
            .arg("-C")
            .arg(context_arg(&dir))
            .assert()
            .failure()
            .stderr(predicate::str::contains("not pinned"));
    }

    #[test]
    fn invalid_manifest_reports_line() {
        let home = TempDir::new().unwrap();
        let dir = project("Django==5.0.6\nflask==\n", None);

        pybake(&home)
            .arg("plan")
            .arg("-C")
            .arg(context_arg(&dir))
            .assert()
            .failure()
            .stderr(predicate::str::contains("line 2"));
    }

    #[test]
    fn layered_requirements_rejected() {
        let home = TempDir::new().unwrap();
        let dir = project("-r base.txt\ngunicorn==22.0.0\n", None);
        std::fs::write(dir.path().join("base.txt"), "flask==3.0.0\n").unwrap();

        pybake(&home)
            .arg("plan")
            .arg("-C")
            .arg(context_arg(&dir))
            .assert()
            .failure()
            .stderr(predicate::str::contains("line 1"))
            .stderr(predicate::str::contains("base.txt"));
    }

    #[test]
    fn static_dir_covering_workdir_rejected() {
        let home = TempDir::new().unwrap();
        for static_dir in [".", "/", "/app", ".."] {
            let config = format!("[variant]\nstatic_dir = \"{}\"\n", static_dir);
            let dir = project("flask==3.0.0\n", Some(&config));

            pybake(&home)
                .arg("render")
                .arg("-C")
                .arg(context_arg(&dir))
                .assert()
                .failure()
                .stderr(predicate::str::contains("variant.static_dir"));
        }
    }

    fn planned_tag(home: &TempDir, dir: &TempDir) -> String {
        let output = pybake(home)
            .arg("plan")
            .arg("-C")
            .arg(context_arg(dir))
            .output()
            .unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8(output.stdout).unwrap();
        let start = stdout.find("pybake-").unwrap();
        stdout[start..start + "pybake-".len() + 12].to_string()
    }

    #[test]
    fn allowlist_dockerignore_tracks_source_edits() {
        let home = TempDir::new().unwrap();
        let dir = project("flask==3.0.0\n", None);
        std::fs::create_dir_all(dir.path().join("app")).unwrap();
        std::fs::write(dir.path().join("app/views.py"), "def index(): ...\n").unwrap();
        std::fs::write(dir.path().join(".dockerignore"), "*\n!app/\n!requirements.txt\n").unwrap();

        let before = planned_tag(&home, &dir);
        std::fs::write(dir.path().join("app/views.py"), "def index(): return 'v2'\n").unwrap();
        let after = planned_tag(&home, &dir);

        assert_ne!(before, after);
    }

    #[test]
    fn no_local_ignores_project_config() {
        let home = TempDir::new().unwrap();
        let dir = project("flask==3.0.0\n", Some("[variant]\nexposed_port = 8000\n"));

        pybake(&home)
            .arg("render")
            .arg("--no-local")
            .arg("-C")
            .arg(context_arg(&dir))
            .assert()
            .success()
            .stdout(predicate::str::contains("EXPOSE").not());
    }

    #[test]
    fn init_creates_project_config() {
        let home = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();

        pybake(&home)
            .args(["init", "--path"])
            .arg(dir.path())
            .assert()
            .success();

        assert!(dir.path().join("pybake.toml").exists());

        pybake(&home)
            .args(["init", "--path"])
            .arg(dir.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));
    }

    #[test]
    fn config_path() {
        let home = TempDir::new().unwrap();
        pybake(&home)
            .args(["config", "path", "--no-local"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let home = TempDir::new().unwrap();
        pybake(&home)
            .args(["config", "show", "--no-local"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[image]"))
            .stdout(predicate::str::contains("python:3.12-slim"));
    }

    #[test]
    fn config_set_then_show() {
        let home = TempDir::new().unwrap();
        pybake(&home)
            .args(["config", "set", "user.name", "web", "--no-local"])
            .assert()
            .success();

        pybake(&home)
            .args(["config", "show", "--no-local"])
            .assert()
            .success()
            .stdout(predicate::str::contains("name = \"web\""));
    }

    #[test]
    fn config_set_unknown_key_fails() {
        let home = TempDir::new().unwrap();
        pybake(&home)
            .args(["config", "set", "image.nope", "x", "--no-local"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn completions_generate() {
        let home = TempDir::new().unwrap();
        pybake(&home)
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("pybake"));
    }
}
