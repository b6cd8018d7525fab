//! E2E tests for the `conduit` binary.
//!
//! Results go to stdout; errors and logs go to stderr.

mod common;

use common::{conduit_cmd, write_manifest, write_project_config};
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

// =============================================================================
// match
// =============================================================================

mod matching {
    use super::*;

    #[test]
    fn reports_each_path() {
        conduit_cmd()
            .args(["match", "files.++", "files.a.b", "files", "other.a"])
            .assert()
            .success()
            .stdout(contains("files.a.b: match"))
            .stdout(contains("files: no match"))
            .stdout(contains("other.a: no match"));
    }

    #[test]
    fn regex_segment_and_optional_tail() {
        conduit_cmd()
            .args(["match", "conduit.plugin.??.{read|write}"])
            .args(["conduit.plugin.acme.tool.read", "conduit.plugin.read", "conduit.read"])
            .assert()
            .success()
            .stdout(contains("conduit.plugin.acme.tool.read: match"))
            .stdout(contains("conduit.plugin.read: match"))
            .stdout(contains("conduit.read: no match"));
    }

    #[test]
    fn two_greedy_tokens_fail() {
        conduit_cmd()
            .args(["match", "a.??.b.++", "a.b"])
            .assert()
            .failure()
            .stderr(contains("AUTH_MULTIPLE_GREEDY"));
    }

    #[test]
    fn broken_regex_fails() {
        conduit_cmd()
            .args(["match", "a.{[}", "a.b"])
            .assert()
            .failure()
            .stderr(contains("AUTH_INVALID_REGEX"));
    }

    #[test]
    fn path_with_empty_segment_fails() {
        conduit_cmd()
            .args(["match", "a.+", "a..b"])
            .assert()
            .failure()
            .stderr(contains("AUTH_INVALID_PATH"));
    }

    #[test]
    fn pattern_without_paths_is_usage_error() {
        conduit_cmd().args(["match", "a.+"]).assert().failure().code(2);
    }
}

// =============================================================================
// resolve
// =============================================================================

mod resolve {
    use super::*;

    #[test]
    fn dependencies_come_first() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let search = write_manifest(tmp.path(), "acme:search", "1.4.0", &[("acme:index", "^2")]);
        let index = write_manifest(tmp.path(), "acme:index", "2.1.0", &[]);

        conduit_cmd()
            .arg("resolve")
            .arg(&search)
            .arg(&index)
            .assert()
            .success()
            .stdout(contains("1. acme:index"))
            .stdout(contains("2. acme:search"))
            .stdout(contains("acme:search@1.4.0 [ENABLED]"))
            .stdout(contains("failed:").not());
    }

    #[test]
    fn cycle_names_both_plugins() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let a = write_manifest(tmp.path(), "acme:a", "1.0.0", &[("acme:b", "*")]);
        let b = write_manifest(tmp.path(), "acme:b", "1.0.0", &[("acme:a", "*")]);

        conduit_cmd()
            .arg("resolve")
            .arg(&a)
            .arg(&b)
            .arg("--force")
            .assert()
            .failure()
            .stderr(contains("PLUGIN_RESOLUTION_REJECTED"))
            .stderr(contains("dependency cycle between acme:a, acme:b"));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let search = write_manifest(tmp.path(), "acme:search", "1.4.0", &[("acme:index", "^3")]);
        let index = write_manifest(tmp.path(), "acme:index", "2.1.0", &[]);

        conduit_cmd()
            .arg("resolve")
            .arg(&search)
            .arg(&index)
            .assert()
            .failure()
            .stderr(contains("rejected: plugin acme:search requires acme:index"))
            .stderr(contains("found 2.1.0"));
    }

    #[test]
    fn protocol_flag_changes_platform_version() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let manifest = tmp.path().join("next.toml");
        std::fs::write(
            &manifest,
            "[plugin]\nid = \"acme:next\"\nversion = \"0.1.0\"\nprotocol = \"^2\"\n",
        )
        .expect("write manifest");

        conduit_cmd()
            .arg("resolve")
            .arg(&manifest)
            .assert()
            .failure()
            .stderr(contains("wants protocol"));

        conduit_cmd()
            .arg("resolve")
            .arg(&manifest)
            .args(["--protocol", "2.0.0"])
            .assert()
            .success()
            .stdout(contains("1. acme:next"));
    }

    #[test]
    fn unreadable_manifest_fails() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let broken = tmp.path().join("broken.toml");
        std::fs::write(&broken, "[plugin]\nid = \"acme:x\"\nversion = \"one\"\n")
            .expect("write manifest");

        conduit_cmd()
            .arg("resolve")
            .arg(&broken)
            .assert()
            .failure()
            .stderr(contains("PLUGIN_MANIFEST"));
    }

    #[test]
    fn scans_configured_directory() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let plugins = tmp.path().join("plugins");
        std::fs::create_dir_all(&plugins).expect("create plugins dir");
        write_manifest(&plugins, "acme:app", "1.0.0", &[("acme:lib", "^1")]);
        write_manifest(&plugins, "acme:lib", "1.2.0", &[]);
        std::fs::write(plugins.join("README.md"), "not a manifest").expect("write readme");
        write_project_config(tmp.path(), "[plugins]\ndirectory = \"plugins\"\n");

        conduit_cmd()
            .arg("-C")
            .arg(tmp.path())
            .arg("resolve")
            .assert()
            .success()
            .stdout(contains("1. acme:lib"))
            .stdout(contains("2. acme:app"));
    }

    #[test]
    fn nothing_to_resolve_fails() {
        let tmp = tempfile::tempdir().expect("tempdir");

        conduit_cmd()
            .arg("-C")
            .arg(tmp.path())
            .arg("resolve")
            .assert()
            .failure()
            .stderr(contains("no manifests given"));
    }
}

// =============================================================================
// config
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn defaults_without_files() {
        let tmp = tempfile::tempdir().expect("tempdir");

        conduit_cmd()
            .arg("-C")
            .arg(tmp.path())
            .arg("config")
            .assert()
            .success()
            .stdout(contains("debug = false"))
            .stdout(contains("request_timeout_ms = 30000"))
            .stdout(contains("locale = \"en\""));
    }

    #[test]
    fn project_then_env_then_flags() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_project_config(
            tmp.path(),
            "[connection]\nrequest_timeout_ms = 5000\n\n[language]\nlocale = \"fr\"\n",
        );

        conduit_cmd()
            .arg("-C")
            .arg(tmp.path())
            .env("CONDUIT_LOCALE", "de")
            .arg("--debug")
            .arg("config")
            .assert()
            .success()
            .stdout(contains("request_timeout_ms = 5000"))
            .stdout(contains("locale = \"de\""))
            .stdout(contains("debug = true"));
    }

    #[test]
    fn invalid_env_value_fails() {
        let tmp = tempfile::tempdir().expect("tempdir");

        conduit_cmd()
            .arg("-C")
            .arg(tmp.path())
            .env("CONDUIT_DEBUG", "maybe")
            .arg("config")
            .assert()
            .failure()
            .stderr(contains("Config error"))
            .stderr(contains("CONDUIT_DEBUG"));
    }

    #[test]
    fn malformed_project_file_fails() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_project_config(tmp.path(), "debug = [");

        conduit_cmd()
            .arg("-C")
            .arg(tmp.path())
            .arg("config")
            .assert()
            .failure()
            .stderr(contains("Config error"));
    }

    #[test]
    fn constraint_violation_names_key() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_project_config(tmp.path(), "[connection.reconnect]\nmultiplier = 0.5\n");

        conduit_cmd()
            .arg("-C")
            .arg(tmp.path())
            .arg("config")
            .assert()
            .failure()
            .stderr(contains("connection.reconnect.multiplier"));
    }
}
