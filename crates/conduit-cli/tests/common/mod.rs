//! Shared helpers for `conduit` binary tests.

use assert_cmd::cargo::cargo_bin_cmd;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timeout for every CLI invocation.
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Variables that would leak the caller's environment into a test run.
const ISOLATED_VARS: &[&str] = &[
    "RUST_LOG",
    "CONDUIT_DEBUG",
    "CONDUIT_REQUEST_TIMEOUT_MS",
    "CONDUIT_HANDLER_TIMEOUT_MS",
    "CONDUIT_RECONNECT_INTERVAL_MS",
    "CONDUIT_RECONNECT_STRATEGY",
    "CONDUIT_FORCE_PLUGINS",
    "CONDUIT_LOCALE",
];

/// `conduit` with a clean environment and no global config.
pub fn conduit_cmd() -> assert_cmd::Command {
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("conduit");
    cmd.timeout(TIMEOUT);
    for var in ISOLATED_VARS {
        cmd.env_remove(var);
    }
    cmd.arg("--no-global-config");
    cmd
}

/// Writes a manifest for `id@version` requiring each `(id, matcher)`.
pub fn write_manifest(
    dir: &Path,
    id: &str,
    version: &str,
    requires: &[(&str, &str)],
) -> PathBuf {
    let mut text = format!("[plugin]\nid = \"{id}\"\nversion = \"{version}\"\n");
    for (dependency, matcher) in requires {
        text.push_str(&format!(
            "\n[[dependencies]]\nid = \"{dependency}\"\nversion = \"{matcher}\"\n"
        ));
    }
    let file = dir.join(format!("{}.toml", id.replace(':', "_")));
    std::fs::write(&file, text).expect("write manifest");
    file
}

/// Writes `<root>/.conduit/config.toml`.
pub fn write_project_config(root: &Path, text: &str) {
    let dir = root.join(".conduit");
    std::fs::create_dir_all(&dir).expect("create .conduit");
    std::fs::write(dir.join("config.toml"), text).expect("write project config");
}
