//! End-to-end runs of the `tusker` binary against a throwaway
//! configuration root.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn tusker(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tusker").expect("binary");
    cmd.env("TUSKER_CONFIG_HOME", config_home);
    cmd
}

#[test]
fn a_fresh_account_can_be_configured_and_queued() {
    let dir = tempdir().expect("tempdir");

    tusker(dir.path())
        .args(["new", "someone@example.social"])
        .assert()
        .success();

    // The instance came out of the account name.
    tusker(dir.path())
        .args(["config", "instance_url"])
        .assert()
        .success()
        .stdout("example.social\n");

    tusker(dir.path())
        .args(["config", "access_token", "sometoken"])
        .assert()
        .success();
    tusker(dir.path())
        .args(["config", "access_token"])
        .assert()
        .success()
        .stdout("sometoken\n");

    tusker(dir.path())
        .args(["queue", "fav", "add", "123", "456"])
        .assert()
        .success();
    tusker(dir.path())
        .args(["queue", "fav", "show"])
        .assert()
        .success()
        .stdout("123\n456\n");

    // Removing a pending add cancels it rather than queueing a removal.
    tusker(dir.path())
        .args(["queue", "fav", "remove", "123"])
        .assert()
        .success();
    tusker(dir.path())
        .args(["queue", "fav", "show"])
        .assert()
        .success()
        .stdout("456\n");
}

#[test]
fn unset_options_show_as_not_set() {
    let dir = tempdir().expect("tempdir");
    tusker(dir.path())
        .args(["new", "someone@example.social"])
        .assert()
        .success();

    tusker(dir.path())
        .args(["config", "client_id"])
        .assert()
        .success()
        .stdout("[not set]\n");
}

#[test]
fn showall_lists_options_and_accounts() {
    let dir = tempdir().expect("tempdir");
    tusker(dir.path())
        .args(["new", "someone@example.social"])
        .assert()
        .success();

    tusker(dir.path())
        .args(["config", "showall"])
        .assert()
        .success()
        .stdout(predicate::str::contains("account_name: someone@example.social"))
        .stdout(predicate::str::contains("pull_home: newest_first"))
        .stdout(predicate::str::contains("pull_dms: dont_sync"))
        .stdout(predicate::str::contains(
            "accounts registered: someone@example.social",
        ));
}

#[test]
fn sync_settings_parse_through_the_one_character_dispatch() {
    let dir = tempdir().expect("tempdir");
    tusker(dir.path())
        .args(["new", "someone@example.social"])
        .assert()
        .success();

    tusker(dir.path())
        .args(["config", "pull_home", "oldest_first"])
        .assert()
        .success();
    tusker(dir.path())
        .args(["config", "pull_home"])
        .assert()
        .success()
        .stdout("oldest_first\n");

    tusker(dir.path())
        .args(["config", "pull_home", "sideways"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown setting"));
}

#[test]
fn unknown_option_names_are_refused() {
    let dir = tempdir().expect("tempdir");
    tusker(dir.path())
        .args(["new", "someone@example.social"])
        .assert()
        .success();

    tusker(dir.path())
        .args(["config", "favourite_colour", "teal"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown option"));
}

#[test]
fn ambiguous_account_prefixes_are_refused() {
    let dir = tempdir().expect("tempdir");
    tusker(dir.path())
        .args(["new", "alice@example.social"])
        .assert()
        .success();
    tusker(dir.path())
        .args(["new", "alan@example.social"])
        .assert()
        .success();

    tusker(dir.path())
        .args(["-a", "al", "queue", "fav", "add", "123"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unambiguous"));

    tusker(dir.path())
        .args(["-a", "alice", "queue", "fav", "add", "123"])
        .assert()
        .success();
}

#[test]
fn sync_refuses_to_run_without_credentials() {
    let dir = tempdir().expect("tempdir");
    tusker(dir.path())
        .args(["new", "someone@example.social"])
        .assert()
        .success();
    tusker(dir.path())
        .args(["queue", "fav", "add", "123"])
        .assert()
        .success();

    // No token was ever configured, so this fails before any network
    // traffic and the queue survives.
    tusker(dir.path())
        .args(["sync"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("access_token"));

    tusker(dir.path())
        .args(["queue", "fav", "show"])
        .assert()
        .success()
        .stdout("123\n");
}

#[test]
fn malformed_account_names_are_refused() {
    let dir = tempdir().expect("tempdir");
    tusker(dir.path())
        .args(["new", "nodomain"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("username@instance.tld"));
}
