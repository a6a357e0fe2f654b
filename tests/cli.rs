use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A `simplefi` invocation isolated inside `home`.
fn simplefi(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("simplefi").unwrap();
    cmd.env("HOME", home)
        .env("SIMPLEFI_CONFIG", home.join("settings.json"))
        .env("SIMPLEFI_DATA_DIR", home.join("data"))
        .env("NO_COLOR", "1")
        .env("CLICOLOR", "0")
        .env_remove("RUST_LOG");
    cmd
}

fn write_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("Date,Amount,Description\n{body}")).unwrap();
    path
}

/// Initialized data dir with a Checking account, a Dining category and a
/// COFFEE rule.
fn setup() -> TempDir {
    let home = tempfile::tempdir().unwrap();
    simplefi(home.path()).arg("init").assert().success();
    simplefi(home.path())
        .args(["accounts", "add", "Checking"])
        .assert()
        .success();
    simplefi(home.path())
        .args(["categories", "add", "Dining", "--class", "discretionary"])
        .assert()
        .success();
    simplefi(home.path())
        .args(["rules", "add", "COFFEE", "--category", "Dining"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added rule: 'COFFEE'"));
    home
}

#[test]
fn commands_require_init() {
    let home = tempfile::tempdir().unwrap();
    simplefi(home.path())
        .args(["accounts", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("simplefi init"));
}

#[test]
fn init_then_status() {
    let home = tempfile::tempdir().unwrap();
    simplefi(home.path())
        .args(["init", "--name", "Sam"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized"));
    assert!(home.path().join("data").join("simplefi.db").exists());

    simplefi(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("User:       Sam"))
        .stdout(predicate::str::contains("Transactions:  0"));
}

#[test]
fn import_classifies_and_reupload_adds_nothing() {
    let home = setup();
    let csv = write_csv(home.path(), "jan.csv", "2024-01-05,-12.50,COFFEE SHOP\n");

    simplefi(home.path())
        .args(["import", csv.to_str().unwrap(), "--account", "Checking"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 imported"))
        .stdout(predicate::str::contains("1 classified"))
        .stdout(predicate::str::contains("upload #1"));

    simplefi(home.path())
        .args(["import", csv.to_str().unwrap(), "--account", "Checking"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already been imported"));

    simplefi(home.path())
        .args(["transactions", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dining (Discretionary)"))
        .stdout(predicate::str::contains("Transactions (1)"));
}

#[test]
fn overlapping_upload_only_adds_new_rows() {
    let home = setup();
    let jan = write_csv(home.path(), "a.csv", "2024-01-05,-12.50,COFFEE SHOP\n");
    let overlap = write_csv(
        home.path(),
        "b.csv",
        "2024-01-05,-12.50,COFFEE SHOP\n2024-01-09,-20.00,BOOKSTORE\n",
    );
    simplefi(home.path())
        .args(["import", jan.to_str().unwrap(), "--account", "Checking"])
        .assert()
        .success();
    simplefi(home.path())
        .args(["import", overlap.to_str().unwrap(), "--account", "Checking"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 imported, 1 skipped (duplicates)"));

    simplefi(home.path())
        .arg("unclassified")
        .assert()
        .success()
        .stdout(predicate::str::contains("BOOKSTORE"))
        .stdout(predicate::str::contains("COFFEE SHOP").not());
}

#[test]
fn malformed_rows_are_reported() {
    let home = setup();
    let csv = write_csv(
        home.path(),
        "bad.csv",
        "2024-01-05,-12.50,COFFEE SHOP\nyesterday,-1.00,TEA\n",
    );
    simplefi(home.path())
        .args(["import", csv.to_str().unwrap(), "--account", "Checking"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 malformed"))
        .stdout(predicate::str::contains("invalid date 'yesterday'"));
}

#[test]
fn summary_has_category_and_unclassified_buckets() {
    let home = setup();
    let csv = write_csv(
        home.path(),
        "jan.csv",
        "2024-01-05,-12.50,COFFEE SHOP\n2024-01-09,-20.00,BOOKSTORE\n",
    );
    simplefi(home.path())
        .args(["import", csv.to_str().unwrap(), "--account", "Checking"])
        .assert()
        .success();

    simplefi(home.path())
        .args(["summary", "--from", "2024-01", "--to", "2024-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-01"))
        .stdout(predicate::str::contains("Dining (Discretionary)"))
        .stdout(predicate::str::contains("Unclassified"))
        .stdout(predicate::str::contains("-$32.50"));

    simplefi(home.path())
        .args(["summary", "--class", "discretionary", "--from", "2024-01", "--to", "2024-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unclassified").not());
}

#[test]
fn unknown_account_is_an_error() {
    let home = setup();
    let csv = write_csv(home.path(), "jan.csv", "2024-01-05,-12.50,COFFEE SHOP\n");
    simplefi(home.path())
        .args(["import", csv.to_str().unwrap(), "--account", "Nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: Unknown account: Nope"));
}

#[test]
fn invalid_regex_rule_is_rejected() {
    let home = setup();
    simplefi(home.path())
        .args(["rules", "add", "(unclosed", "--category", "Dining"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid pattern"));
}

#[test]
fn manual_category_survives_reclassify() {
    let home = setup();
    simplefi(home.path())
        .args(["categories", "add", "Gifts", "--class", "discretionary"])
        .assert()
        .success();
    let csv = write_csv(home.path(), "jan.csv", "2024-01-05,-12.50,COFFEE SHOP\n");
    simplefi(home.path())
        .args(["import", csv.to_str().unwrap(), "--account", "Checking"])
        .assert()
        .success();
    simplefi(home.path())
        .args(["transactions", "set-category", "1", "Gifts"])
        .assert()
        .success();
    simplefi(home.path())
        .args(["classify", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 classified"));
    simplefi(home.path())
        .args(["transactions", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Gifts (Discretionary)"))
        .stdout(predicate::str::contains("manual"));
}

#[test]
fn export_then_restore_into_fresh_data_dir() {
    let home = setup();
    let csv = write_csv(
        home.path(),
        "jan.csv",
        "2024-01-05,-12.50,COFFEE SHOP\n2024-01-09,-20.00,BOOKSTORE\n",
    );
    simplefi(home.path())
        .args(["import", csv.to_str().unwrap(), "--account", "Checking"])
        .assert()
        .success();
    let export = home.path().join("history.csv");
    simplefi(home.path())
        .args(["export", "csv", "--output", export.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 transactions"));

    let fresh = tempfile::tempdir().unwrap();
    simplefi(fresh.path()).arg("init").assert().success();
    simplefi(fresh.path())
        .args(["restore", export.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 restored"))
        .stdout(predicate::str::contains("1 accounts created"));
    simplefi(fresh.path())
        .args(["transactions", "list", "--account", "Checking"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions (2)"));
}

#[test]
fn database_backup_is_written() {
    let home = setup();
    let dest = home.path().join("copy.db");
    simplefi(home.path())
        .args(["export", "db", "--output", dest.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup saved to"));
    assert!(dest.exists());
}

#[test]
fn debt_summary_lists_statement_months() {
    let home = setup();
    simplefi(home.path())
        .args([
            "debt", "lines", "add", "Visa", "--limit", "1000", "--rate", "12", "--min-pct", "2",
            "--min-dollars", "25",
        ])
        .assert()
        .success();
    simplefi(home.path())
        .args(["debt", "statement", "Visa", "--month", "2024-01", "--balance", "500"])
        .assert()
        .success();
    simplefi(home.path())
        .args(["debt", "summary"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Jan 2024"))
        .stdout(predicate::str::contains("Visa"))
        .stderr(predicate::str::contains("No debt budget specified"));
}

#[test]
fn completions_are_generated() {
    let home = tempfile::tempdir().unwrap();
    simplefi(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("simplefi"));
}

fn import(home: &Path, csv: &Path) {
    simplefi(home)
        .args(["import", csv.to_str().unwrap(), "--account", "Checking"])
        .assert()
        .success();
}

#[test]
fn higher_priority_rule_takes_over_earlier_imports() {
    let home = setup();
    simplefi(home.path())
        .args(["categories", "add", "Shops", "--class", "discretionary"])
        .assert()
        .success();
    simplefi(home.path())
        .args(["rules", "add", "SHOP", "--category", "Shops", "--match-type", "contains", "--priority", "5"])
        .assert()
        .success();
    import(home.path(), &write_csv(home.path(), "jan.csv", "2024-01-05,-12.50,COFFEE SHOP\n"));
    simplefi(home.path())
        .args(["transactions", "list", "--category", "Shops"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions (1)"));

    simplefi(home.path())
        .args(["rules", "add", "COFFEE SHOP", "--category", "Dining", "--match-type", "contains", "--priority", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 transactions moved"));
    import(home.path(), &write_csv(home.path(), "feb.csv", "2024-02-05,-12.50,COFFEE SHOP\n"));
    simplefi(home.path())
        .args(["transactions", "list", "--category", "Dining"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions (2)"));
}

#[test]
fn deleting_a_rule_falls_back_to_the_next_match() {
    let home = setup();
    simplefi(home.path())
        .args(["categories", "add", "Shops", "--class", "discretionary"])
        .assert()
        .success();
    simplefi(home.path())
        .args(["rules", "add", "SHOP", "--category", "Shops", "--match-type", "contains", "--priority=-1"])
        .assert()
        .success();
    import(home.path(), &write_csv(home.path(), "jan.csv", "2024-01-05,-12.50,COFFEE SHOP\n"));
    simplefi(home.path())
        .args(["rules", "delete", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 transactions picked up by other rules"));
    simplefi(home.path())
        .args(["transactions", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Shops (Discretionary)"));
}

#[test]
fn transactions_list_filters_by_class() {
    let home = setup();
    import(
        home.path(),
        &write_csv(home.path(), "jan.csv", "2024-01-05,-12.50,COFFEE SHOP\n2024-01-09,-20.00,BOOKSTORE\n"),
    );
    simplefi(home.path())
        .args(["transactions", "list", "--class", "bills"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions (0)"));
    simplefi(home.path())
        .args(["transactions", "list", "--class", "discretionary"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions (1)"))
        .stdout(predicate::str::contains("BOOKSTORE").not());
}

#[test]
fn purge_needs_confirmation_and_allows_reimport() {
    let home = setup();
    let csv = write_csv(home.path(), "jan.csv", "2024-01-05,-12.50,COFFEE SHOP\n");
    import(home.path(), &csv);

    simplefi(home.path())
        .arg("purge")
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cancelled"));
    simplefi(home.path())
        .args(["purge", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Purged 1 transactions"));
    simplefi(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions:  0"));
    simplefi(home.path())
        .args(["import", csv.to_str().unwrap(), "--account", "Checking"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 imported"));
}

#[test]
fn stored_exports_can_be_listed_restored_and_deleted() {
    let home = setup();
    import(home.path(), &write_csv(home.path(), "jan.csv", "2024-01-05,-12.50,COFFEE SHOP\n"));
    simplefi(home.path()).args(["export", "csv"]).assert().success();

    let exports = home.path().join("data").join("exports");
    let name = std::fs::read_dir(&exports)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .find(|n| n.ends_with(".csv"))
        .unwrap();
    simplefi(home.path())
        .args(["export", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(name.as_str()));

    simplefi(home.path()).args(["purge", "--yes"]).assert().success();
    simplefi(home.path())
        .args(["restore", name.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 restored"));

    simplefi(home.path())
        .args(["export", "delete", name.as_str()])
        .assert()
        .success();
    simplefi(home.path())
        .args(["export", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No stored exports"));
}

#[test]
fn restore_rejects_files_without_backup_columns() {
    let home = setup();
    let csv = write_csv(home.path(), "bank.csv", "2024-01-05,-12.50,COFFEE SHOP\n");
    simplefi(home.path())
        .args(["restore", csv.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing columns"));
}
