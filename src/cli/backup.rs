use std::io::Write;
use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::backup::{
    backup_db, delete_export, export_csv, find_export, list_exports, purge_transactions, restore_csv,
};
use crate::error::{Result, SimplefiError};
use crate::fmt::format_bytes;
use crate::settings::get_data_dir;

use super::open_db;

fn default_path(subdir: &str, ext: &str) -> Result<PathBuf> {
    let dir = get_data_dir().join(subdir);
    std::fs::create_dir_all(&dir)?;
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    Ok(dir.join(format!("simplefi-{stamp}.{ext}")))
}

pub fn csv(output: Option<String>) -> Result<()> {
    let conn = open_db()?;
    let dest = match output {
        Some(p) => PathBuf::from(p),
        None => default_path("exports", "csv")?,
    };
    let file = std::fs::File::create(&dest)?;
    let count = export_csv(&conn, std::io::BufWriter::new(file))?;
    println!("Exported {count} transactions to {}", dest.display());
    Ok(())
}

pub fn db(output: Option<String>) -> Result<()> {
    let conn = open_db()?;
    let dest = match output {
        Some(p) => PathBuf::from(p),
        None => default_path("backups", "db")?,
    };
    let size = backup_db(&conn, &dest)?;
    println!("Backup saved to {}", dest.display());
    println!("Size: {}", format_bytes(size));
    Ok(())
}

fn exports_dir() -> PathBuf {
    get_data_dir().join("exports")
}

pub fn list() -> Result<()> {
    let exports = list_exports(&exports_dir())?;
    if exports.is_empty() {
        println!("No stored exports in {}", exports_dir().display());
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["File", "Created", "Size"]);
    for export in &exports {
        table.add_row(vec![
            Cell::new(&export.name),
            Cell::new(
                export
                    .modified
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default(),
            ),
            Cell::new(format_bytes(export.size)),
        ]);
    }
    println!("Stored exports\n{table}");
    Ok(())
}

pub fn delete(name: &str) -> Result<()> {
    let export = delete_export(&exports_dir(), name)?;
    println!("Deleted export {}", export.name);
    Ok(())
}

pub fn purge(yes: bool) -> Result<()> {
    let conn = open_db()?;
    let count: i64 = conn.query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))?;
    if !yes {
        println!(
            "This will delete all {count} transactions and their upload history. \
             Accounts, categories and rules are kept."
        );
        print!("Continue? [y/N] ");
        std::io::stdout().flush()?;
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled");
            return Ok(());
        }
    }
    let removed = purge_transactions(&conn)?;
    println!("Purged {} transactions", removed.to_string().red());
    Ok(())
}

/// Restore from a file path, or from the name of a stored export.
pub fn restore(file: &str) -> Result<()> {
    let mut path = PathBuf::from(file);
    if !path.exists() {
        path = find_export(&exports_dir(), file)
            .map_err(|_| SimplefiError::Other(format!("{file}: no such file or stored export")))?
            .path;
    }
    let conn = open_db()?;
    let reader = std::io::BufReader::new(std::fs::File::open(&path)?);
    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("restore.csv");
    let result = restore_csv(&conn, reader, source)?;

    println!(
        "{} restored, {} already present, {} malformed",
        result.imported.to_string().green().bold(),
        result.duplicates,
        result.skipped.len()
    );
    if result.accounts_created > 0 {
        println!("{} accounts created", result.accounts_created);
    }
    println!("{} classified", result.classified);
    for row in &result.skipped {
        println!("  line {}: {}", row.line, row.reason.red());
    }
    Ok(())
}
