use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::importer::import_file;

use super::open_db;

pub fn run(file: &str, account: &str) -> Result<()> {
    let file_path = PathBuf::from(file);
    let conn = open_db()?;

    let result = import_file(&conn, &file_path, account)?;

    if result.duplicate_file {
        println!("This file has already been imported (duplicate checksum).");
        return Ok(());
    }

    println!(
        "{} imported, {} skipped (duplicates), {} malformed",
        result.imported.to_string().green().bold(),
        result.duplicates,
        result.skipped.len()
    );
    println!(
        "{} classified, {} unclassified",
        result.classified, result.unclassified
    );
    if let Some(id) = result.upload_id {
        println!("Recorded as upload #{id} (undo with `simplefi uploads delete {id}`)");
    }

    if !result.skipped.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Line", "Reason"]);
        for row in &result.skipped {
            table.add_row(vec![Cell::new(row.line), Cell::new(&row.reason)]);
        }
        println!("{}\n{table}", "Skipped rows".red());
    }
    Ok(())
}
