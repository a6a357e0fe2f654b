use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::importer::{delete_upload, list_uploads};

use super::open_db;

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let uploads = list_uploads(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "File", "Account", "Uploaded", "Records", "From", "To"]);
    for u in uploads {
        table.add_row(vec![
            Cell::new(u.id),
            Cell::new(u.filename),
            Cell::new(u.account_name),
            Cell::new(u.upload_time),
            Cell::new(u.record_count),
            Cell::new(u.date_range_start.unwrap_or_default()),
            Cell::new(u.date_range_end.unwrap_or_default()),
        ]);
    }
    println!("Uploads\n{table}");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let conn = open_db()?;
    let removed = delete_upload(&conn, id)?;
    println!("Deleted upload {id} ({removed} transactions)");
    Ok(())
}
