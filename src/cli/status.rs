use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::{load_settings, DB_FILE};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join(DB_FILE);

    println!("User:       {}", if settings.user_name.is_empty() { "(not set)" } else { &settings.user_name });
    println!("Data dir:   {}", data_dir.display());
    println!("Database:   {}", db_path.display());

    if db_path.exists() {
        let size = std::fs::metadata(&db_path)?.len();
        println!("DB size:    {}", format_bytes(size));

        let conn = get_connection(&db_path)?;
        let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };

        println!();
        println!("Accounts:      {}", count("SELECT count(*) FROM accounts")?);
        println!("Uploads:       {}", count("SELECT count(*) FROM uploads")?);
        println!("Transactions:  {}", count("SELECT count(*) FROM transactions")?);
        println!(
            "Unclassified:  {}",
            count("SELECT count(*) FROM transactions WHERE category_id IS NULL")?
        );
        println!("Categories:    {}", count("SELECT count(*) FROM categories")?);
        println!("Rules:         {}", count("SELECT count(*) FROM rules")?);
        println!("Credit lines:  {}", count("SELECT count(*) FROM credit_lines")?);
        if let Some(range) = conn.query_row(
            "SELECT min(date) || ' to ' || max(date) FROM transactions",
            [],
            |r| r.get::<_, Option<String>>(0),
        )? {
            println!("History:       {range}");
        }
    } else {
        println!();
        println!("Database not found. Run `simplefi init` to set up.");
    }

    Ok(())
}
