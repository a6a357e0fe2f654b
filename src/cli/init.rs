use std::path::PathBuf;

use colored::Colorize;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path, DB_FILE};

pub fn run(data_dir: Option<String>, name: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(name) = name {
        settings.user_name = name;
    }

    let data_dir = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&data_dir)?;
    save_settings(&settings)?;

    let db_path = data_dir.join(DB_FILE);
    let existed = db_path.exists();
    let conn = get_connection(&db_path)?;
    init_db(&conn)?;

    if existed {
        println!("Database already initialized at {}", db_path.display());
    } else {
        println!("{} {}", "Initialized".green().bold(), db_path.display());
        println!("Next: `simplefi accounts add <name>` and `simplefi categories add <name> --class <class>`");
    }
    Ok(())
}
