use crate::categorizer::{classify_transactions, reclassify_all, Scope};
use crate::error::Result;

use super::open_db;

pub fn run(all: bool) -> Result<()> {
    let conn = open_db()?;
    let tx = conn.unchecked_transaction()?;
    let result = if all {
        reclassify_all(&tx)?
    } else {
        classify_transactions(&tx, Scope::Unclassified)?
    };
    tx.commit()?;
    println!(
        "{} classified, {} still unclassified",
        result.classified, result.unclassified
    );
    Ok(())
}
