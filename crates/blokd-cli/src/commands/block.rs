/// Block-list management commands
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tabled::{Table, Tabled};

use blokd_core::BlockList;
use blokd_storage::Database;

#[derive(Tabled)]
struct BlockedRow {
    #[tabled(rename = "Package")]
    package: String,
}

fn open_block_list() -> Result<BlockList> {
    let database = Arc::new(Database::new(None)?);
    BlockList::new(database)
}

pub fn add(package: &str) -> Result<()> {
    let list = open_block_list()?;
    list.add(package)?;
    println!("Blocked {package}");
    Ok(())
}

pub fn remove(package: &str) -> Result<()> {
    let list = open_block_list()?;
    if list.remove(package)? {
        println!("Unblocked {package}");
    } else {
        println!("{package} was not on the block-list");
    }
    Ok(())
}

pub fn list() -> Result<()> {
    let list = open_block_list()?;
    let mut packages: Vec<String> = list.snapshot().into_iter().collect();
    packages.sort();

    if packages.is_empty() {
        println!("The block-list is empty.");
        return Ok(());
    }

    let rows: Vec<BlockedRow> = packages
        .into_iter()
        .map(|package| BlockedRow { package })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}

pub fn clear() -> Result<()> {
    let list = open_block_list()?;
    let cleared = list.clear()?;
    println!("Removed {cleared} package(s) from the block-list.");
    Ok(())
}

pub fn import(path: &Path) -> Result<()> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let packages: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect();

    if packages.is_empty() {
        println!("No packages found in {}.", path.display());
        return Ok(());
    }

    let list = open_block_list()?;
    list.add_all(&packages)?;
    println!("Imported {} package(s).", packages.len());
    Ok(())
}
