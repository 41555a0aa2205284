//! `plu facts`: list stored fact records.

use anyhow::Result;

use crate::config::Config;
use crate::extract_cmd::format_measure;
use crate::repository::{FactFilter, FactRepository};

pub async fn run_facts(config: &Config, filter: &FactFilter) -> Result<()> {
    let mut repository =
        FactRepository::open(&config.db.path, config.facts.insert_mode).await?;
    let facts = repository.list(filter).await?;
    repository.close().await?;

    if facts.is_empty() {
        println!("No facts stored.");
        return Ok(());
    }

    println!(
        "{:<10} {:<6} {:<5} {:<4} {:<10} {:>8} {:>8}  UPDATED",
        "TERRITOIRE", "CODCOM", "ANNEE", "ZONE", "SECTION", "HAUTEUR", "EMPRISE"
    );
    for fact in &facts {
        println!(
            "{:<10} {:<6} {:<5} {:<4} {:<10} {:>8} {:>8}  {}",
            fact.idterritoire,
            fact.codcom,
            fact.annee,
            fact.zone,
            fact.section,
            format_measure(fact.hauteur),
            format_measure(fact.emprise),
            fact.updated_at
        );
    }
    println!("{} facts", facts.len());
    Ok(())
}
