//! `plu extract`: ask the height and footprint questions for each zone and
//! store one fact record per zone.
//!
//! Records are staged and committed as one batch once every zone has been
//! answered, so a failing zone leaves the table untouched.

use anyhow::{Context, Result};
use plu_extract_core::facts::{FactRecord, ZoneKey};
use std::path::PathBuf;
use tracing::info;

use crate::config::Config;
use crate::pipeline;
use crate::repository::FactRepository;

/// Arguments of `plu extract`.
#[derive(Debug, Clone)]
pub struct ExtractArgs {
    pub document: PathBuf,
    pub territoire: String,
    pub codcom: String,
    pub annee: i32,
    pub section: String,
    pub zones: Vec<String>,
    pub dry_run: bool,
}

impl ExtractArgs {
    /// One key per zone, validated before any document work starts.
    pub fn zone_keys(&self) -> Result<Vec<ZoneKey>> {
        if self.zones.is_empty() {
            anyhow::bail!("at least one --zone is required");
        }
        self.zones
            .iter()
            .map(|zone| -> Result<ZoneKey> {
                let key = ZoneKey {
                    territoire: self.territoire.clone(),
                    codcom: self.codcom.clone(),
                    annee: self.annee,
                    zone: zone.clone(),
                    section: self.section.clone(),
                };
                FactRecord::new(&key, None, None).validate()?;
                Ok(key)
            })
            .collect()
    }
}

pub async fn run_extract(config: &Config, args: &ExtractArgs) -> Result<()> {
    let keys = args.zone_keys()?;

    let mut session = pipeline::build_session(config)?;
    let report = pipeline::ingest_path(&mut session, &args.document).await?;
    println!("ingested {}: {} chunks", report.source, report.chunks);

    let mut records = Vec::with_capacity(keys.len());
    for key in &keys {
        let hauteur = session.ask(&config.questions.hauteur_for(&key.zone)).await?;
        let emprise = session.ask(&config.questions.emprise_for(&key.zone)).await?;
        let record =
            FactRecord::from_answers(key, &hauteur, &emprise, config.facts.on_malformed)
                .with_context(|| format!("zone {}", key.zone))?;

        println!(
            "zone {:<2} section {}: hauteur={} emprise={}",
            record.zone,
            record.section,
            format_measure(record.hauteur),
            format_measure(record.emprise)
        );
        records.push(record);
    }
    session.clear();

    if args.dry_run {
        println!("dry run: {} records not written", records.len());
        return Ok(());
    }

    let mut repository =
        FactRepository::open(&config.db.path, config.facts.insert_mode).await?;
    for record in records {
        repository.stage(record);
    }
    let written = repository.commit_and_close().await?;
    info!(records = written, "extraction committed");
    println!("committed {} records", written);

    Ok(())
}

pub fn format_measure(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(zones: &[&str]) -> ExtractArgs {
        ExtractArgs {
            document: PathBuf::from("plu_0.pdf"),
            territoire: "T01".to_string(),
            codcom: "33063".to_string(),
            annee: 2024,
            section: "UA".to_string(),
            zones: zones.iter().map(|z| z.to_string()).collect(),
            dry_run: true,
        }
    }

    #[test]
    fn test_zone_keys() {
        let keys = args(&["U1", "U2"]).zone_keys().unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1].zone, "U2");
        assert_eq!(keys[1].codcom, "33063");
    }

    #[test]
    fn test_zone_keys_rejects_bad_input_early() {
        assert!(args(&[]).zone_keys().is_err());
        assert!(args(&["U1a"]).zone_keys().is_err());
        let mut bad_codcom = args(&["U1"]);
        bad_codcom.codcom = "3306300".to_string();
        assert!(bad_codcom.zone_keys().is_err());
    }

    #[test]
    fn test_format_measure() {
        assert_eq!(format_measure(Some(9.0)), "9.00");
        assert_eq!(format_measure(None), "unknown");
    }
}
