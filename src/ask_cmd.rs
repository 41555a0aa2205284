//! `plu ask`: ingest one document and answer questions about it.
//!
//! With `--query` a single question is answered. Otherwise questions are read
//! from stdin, one per line, until `exit` or end of input. The session is
//! cleared before returning either way.

use anyhow::Result;
use plu_extract_core::models::Answer;
use plu_extract_core::ExtractionSession;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::config::Config;
use crate::pipeline;

const PROMPT: &str = "Posez une question (ou tapez 'exit' pour quitter) : ";

pub async fn run_ask(config: &Config, document: &Path, query: Option<String>) -> Result<()> {
    let mut session = pipeline::build_session(config)?;

    println!("Ingestion du document...");
    let report = pipeline::ingest_path(&mut session, document).await?;
    println!(
        "Ingestion terminée : {} segments, {} chunks ({}, {} dims).",
        report.segments, report.chunks, report.model, report.dims
    );

    let outcome = match query {
        Some(q) => ask_once(&mut session, &q).await,
        None => repl(&mut session).await,
    };

    session.clear();
    println!("Mémoire nettoyée.");
    outcome
}

async fn ask_once(session: &mut ExtractionSession, query: &str) -> Result<()> {
    let answer = session.ask(query).await?;
    print_answer(&answer);
    Ok(())
}

async fn repl(session: &mut ExtractionSession) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", PROMPT);
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let query = line.trim();
        if query.eq_ignore_ascii_case("exit") {
            println!("Fin de l'interaction.");
            break;
        }
        if query.is_empty() {
            continue;
        }

        match session.ask(query).await {
            Ok(answer) => print_answer(&answer),
            Err(e) if e.is_capability_failure() => eprintln!("Erreur : {}", e),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn print_answer(answer: &Answer) {
    match answer.context.best() {
        Some(best) => debug!(
            score = best.score,
            page = ?best.chunk.page,
            chunk = best.chunk.chunk_index,
            "answer grounded on chunk"
        ),
        None => info!("no chunk cleared the relevance threshold"),
    }
    println!("Réponse : {}", answer.text.trim());
}
