//! `chirpstream classify`: classify stream lines read from a file or stdin.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use chirpstream_core::{classify_line, ClassifiedEvent};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub events: usize,
    pub unclassified: usize,
}

#[derive(Serialize)]
struct Classified<'a> {
    line: usize,
    #[serde(flatten)]
    event: &'a ClassifiedEvent,
}

/// Write one JSON object per non-blank input line.
pub fn classify_lines(input: impl BufRead, mut out: impl Write) -> Result<Summary> {
    let mut summary = Summary::default();
    for (index, line) in input.lines().enumerate() {
        let line = line.context("reading input")?;
        if line.trim().is_empty() {
            continue;
        }
        let event = classify_line(&line);
        summary.events += 1;
        if event.is_unclassified() {
            summary.unclassified += 1;
        }
        serde_json::to_writer(&mut out, &Classified { line: index + 1, event: &event })?;
        writeln!(out)?;
    }
    Ok(summary)
}

pub fn run(file: Option<&Path>) -> Result<()> {
    let stdout = std::io::stdout();
    let summary = match file {
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("opening {}", path.display()))?;
            classify_lines(std::io::BufReader::new(file), stdout.lock())?
        }
        None => classify_lines(std::io::stdin().lock(), stdout.lock())?,
    };
    tracing::info!(events = summary.events, unclassified = summary.unclassified, "classified");
    Ok(())
}
