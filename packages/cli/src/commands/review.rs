use crate::commands::diff::{print_summary, render};
use crate::config::Config;
use crate::replay::{DocumentFileStore, ReplayGeneration};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use redline_common::{Document, SectionId, TextPath};
use redline_editor::{EditOrigin, Instruction, Locator, RevisionSession, SessionEvent};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct ReviewArgs {
    /// Report document (JSON)
    pub document: PathBuf,

    /// Section to revise
    #[arg(short, long)]
    pub section: String,

    /// File holding the suggested replacement text
    #[arg(long)]
    pub suggestion: PathBuf,

    /// Instruction sent along with the request
    #[arg(short, long, default_value = "Revise")]
    pub instruction: String,

    /// Byte range START..END to revise instead of the whole section
    #[arg(long, value_parser = parse_range, conflicts_with = "highlight")]
    pub range: Option<(usize, usize)>,

    /// Field the range applies to (body, desc:N, point:N:M)
    #[arg(long, default_value = "body")]
    pub field: TextPath,

    /// Replace the first occurrence of this text
    #[arg(long)]
    pub highlight: Option<String>,

    /// Apply the proposal and save it back to the document
    #[arg(long)]
    pub accept: bool,
}

pub async fn review(args: ReviewArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    config.apply_color();

    let doc = Document::load(&args.document)
        .with_context(|| format!("Cannot load {}", args.document.display()))?;
    let suggestion = std::fs::read_to_string(&args.suggestion)
        .with_context(|| format!("Cannot read {}", args.suggestion.display()))?;

    let origin = origin(&args);
    let generator = ReplayGeneration::new(suggestion, config.chunk_size)
        .with_rationale(format!("Replayed from {}", args.suggestion.display()));
    let store = DocumentFileStore::new(args.document.clone());

    println!("📝 {} {}", "Reviewing".green().bold(), args.document.display());
    println!("   Section: {}", args.section);
    println!("   Target:  {}", origin.kind());
    println!();

    let mut session = RevisionSession::new(doc, Arc::new(generator), Arc::new(store), &config.engine);
    let mut events = session.subscribe();

    session.trigger(origin, &Instruction::new("cli", &args.instruction))?;
    session.settle().await;

    let mut updates = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::Failed(err) => return Err(err.into()),
            SessionEvent::ProposalChanged(Some(_)) => updates += 1,
            _ => {}
        }
    }

    let Some(diff) = session.diff() else {
        anyhow::bail!("Generation produced no proposal");
    };
    if let Some(proposal) = session.proposal() {
        println!("   {} ({} updates)", proposal.id, updates);
        if !proposal.rationale.is_empty() {
            println!("   Rationale: {}", proposal.rationale.dimmed());
        }
        println!();
    }

    print!("{}", render(&diff, false));
    println!();
    print_summary(&diff);

    if !args.accept {
        println!();
        println!("   Run with {} to apply", "--accept".bold());
        return Ok(());
    }

    let accepted = session.accept()?;
    let saved = session.flush().await;

    println!();
    println!(
        "   {} Applied {} to section {} ({} section(s) saved)",
        "✓".green(),
        accepted.id,
        accepted.origin.section_id(),
        saved
    );

    Ok(())
}

fn origin(args: &ReviewArgs) -> EditOrigin {
    let section_id = SectionId::new(&args.section);

    match (&args.highlight, args.range) {
        (Some(text), _) => EditOrigin::HighlightEdit {
            section_id,
            highlighted_text: text.clone(),
        },
        (None, Some((start, end))) => EditOrigin::RangeEdit {
            section_id,
            locator: Locator::new(args.field, start, end),
        },
        (None, None) => EditOrigin::FullSectionRewrite { section_id },
    }
}

fn parse_range(raw: &str) -> Result<(usize, usize), String> {
    let (start, end) = raw
        .split_once("..")
        .ok_or_else(|| format!("expected START..END, got '{}'", raw))?;

    let start: usize = start.trim().parse().map_err(|_| format!("invalid start '{}'", start))?;
    let end: usize = end.trim().parse().map_err(|_| format!("invalid end '{}'", end))?;

    if start > end {
        return Err(format!("range start {} is after end {}", start, end));
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("4..9"), Ok((4, 9)));
        assert!(parse_range("9..4").is_err());
        assert!(parse_range("4-9").is_err());
        assert!(parse_range("a..9").is_err());
    }
}
