use crate::config::Config;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use redline_diff::{DiffKind, DiffOp, DiffResult};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// File with the original text
    pub original: PathBuf,

    /// File with the suggested text
    pub suggested: PathBuf,

    /// Show changed lines as whole blocks, without word detail
    #[arg(long)]
    pub blocks: bool,
}

pub fn diff(args: DiffArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    config.apply_color();

    let original = std::fs::read_to_string(&args.original)
        .with_context(|| format!("Cannot read {}", args.original.display()))?;
    let suggested = std::fs::read_to_string(&args.suggested)
        .with_context(|| format!("Cannot read {}", args.suggested.display()))?;

    let result = redline_diff::diff(&original, &suggested);
    print!("{}", render(&result, args.blocks));
    println!();
    print_summary(&result);

    Ok(())
}

pub fn print_summary(result: &DiffResult) {
    let stats = result.stats();
    if stats.has_changes() {
        println!(
            "{} {}",
            format!("+{} words", stats.added).green(),
            format!("-{} words", stats.removed).red()
        );
    } else {
        println!("{}", stats.change_summary().dimmed());
    }
}

/// Line-prefixed rendering: `  ` unchanged, `- ` removed, `+ ` added and
/// `~ ` for a modified line shown with inline `[-old-]{+new+}` markers.
pub fn render(result: &DiffResult, blocks: bool) -> String {
    let mut out = String::new();
    let mut ops = result.ops.iter().peekable();

    while let Some(op) = ops.next() {
        match (&op.words, op.kind) {
            (Some(words), DiffKind::Delete) if !blocks => {
                push_lines(&mut out, "~ ", &inline(words), str::to_string);
                if matches!(ops.peek(), Some(next) if next.kind == DiffKind::Insert) {
                    ops.next();
                }
            }
            (_, DiffKind::Equal) => push_lines(&mut out, "  ", &op.text, str::to_string),
            (_, DiffKind::Delete) => push_lines(&mut out, "- ", &op.text, |line| line.red().to_string()),
            (_, DiffKind::Insert) => push_lines(&mut out, "+ ", &op.text, |line| line.green().to_string()),
        }
    }

    out
}

fn inline(words: &[DiffOp]) -> String {
    words
        .iter()
        .map(|word| match word.kind {
            DiffKind::Equal => word.text.clone(),
            DiffKind::Delete => format!("[-{}-]", word.text).red().to_string(),
            DiffKind::Insert => format!("{{+{}+}}", word.text).green().to_string(),
        })
        .collect()
}

/// Each line is painted on its own so prefixes stay uncoloured and every
/// line carries its own reset.
fn push_lines(out: &mut String, prefix: &str, text: &str, paint: impl Fn(&str) -> String) {
    for line in text.lines() {
        out.push_str(prefix);
        out.push_str(&paint(line));
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_render_modify_pair_inline() {
        plain();
        let result = redline_diff::diff(
            "Intro\n25 cubic yards of concrete was poured\n",
            "Intro\n25 cubic yards of concrete were poured\n",
        );

        assert_eq!(
            render(&result, false),
            "  Intro\n~ 25 cubic yards of concrete [-was-]{+were+} poured\n"
        );
    }

    #[test]
    fn test_render_blocks() {
        plain();
        let result = redline_diff::diff("a was\n", "a were\n");

        assert_eq!(render(&result, true), "- a was\n+ a were\n");
    }

    #[test]
    fn test_push_lines_paints_each_line() {
        let mut out = String::new();
        push_lines(&mut out, "- ", "first\nsecond\n", |line| format!("<{}>", line));

        assert_eq!(out, "- <first>\n- <second>\n");
    }

    #[test]
    fn test_render_pure_deletion() {
        plain();
        let result = redline_diff::diff("foundation appears sound", "");

        assert_eq!(render(&result, false), "- foundation appears sound\n");
    }
}
