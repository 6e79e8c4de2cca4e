//! Markdown rendering for subsection trees.
//!
//! The rendered form is what reviewers and the generation model see for a
//! structured section:
//!
//! ```text
//! ### Foundation
//! Poured on site.
//! - No cracking observed
//!   ![North wall](img-1)
//!
//! ### Framing
//! In progress.
//! ```
//!
//! [`parse_tree`] reads the same shape back so a full-section rewrite of a
//! structured section stays structured.

use crate::report::{ImageRef, PointItem, SubSection};

const HEADING: &str = "### ";
const BULLET: &str = "- ";

pub fn render_tree(subs: &[SubSection]) -> String {
    let mut blocks = Vec::with_capacity(subs.len());

    for sub in subs {
        let mut block = format!("{}{}", HEADING, sub.title);
        if !sub.description.is_empty() {
            block.push('\n');
            block.push_str(&sub.description);
        }
        for item in &sub.children {
            block.push('\n');
            block.push_str(BULLET);
            block.push_str(&item.point);
            for image in &item.images {
                block.push_str(&format!("\n  ![{}]({})", image.caption, image.id));
            }
        }
        blocks.push(block);
    }

    blocks.join("\n\n")
}

/// Parse rendered markdown back into subsections.
///
/// Returns `None` when the text does not open with a `### ` heading, since
/// anything before the first heading has nowhere to live in the tree.
pub fn parse_tree(markdown: &str) -> Option<Vec<SubSection>> {
    let mut subs: Vec<SubSection> = Vec::new();
    let mut description: Vec<&str> = Vec::new();

    for line in markdown.lines() {
        if let Some(title) = line.strip_prefix(HEADING) {
            if let Some(last) = subs.last_mut() {
                last.description = join_description(&description);
            }
            description.clear();
            subs.push(SubSection::new(title.trim(), ""));
            continue;
        }

        let current = match subs.last_mut() {
            Some(current) => current,
            None if line.trim().is_empty() => continue,
            None => return None,
        };

        if let Some(point) = line.strip_prefix(BULLET) {
            current.children.push(PointItem::new(point));
        } else if let (Some(image), Some(item)) = (parse_image(line), current.children.last_mut()) {
            item.images.push(image);
        } else if current.children.is_empty() {
            description.push(line);
        } else if !line.trim().is_empty() {
            // Text after the points continues the last point
            if let Some(item) = current.children.last_mut() {
                item.point.push('\n');
                item.point.push_str(line);
            }
        }
    }

    let last = subs.last_mut()?;
    last.description = join_description(&description);
    Some(subs)
}

fn join_description(lines: &[&str]) -> String {
    lines.join("\n").trim_matches('\n').to_string()
}

fn parse_image(line: &str) -> Option<ImageRef> {
    let rest = line.trim().strip_prefix("![")?;
    let (caption, rest) = rest.split_once("](")?;
    let id = rest.strip_suffix(')')?;

    Some(ImageRef {
        id: id.to_string(),
        caption: caption.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<SubSection> {
        vec![
            SubSection::new("Foundation", "Poured on site.\nCured 7 days.")
                .with_point(PointItem::new("No cracking observed").with_image("img-1", "North wall"))
                .with_point(PointItem::new("Forms removed")),
            SubSection::new("Framing", ""),
            SubSection::new("Roofing", "Not started."),
        ]
    }

    #[test]
    fn test_render_tree_layout() {
        let rendered = render_tree(&sample()[..1]);

        assert_eq!(
            rendered,
            "### Foundation\nPoured on site.\nCured 7 days.\n- No cracking observed\n  ![North wall](img-1)\n- Forms removed"
        );
    }

    #[test]
    fn test_parse_inverts_render() {
        let subs = sample();
        let parsed = parse_tree(&render_tree(&subs)).unwrap();

        assert_eq!(parsed, subs);
    }

    #[test]
    fn test_parse_rejects_text_before_first_heading() {
        assert!(parse_tree("Intro line\n### Foundation\nText").is_none());
        assert!(parse_tree("plain paragraph").is_none());
    }

    #[test]
    fn test_parse_skips_leading_blank_lines() {
        let parsed = parse_tree("\n\n### Site\nClear.").unwrap();

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].description, "Clear.");
    }

    #[test]
    fn test_parse_keeps_image_on_rewritten_point() {
        let parsed = parse_tree("### Foundation\n- Minor hairline cracking\n  ![North wall](img-1)").unwrap();

        assert_eq!(parsed[0].children[0].point, "Minor hairline cracking");
        assert_eq!(parsed[0].children[0].images[0].id, "img-1");
    }
}
