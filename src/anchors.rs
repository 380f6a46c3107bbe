//! Heading anchorization for HTML pages.
//!
//! Rewrites plain-text headings so each one links to itself:
//!
//! ```text
//! <h1>Gallery</h1>          → <h1><a href="">Gallery</a></h1>
//! <h2>What's new?</h2>      → <h2><a name="whats-new" href="#whats-new">What's new?</a></h2>
//! ```
//!
//! A heading that already carries an anchor wrapper has it replaced, so
//! running the pass twice gives the same page. Headings with nested markup
//! other than a single `<a>` are left alone.

use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<h([0-9])>(<a [^<]+>)?([^<]+)(</a>)?</h[0-9]>").expect("heading regex compiles")
});

#[derive(Error, Debug)]
pub enum AnchorError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result of an anchorization pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchorized {
    pub html: String,
    /// Every rewritten heading, in document order.
    pub headings: Vec<String>,
}

impl Anchorized {
    pub fn changed_from(&self, original: &str) -> bool {
        self.html != original
    }
}

/// Anchor slug for a heading text.
///
/// Lowercases, turns `_` into `-`, drops quotes, trims non-word characters at
/// both ends, then replaces each remaining non-word character with `-` and
/// collapses runs of dashes. Word characters are ASCII letters, digits and `_`.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase().replace('_', "-").replace(['"', '\''], "");
    let trimmed = lowered.trim_matches(|c: char| !is_word(c));

    let mut slug = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        let c = if is_word(c) { c } else { '-' };
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }
    slug
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Rewrite every matching heading in `html`.
pub fn anchorize(html: &str) -> Anchorized {
    let mut headings = Vec::new();
    let out = HEADING.replace_all(html, |caps: &Captures| {
        let level = &caps[1];
        let text = &caps[3];
        let heading = if level == "1" {
            format!(r#"<h1><a href="">{text}</a></h1>"#)
        } else {
            let slug = slugify(text);
            format!(r##"<h{level}><a name="{slug}" href="#{slug}">{text}</a></h{level}>"##)
        };
        headings.push(heading.clone());
        heading
    });
    Anchorized {
        html: out.into_owned(),
        headings,
    }
}

/// Anchorize a file in place. With `dry_run` the file is left untouched.
pub fn anchorize_file(path: &Path, dry_run: bool) -> Result<Anchorized, AnchorError> {
    let html = std::fs::read_to_string(path).map_err(|source| AnchorError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let result = anchorize(&html);
    if !dry_run && result.changed_from(&html) {
        std::fs::write(path, &result.html).map_err(|source| AnchorError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn slug_basic() {
        assert_eq!(slugify("Getting Started"), "getting-started");
    }

    #[test]
    fn slug_drops_quotes() {
        assert_eq!(slugify("What's new?"), "whats-new");
        assert_eq!(slugify(r#"The "best" shots"#), "the-best-shots");
    }

    #[test]
    fn slug_trims_and_collapses() {
        assert_eq!(slugify("  --Foo_Bar--  "), "foo-bar");
        assert_eq!(slugify("C++ & Rust"), "c-rust");
        assert_eq!(slugify("snake_case_name"), "snake-case-name");
    }

    #[test]
    fn slug_non_ascii_becomes_dash() {
        assert_eq!(slugify("Café au lait"), "caf-au-lait");
    }

    #[test]
    fn level_one_links_to_page() {
        let result = anchorize("<h1>Gallery</h1>");
        assert_eq!(result.html, r#"<h1><a href="">Gallery</a></h1>"#);
        assert_eq!(result.headings.len(), 1);
    }

    #[test]
    fn lower_levels_get_named_anchor() {
        let result = anchorize("<p>intro</p>\n<h3>Night Shots</h3>\n");
        assert_eq!(
            result.html,
            "<p>intro</p>\n<h3><a name=\"night-shots\" href=\"#night-shots\">Night Shots</a></h3>\n"
        );
    }

    #[test]
    fn existing_anchor_is_replaced() {
        let result = anchorize(r##"<h2><a name="old" href="#old">New Title</a></h2>"##);
        assert_eq!(
            result.html,
            r##"<h2><a name="new-title" href="#new-title">New Title</a></h2>"##
        );
    }

    #[test]
    fn second_pass_is_identity() {
        let page = "<h1>Gallery</h1><h2>Sea &amp; Sky</h2><h4>Notes_2024</h4>";
        let once = anchorize(page);
        let twice = anchorize(&once.html);
        assert_eq!(once.html, twice.html);
        assert_eq!(once.headings, twice.headings);
    }

    #[test]
    fn nested_markup_is_left_alone() {
        let page = "<h2>Title <em>emphasis</em></h2><p>body</p>";
        let result = anchorize(page);
        assert_eq!(result.html, page);
        assert!(result.headings.is_empty());
        assert!(!result.changed_from(page));
    }

    #[test]
    fn non_ascii_digit_levels_are_not_headings() {
        for page in [
            "<h\u{0661}>Title</h\u{0661}>",
            "<h\u{0663}>Title</h3>",
            "<h\u{FF12}>Title</h\u{FF12}>",
        ] {
            let result = anchorize(page);
            assert_eq!(result.html, page);
            assert!(result.headings.is_empty());
        }
    }

    #[test]
    fn headings_listed_in_document_order() {
        let result = anchorize("<h2>B</h2><h1>A</h1><h2>C</h2>");
        assert_eq!(
            result.headings,
            vec![
                r##"<h2><a name="b" href="#b">B</a></h2>"##.to_string(),
                r#"<h1><a href="">A</a></h1>"#.to_string(),
                r##"<h2><a name="c" href="#c">C</a></h2>"##.to_string(),
            ]
        );
    }

    #[test]
    fn file_rewritten_in_place() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.html");
        std::fs::write(&path, "<h2>Night Shots</h2>").unwrap();

        anchorize_file(&path, false).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            r##"<h2><a name="night-shots" href="#night-shots">Night Shots</a></h2>"##
        );
    }

    #[test]
    fn dry_run_leaves_file_untouched() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.html");
        std::fs::write(&path, "<h2>Night Shots</h2>").unwrap();

        let result = anchorize_file(&path, true).unwrap();

        assert_eq!(result.headings.len(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<h2>Night Shots</h2>");
    }

    #[test]
    fn missing_file_is_read_error() {
        let tmp = TempDir::new().unwrap();
        let result = anchorize_file(&tmp.path().join("missing.html"), false);
        assert!(matches!(result, Err(AnchorError::Read { .. })));
    }
}
