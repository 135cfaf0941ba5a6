//! Plain-text campaign body → inline-styled HTML email.
//!
//! Understands a tiny subset of markdown: blank-line paragraphs, `- `
//! bullets, whole-line `**Heading**`, and inline `**bold**`.

use std::sync::LazyLock;

use regex::Regex;

static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static SOLO_HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\*\*[^*]+\*\*$").unwrap());

const PARA_STYLE: &str = r#"style="margin:0 0 14px 0;font-size:15px;line-height:1.6;color:#222;""#;
const LI_STYLE: &str = r#"style="margin-bottom:7px;font-size:15px;line-height:1.6;color:#222;""#;
const UL_STYLE: &str = r#"style="margin:0 0 28px 20px;padding-left:0;""#;
const HEADING_STYLE: &str = r#"style="margin:20px 0 8px 0;font-size:15px;font-weight:700;color:#111;""#;

/// Escape text for HTML element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

fn inline(line: &str) -> String {
    BOLD.replace_all(&escape(line), "<strong>$1</strong>").into_owned()
}

/// Render the body blocks (paragraphs, lists, headings) without the
/// surrounding document.
pub fn body_blocks(text: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut para: Vec<String> = Vec::new();
    let mut bullets: Vec<String> = Vec::new();

    let flush_para = |para: &mut Vec<String>, blocks: &mut Vec<String>| {
        if !para.is_empty() {
            blocks.push(format!("<p {PARA_STYLE}>{}</p>", para.join("<br>")));
            para.clear();
        }
    };
    let flush_bullets = |bullets: &mut Vec<String>, blocks: &mut Vec<String>| {
        if !bullets.is_empty() {
            let items: String = bullets
                .iter()
                .map(|item| format!("<li {LI_STYLE}>{item}</li>"))
                .collect();
            blocks.push(format!("<ul {UL_STYLE}>{items}</ul>"));
            bullets.clear();
        }
    };

    for line in text.lines() {
        let stripped = line.trim();
        if let Some(item) = line.strip_prefix("- ") {
            flush_para(&mut para, &mut blocks);
            bullets.push(inline(item));
        } else if !stripped.is_empty() && SOLO_HEADING.is_match(stripped) {
            flush_para(&mut para, &mut blocks);
            flush_bullets(&mut bullets, &mut blocks);
            let heading = &stripped[2..stripped.len() - 2];
            blocks.push(format!("<p {HEADING_STYLE}>{}</p>", escape(heading)));
        } else if !stripped.is_empty() {
            flush_bullets(&mut bullets, &mut blocks);
            para.push(inline(line));
        } else {
            flush_para(&mut para, &mut blocks);
            flush_bullets(&mut bullets, &mut blocks);
        }
    }
    flush_para(&mut para, &mut blocks);
    flush_bullets(&mut bullets, &mut blocks);

    blocks.join("\n")
}

/// Full HTML document for `text`, with an optional raw HTML signature.
pub fn to_html(text: &str, signature: Option<&str>) -> String {
    let body = body_blocks(text);
    let signature = signature
        .map(|s| format!("<br>\n{}", s.trim()))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width,initial-scale=1">
</head>
<body style="margin:0;padding:0;background:#ffffff;">
  <table width="100%" cellpadding="0" cellspacing="0" border="0" style="background:#ffffff;">
    <tr>
      <td align="center">
        <table width="600" cellpadding="0" cellspacing="0" border="0"
               style="max-width:600px;width:100%;padding:30px 24px;font-family:Arial,sans-serif;font-size:15px;line-height:1.6;color:#222;">
          <tr>
            <td>
{body}
{signature}
            </td>
          </tr>
        </table>
      </td>
    </tr>
  </table>
</body>
</html>"#
    )
}
