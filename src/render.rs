// src/render.rs
//! Minimal HTML results page. All provider text is escaped before it reaches markup.

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::aggregate::types::{CanonicalListing, ProviderQueryStat};

const DESCRIPTION_PREVIEW_CHARS: usize = 100;
const PAGE_TITLE: &str = "Find government data";

fn preview(description: &str) -> String {
    let mut chars = description.chars();
    let head: String = chars.by_ref().take(DESCRIPTION_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

fn render_listing(out: &mut String, l: &CanonicalListing) {
    out.push_str("<li class=\"result\">\n");
    out.push_str(&format!(
        "  <h3><a href=\"{}\">{}</a></h3>\n",
        encode_double_quoted_attribute(&l.url),
        encode_text(&l.title)
    ));
    if !l.provider.title.is_empty() {
        out.push_str(&format!(
            "  <p class=\"organisation\">{}</p>\n",
            encode_text(&l.provider.title)
        ));
    }
    out.push_str(&format!(
        "  <strong class=\"tag\">{}</strong>\n",
        encode_text(&l.source)
    ));
    if !l.subtitle.is_empty() {
        out.push_str(&format!(
            "  <p class=\"subtitle\">{}</p>\n",
            encode_text(&l.subtitle)
        ));
    }
    if !l.description.is_empty() {
        out.push_str(&format!(
            "  <p class=\"description\">{}</p>\n",
            encode_text(&preview(&l.description))
        ));
    }
    out.push_str(&format!(
        "  <p class=\"updated\">Last Updated: {}</p>\n",
        encode_text(&l.updated)
    ));
    out.push_str("</li>\n");
}

fn render_stats(out: &mut String, stats: &[ProviderQueryStat]) {
    if stats.is_empty() {
        return;
    }
    out.push_str("<details class=\"stats\"><summary>Provider timings</summary>\n<ul>\n");
    for s in stats {
        out.push_str(&format!(
            "<li><strong>{}</strong>: {}ms, {} results",
            encode_text(&s.source),
            s.duration_ms,
            s.result_count
        ));
        if let Some(err) = &s.error {
            out.push_str(&format!(" <span class=\"error\">{}</span>", encode_text(err)));
        }
        out.push_str("</li>\n");
    }
    out.push_str("</ul>\n</details>\n");
}

/// Render the results page for one query.
pub fn render_page(
    query: &str,
    results: &[CanonicalListing],
    stats: &[ProviderQueryStat],
) -> String {
    let mut out = String::with_capacity(4096 + results.len() * 512);
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>{PAGE_TITLE}</title>\n</head>\n<body>\n"));
    out.push_str(&format!("<h1>{PAGE_TITLE}</h1>\n"));
    out.push_str(&format!(
        "<form method=\"get\" action=\"/\"><input name=\"search\" type=\"text\" value=\"{}\" placeholder=\"search for something\"><button type=\"submit\">Search</button></form>\n",
        encode_double_quoted_attribute(query)
    ));

    if query.trim().is_empty() {
        out.push_str("<p class=\"empty\">search for something</p>\n");
    } else {
        render_stats(&mut out, stats);
        out.push_str(&format!("<h2>{} results</h2>\n<ul class=\"results\">\n", results.len()));
        for l in results {
            render_listing(&mut out, l);
        }
        out.push_str("</ul>\n");
    }

    out.push_str("</body>\n</html>\n");
    out
}
