use chrono::NaiveDate;
use quick_xml::escape::escape;
use std::fmt::Write;

use crate::digest::{Digest, QualifyingFeed};
use crate::feed::RawItem;
use crate::util::{html_to_plain, strip_control_chars, truncate_to_width};

/// Maximum display width of an item summary preview.
pub const SUMMARY_WIDTH: usize = 280;

const UNTITLED: &str = "Untitled";

/// Formats a date the way the digest header shows it, e.g. `Sat Oct 17 2026`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%a %b %d %Y").to_string()
}

/// The feed's own title, else the one from the subscription list, else the URL.
fn feed_heading(feed: &QualifyingFeed) -> String {
    let source = feed.source();
    let title = feed
        .title()
        .or_else(|| source.title())
        .unwrap_or_else(|| source.as_str());
    strip_control_chars(title).into_owned()
}

fn item_title(item: &RawItem) -> String {
    let title = item.title.as_deref().unwrap_or(UNTITLED);
    strip_control_chars(title).into_owned()
}

fn item_preview(item: &RawItem) -> Option<String> {
    let plain = html_to_plain(item.summary.as_deref()?);
    if plain.is_empty() {
        return None;
    }
    Some(truncate_to_width(&plain, SUMMARY_WIDTH).into_owned())
}

fn summary_line(digest: &Digest) -> String {
    let items = digest.item_count();
    let feeds = digest.len();
    format!(
        "{} {} from {} {}",
        items,
        if items == 1 { "post" } else { "posts" },
        feeds,
        if feeds == 1 { "feed" } else { "feeds" },
    )
}

/// Renders the plain-text body.
pub fn render_text(digest: &Digest, today: NaiveDate) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = writeln!(out, "Letter for {}", format_date(today));
    let _ = writeln!(out, "Yesterday's readings: {}", summary_line(digest));

    for feed in digest {
        let _ = writeln!(out);
        let _ = writeln!(out, "== {} ==", feed_heading(feed));
        if let Some(link) = feed.link() {
            let _ = writeln!(out, "{}", strip_control_chars(link));
        }

        for item in feed.items() {
            let _ = writeln!(out);
            let _ = writeln!(out, "* {}", item_title(item));
            if let Some(link) = &item.link {
                let _ = writeln!(out, "  {}", strip_control_chars(link));
            }
            if let Some(preview) = item_preview(item) {
                let _ = writeln!(out, "  {}", preview);
            }
        }
    }

    out
}

/// Renders the HTML body. All feed-supplied text is escaped.
pub fn render_html(digest: &Digest, today: NaiveDate) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Letter for {date}</title></head>\n\
         <body style=\"font-family: Georgia, serif; max-width: 40em; margin: auto;\">\n\
         <h1>Letter for {date}</h1>\n<p>Yesterday's readings: {summary}</p>\n",
        date = format_date(today),
        summary = summary_line(digest),
    );

    for feed in digest {
        let heading = feed_heading(feed);
        match feed.link() {
            Some(link) => {
                let _ = writeln!(
                    out,
                    "<h2><a href=\"{}\">{}</a></h2>",
                    escape(link),
                    escape(&heading)
                );
            }
            None => {
                let _ = writeln!(out, "<h2>{}</h2>", escape(&heading));
            }
        }

        out.push_str("<ul>\n");
        for item in feed.items() {
            let title = item_title(item);
            out.push_str("<li>");
            match &item.link {
                Some(link) => {
                    let _ = write!(out, "<a href=\"{}\">{}</a>", escape(link), escape(&title));
                }
                None => out.push_str(&escape(&title)),
            }
            if let Some(preview) = item_preview(item) {
                let _ = write!(out, "<br><small>{}</small>", escape(&preview));
            }
            out.push_str("</li>\n");
        }
        out.push_str("</ul>\n");
    }

    out.push_str("</body>\n</html>\n");
    out
}
