//! Helpers for the site's table-based listing pages
//!
//! Both the board directory and the thread lists put their rows in the first
//! `<table>` under the first `<center>` element, with a header row on top.

use crate::MirrorError;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// The text the site uses for its "next page" link
pub const NEXT_PAGE_TEXT: &str = "下一页";

pub(crate) fn selector(css: &'static str) -> Result<Selector, MirrorError> {
    Selector::parse(css).map_err(|e| MirrorError::Markup {
        url: String::new(),
        message: format!("Invalid selector {:?}: {:?}", css, e),
    })
}

fn markup_error(url: &Url, message: &str) -> MirrorError {
    MirrorError::Markup {
        url: url.to_string(),
        message: message.to_string(),
    }
}

/// Gets the first `<center>` element of the page
pub(crate) fn center<'a>(html: &'a Html, url: &Url) -> Result<ElementRef<'a>, MirrorError> {
    html.select(&selector("center")?)
        .next()
        .ok_or_else(|| markup_error(url, "page has no <center> element"))
}

/// Gets the data rows of the listing table, header row excluded
pub(crate) fn listing_rows<'a>(
    html: &'a Html,
    url: &Url,
) -> Result<Vec<ElementRef<'a>>, MirrorError> {
    let table = center(html, url)?
        .select(&selector("table")?)
        .next()
        .ok_or_else(|| markup_error(url, "listing table not found"))?;

    Ok(table.select(&selector("tr")?).skip(1).collect())
}

/// Gets the `<td>` cells of a row
pub(crate) fn cells<'a>(row: ElementRef<'a>) -> Result<Vec<ElementRef<'a>>, MirrorError> {
    Ok(row.select(&selector("td")?).collect())
}

/// Concatenated text of an element, untrimmed
pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Whether the listing area links to a further page
pub(crate) fn has_next_page(html: &Html, url: &Url) -> Result<bool, MirrorError> {
    let link = selector("a")?;
    Ok(center(html, url)?
        .select(&link)
        .any(|a| text_of(a).trim() == NEXT_PAGE_TEXT))
}

/// Removes `front` characters from the start and `back` from the end
///
/// Counts characters, not bytes. Text too short for both cuts becomes empty.
pub fn drop_chars(text: &str, front: usize, back: usize) -> String {
    let count = text.chars().count();
    if front + back >= count {
        return String::new();
    }

    text.chars().skip(front).take(count - front - back).collect()
}
