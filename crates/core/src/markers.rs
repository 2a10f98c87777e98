//! List-marker detection shared by the line grouper and the classifier.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{DocumentFormat, ListType};

static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        "^[\u{2022}\u{2023}\u{2043}\u{2219}\u{25AA}\u{25AB}\u{25A0}\u{25A1}\u{25C6}\u{25CB}\u{25CF}\u{25E6}\u{27A2}\u{2794}\u{F0B7}]",
    )
    .expect("bullet pattern is valid")
});

static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[.)](?:\s|$)").expect("numbered pattern is valid"));

static LETTERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][.)](?:\s|$)").expect("lettered pattern is valid"));

static ROMAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^m{0,3}(?:cm|cd|d?c{0,3})(?:xc|xl|l?x{0,3})(?:ix|iv|v?i{0,3})\.(?:\s|$)")
        .expect("roman pattern is valid")
});

static DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*+](?:\s|$)").expect("dash pattern is valid"));

/// Return the list marker `text` starts with, if any.
///
/// Dash-style markers (`-`, `*`, `+`) only count for flowing input; in paged
/// input a leading hyphen is far more often a wrapped word or a minus sign.
pub fn detect_list_marker(text: &str, format: DocumentFormat) -> Option<ListType> {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return None;
    }

    if BULLET.is_match(trimmed) {
        return Some(ListType::Bullet);
    }
    if NUMBERED.is_match(trimmed) {
        return Some(ListType::Numbered);
    }
    if LETTERED.is_match(trimmed) {
        return Some(ListType::Lettered);
    }
    // The roman pattern also accepts a bare "." since every group is optional.
    if !trimmed.starts_with('.') && ROMAN.is_match(trimmed) {
        return Some(ListType::Roman);
    }
    if format == DocumentFormat::Flowing && DASH.is_match(trimmed) {
        return Some(ListType::Dash);
    }

    None
}
