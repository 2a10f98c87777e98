//! Navigation query encoding.
//!
//! A highlight request travels as URL query parameters, in one of two shapes:
//!
//! - paged: `file=…&page=…&x=…&y=…&width=…&height=…`
//! - flowing: `file=…&text=…[&type=…]`
//!
//! Flowing text is capped at [`MAX_QUERY_TEXT_CHARS`] characters to keep URLs
//! bounded.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{BlockType, BoundingBox};
use crate::snippet::{Anchor, Citation};

pub const MAX_QUERY_TEXT_CHARS: usize = 1000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("missing query parameter: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("could not decode query parameter {name}: {reason}")]
    Decode { name: String, reason: String },

    #[error("query has neither text nor a page box")]
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum HighlightQuery {
    Paged {
        file: String,
        page: usize,
        bbox: BoundingBox,
    },
    Flowing {
        file: String,
        text: String,
        block_type: Option<BlockType>,
    },
}

impl HighlightQuery {
    /// Build a flowing query, truncating `text` to the character cap.
    pub fn flowing(file: impl Into<String>, text: &str, block_type: Option<BlockType>) -> Self {
        HighlightQuery::Flowing {
            file: file.into(),
            text: truncate_chars(text, MAX_QUERY_TEXT_CHARS),
            block_type,
        }
    }

    /// The query that navigates to `citation` inside `file`.
    pub fn for_citation(file: &str, citation: &Citation) -> Self {
        match citation.snippet.anchor() {
            Anchor::Paged { page, bbox } => HighlightQuery::Paged {
                file: file.to_string(),
                page: *page,
                bbox: *bbox,
            },
            Anchor::Flowing { .. } => {
                HighlightQuery::flowing(file, &citation.text, citation.snippet.block_type())
            }
        }
    }

    pub fn file(&self) -> &str {
        match self {
            HighlightQuery::Paged { file, .. } | HighlightQuery::Flowing { file, .. } => file,
        }
    }

    pub fn to_query_string(&self) -> String {
        match self {
            HighlightQuery::Paged { file, page, bbox } => format!(
                "file={}&page={}&x={}&y={}&width={}&height={}",
                urlencoding::encode(file),
                page,
                bbox.x,
                bbox.y,
                bbox.width,
                bbox.height
            ),
            HighlightQuery::Flowing {
                file,
                text,
                block_type,
            } => {
                let mut query = format!(
                    "file={}&text={}",
                    urlencoding::encode(file),
                    urlencoding::encode(&truncate_chars(text, MAX_QUERY_TEXT_CHARS))
                );
                if let Some(block_type) = block_type {
                    query.push_str("&type=");
                    query.push_str(block_type.as_str());
                }
                query
            }
        }
    }

    /// Decode either query shape.  A leading `?` is accepted.
    pub fn parse(query: &str) -> Result<Self, QueryError> {
        let params = decode_pairs(query.trim_start_matches('?'))?;
        Self::from_params(&params)
    }

    /// Decode from already-split parameters (e.g. an HTTP framework's query map).
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, QueryError> {
        let file = params
            .get("file")
            .filter(|f| !f.is_empty())
            .ok_or(QueryError::Missing("file"))?
            .clone();

        if let Some(text) = params.get("text").filter(|t| !t.trim().is_empty()) {
            let block_type = match params.get("type").filter(|t| !t.is_empty()) {
                Some(raw) => Some(BlockType::parse(raw).ok_or_else(|| QueryError::Invalid {
                    name: "type",
                    value: raw.clone(),
                })?),
                None => None,
            };
            return Ok(HighlightQuery::flowing(file, text, block_type));
        }

        if !params.contains_key("page") {
            return Err(QueryError::Ambiguous);
        }

        let page: usize = number(params, "page")?;
        if page == 0 {
            return Err(QueryError::Invalid {
                name: "page",
                value: "0".to_string(),
            });
        }

        Ok(HighlightQuery::Paged {
            file,
            page,
            bbox: BoundingBox::new(
                coordinate(params, "x")?,
                coordinate(params, "y")?,
                coordinate(params, "width")?,
                coordinate(params, "height")?,
            ),
        })
    }
}

fn number<T: std::str::FromStr>(
    params: &HashMap<String, String>,
    name: &'static str,
) -> Result<T, QueryError> {
    let raw = params.get(name).ok_or(QueryError::Missing(name))?;
    raw.trim().parse().map_err(|_| QueryError::Invalid {
        name,
        value: raw.clone(),
    })
}

/// A box coordinate; `NaN`, infinities and values that overflow `f32` are rejected.
fn coordinate(params: &HashMap<String, String>, name: &'static str) -> Result<f32, QueryError> {
    let value: f32 = number(params, name)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(QueryError::Invalid {
            name,
            value: params.get(name).cloned().unwrap_or_default(),
        })
    }
}

fn decode_pairs(query: &str) -> Result<HashMap<String, String>, QueryError> {
    let mut params = HashMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key, key)?;
        let value = decode_component(&key, value)?;
        params.insert(key, value);
    }
    Ok(params)
}

fn decode_component(name: &str, raw: &str) -> Result<String, QueryError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|e| QueryError::Decode {
            name: name.to_string(),
            reason: e.to_string(),
        })
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte, _)) => text[..byte].to_string(),
        None => text.to_string(),
    }
}
