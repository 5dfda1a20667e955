//! Page selection parsing.

use serde::{Deserialize, Serialize};

use super::error::JobConfigError;

/// Which pages of the input to translate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PageRange {
    #[default]
    #[serde(alias = "All")]
    All,
    #[serde(alias = "First")]
    First,
    #[serde(alias = "First 5 pages")]
    First5,
    /// Explicit list taken from `page_input`.
    #[serde(alias = "Range")]
    Range,
}

/// Resolve a page range into the engine's page list syntax (`1,3-5`).
///
/// `None` means every page.
pub fn resolve_pages(
    range: PageRange,
    page_input: Option<&str>,
) -> Result<Option<String>, JobConfigError> {
    match range {
        PageRange::All => Ok(None),
        PageRange::First => Ok(Some("1".to_string())),
        PageRange::First5 => Ok(Some("1,2,3,4,5".to_string())),
        PageRange::Range => {
            let input = page_input.map(str::trim).unwrap_or_default();
            if input.is_empty() {
                return Err(JobConfigError::InvalidPages {
                    input: String::new(),
                    reason: "page_input is required for a custom range".to_string(),
                });
            }
            parse_page_list(input).map(Some)
        }
    }
}

/// Validate and normalize a page list such as `1, 3-5,9`.
pub fn parse_page_list(input: &str) -> Result<String, JobConfigError> {
    let invalid = |reason: &str| JobConfigError::InvalidPages {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let mut parts = Vec::new();
    for raw in input.split(',') {
        let part = raw.trim();
        if part.is_empty() {
            return Err(invalid("empty entry"));
        }

        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_page(start.trim()).ok_or_else(|| invalid("bad range start"))?;
                let end = parse_page(end.trim()).ok_or_else(|| invalid("bad range end"))?;
                if start > end {
                    return Err(invalid("range start is after its end"));
                }
                parts.push(format!("{}-{}", start, end));
            }
            None => {
                let page = parse_page(part).ok_or_else(|| invalid("pages are numbered from 1"))?;
                parts.push(page.to_string());
            }
        }
    }

    Ok(parts.join(","))
}

fn parse_page(s: &str) -> Option<u32> {
    s.parse::<u32>().ok().filter(|p| *p >= 1)
}
