use crate::error::ValidationError;
use crate::types::PageRange;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Exact set of pages selected by a page-range expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageSet {
    pages: BTreeSet<u32>,
    total_pages: u32,
}

impl PageSet {
    pub fn all(total_pages: u32) -> Self {
        Self {
            pages: (1..=total_pages).collect(),
            total_pages,
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn contains(&self, page: u32) -> bool {
        self.pages.contains(&page)
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.iter().collect()
    }

    /// Collapses the set into the fewest contiguous ranges, in page order.
    pub fn to_ranges(&self) -> Vec<PageRange> {
        let mut ranges = Vec::new();
        let mut current: Option<(u32, u32)> = None;

        for page in self.iter() {
            current = match current {
                Some((start, end)) if page == end + 1 => Some((start, page)),
                Some((start, end)) => {
                    ranges.push((start, end));
                    Some((page, page))
                }
                None => Some((page, page)),
            };
        }
        if let Some(last) = current {
            ranges.push(last);
        }

        ranges
            .into_iter()
            .filter_map(|(start, end)| PageRange::new(start, end, self.total_pages).ok())
            .collect()
    }
}

impl fmt::Display for PageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.to_ranges().iter().map(|r| r.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

pub struct PageRangeParser;

impl PageRangeParser {
    /// Parses expressions such as `"1,3,5-10"` or `"4-"` against a page count.
    ///
    /// Empty tokens between commas are skipped. An open-ended range runs to
    /// the last page.
    pub fn parse(expression: &str, total_pages: u32) -> Result<PageSet, ValidationError> {
        if total_pages == 0 {
            return Err(ValidationError::NoDocument);
        }

        let expression = expression.trim();
        if expression.is_empty() {
            return Err(ValidationError::EmptyRange);
        }

        let mut pages = BTreeSet::new();
        for token in expression.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let range = Self::parse_token(token, total_pages)?;
            pages.extend(range.pages());
        }

        if pages.is_empty() {
            return Err(ValidationError::EmptyRange);
        }

        debug!(
            "Parsed page range '{}' into {} pages of {}",
            expression,
            pages.len(),
            total_pages
        );

        Ok(PageSet { pages, total_pages })
    }

    pub fn is_valid(expression: &str, total_pages: u32) -> bool {
        Self::parse(expression, total_pages).is_ok()
    }

    fn parse_token(token: &str, total_pages: u32) -> Result<PageRange, ValidationError> {
        let invalid = || ValidationError::InvalidFormat {
            token: token.to_string(),
        };

        match token.split_once('-') {
            None => {
                let page = Self::parse_page(token, token, total_pages)?;
                PageRange::single(page, total_pages)
            }
            Some((_, rest)) if rest.contains('-') => Err(invalid()),
            Some((start, end)) => {
                if start.trim().is_empty() {
                    return Err(invalid());
                }
                let start = Self::parse_page(start, token, total_pages)?;
                let end = if end.trim().is_empty() {
                    total_pages
                } else {
                    Self::parse_page(end, token, total_pages)?
                };
                if start > end {
                    return Err(ValidationError::RangeOrder { start, end });
                }
                PageRange::new(start, end, total_pages)
            }
        }
    }

    fn parse_page(text: &str, token: &str, total_pages: u32) -> Result<u32, ValidationError> {
        let digits = text.trim();
        let value: i64 = match digits.parse() {
            Ok(value) => value,
            // a well-formed number too large for i64 is still just past the last page
            Err(_) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => i64::MAX,
            Err(_) => {
                return Err(ValidationError::InvalidFormat {
                    token: token.to_string(),
                })
            }
        };

        if value < 1 || value > total_pages as i64 {
            return Err(ValidationError::OutOfRange {
                page: value,
                total_pages,
            });
        }

        Ok(value as u32)
    }
}
