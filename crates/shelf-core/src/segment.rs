//! Text segmentation
//!
//! Splits a decoded book into chapters for table-of-contents navigation.
//!
//! A chapter starts at a heading line: `第…章` style CJK headings (numeral
//! followed by 章/回/卷/集/部) or `Chapter N` / `Section N`, optionally
//! indented. Text before the first heading becomes a preamble chapter.
//! Books without headings are cut into fixed-size pages instead.
//!
//! Anchors come from positions (`chapter-0`, `ch-N`, `p-N`), never from
//! titles, so repeated headings still get distinct anchors.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::{ReaderConfig, DEFAULT_PAGE_SIZE};
use crate::models::Chapter;

const HEADING_PATTERN: &str = r"(?m)^[ \t\x{3000}]*(?:第[0-9一二三四五六七八九十百千]+[章回卷集部]|Chapter[ \t]?\d+|Section[ \t]?\d+)";

fn heading_regex() -> &'static Regex {
    static HEADING: OnceLock<Regex> = OnceLock::new();
    HEADING.get_or_init(|| Regex::new(HEADING_PATTERN).expect("heading pattern is valid"))
}

/// Chapter splitter with configurable labels and page size
#[derive(Debug, Clone)]
pub struct TextSegmenter {
    page_size: usize,
    preamble_title: String,
    page_title: String,
}

impl Default for TextSegmenter {
    fn default() -> Self {
        Self::new(&ReaderConfig::default())
    }
}

impl TextSegmenter {
    pub fn new(config: &ReaderConfig) -> Self {
        Self {
            page_size: if config.page_size == 0 {
                DEFAULT_PAGE_SIZE
            } else {
                config.page_size
            },
            preamble_title: config.preamble_title.clone(),
            page_title: config.page_title.clone(),
        }
    }

    /// Split `text` into chapters, or pages if it has no headings
    ///
    /// Always returns at least one chapter.
    pub fn segment(&self, text: &str) -> Vec<Chapter> {
        let text = text.replace("\r\n", "\n");

        let starts: Vec<usize> = heading_regex().find_iter(&text).map(|m| m.start()).collect();
        if starts.is_empty() {
            return self.paginate(&text);
        }

        let mut chapters = Vec::with_capacity(starts.len() + 1);

        if starts[0] > 0 {
            chapters.push(Chapter {
                title: self.preamble_title.clone(),
                content: text[..starts[0]].to_string(),
                anchor: "chapter-0".to_string(),
            });
        }

        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            let body = &text[start..end];
            let (heading, content) = body.split_once('\n').unwrap_or((body, ""));

            chapters.push(Chapter {
                title: heading.trim().to_string(),
                content: content.to_string(),
                anchor: format!("ch-{}", i + 1),
            });
        }

        chapters
    }

    /// Cut `text` into pages of `page_size` characters
    fn paginate(&self, text: &str) -> Vec<Chapter> {
        let mut pages: Vec<&str> = Vec::new();
        let mut start = 0;
        let mut count = 0;

        for (idx, _) in text.char_indices() {
            if count == self.page_size {
                pages.push(&text[start..idx]);
                start = idx;
                count = 0;
            }
            count += 1;
        }
        if count > 0 || pages.is_empty() {
            pages.push(&text[start..]);
        }

        pages
            .into_iter()
            .enumerate()
            .map(|(i, content)| Chapter {
                title: self.page_title.replace("{n}", &(i + 1).to_string()),
                content: content.to_string(),
                anchor: format!("p-{}", i),
            })
            .collect()
    }
}
