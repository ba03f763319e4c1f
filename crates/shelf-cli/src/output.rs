//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;
use shelf_core::models::millis_to_datetime;
use shelf_core::{BookRecord, CacheEntry, Chapter, OpenedBook, PostRecord, Shelf};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print any serializable value as pretty JSON
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to serialize output: {}", e),
        }
    }

    /// Print the library listing
    pub fn print_shelf(&self, shelf: &Shelf) {
        match shelf {
            Shelf::Remote { books } => self.print_books(books),
            Shelf::Offline { files, reason } => {
                match self.format {
                    OutputFormat::Human => {
                        println!("⚠ Offline ({}), showing cached books", reason);
                        println!();
                        self.print_cache_entries(files);
                    }
                    OutputFormat::Json => self.json(shelf),
                    OutputFormat::Quiet => self.print_cache_entries(files),
                }
            }
        }
    }

    /// Print remote book records
    pub fn print_books(&self, books: &[BookRecord]) {
        match self.format {
            OutputFormat::Human => {
                if books.is_empty() {
                    println!("No books found.");
                    return;
                }
                for book in books {
                    println!(
                        "{} | {} | {} | {}",
                        truncate(&book.title, 30),
                        truncate(&book.file_name, 30),
                        if book.is_pdf() { "pdf" } else { "txt" },
                        format_millis(book.last_read)
                    );
                }
                println!("\n{} book(s)", books.len());
            }
            OutputFormat::Json => self.json(books),
            OutputFormat::Quiet => {
                for book in books {
                    println!("{}", book.file_name);
                }
            }
        }
    }

    /// Print a single remote book record
    pub fn print_book(&self, book: &BookRecord) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:        {}", book.id);
                println!("Title:     {}", book.title);
                println!("File:      {}", book.file_name);
                println!("Type:      {}", book.mime_type);
                println!("URL:       {}", book.file_url);
                println!(
                    "Progress:  {}",
                    book.progress
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "(none)".to_string())
                );
                println!("Last read: {}", format_millis(book.last_read));
            }
            OutputFormat::Json => self.json(book),
            OutputFormat::Quiet => println!("{}", book.id),
        }
    }

    /// Print cached files
    pub fn print_cache_entries(&self, entries: &[CacheEntry]) {
        match self.format {
            OutputFormat::Human => {
                if entries.is_empty() {
                    println!("Cache is empty.");
                    return;
                }
                for entry in entries {
                    println!(
                        "{} | {} | {} | {}{}",
                        truncate(&entry.file_name, 35),
                        format_size(entry.size),
                        format_millis(entry.last_read),
                        entry.progress,
                        if entry.remote_id.is_none() {
                            " (unlinked)"
                        } else {
                            ""
                        }
                    );
                }
                println!("\n{} file(s)", entries.len());
            }
            OutputFormat::Json => self.json(entries),
            OutputFormat::Quiet => {
                for entry in entries {
                    println!("{}", entry.file_name);
                }
            }
        }
    }

    /// Print the table of contents of an opened book
    pub fn print_toc(&self, opened: &OpenedBook) {
        let session = &opened.session;
        let chapters = opened.chapters();

        match self.format {
            OutputFormat::Human => {
                println!("{} ({})", session.title, session.file_name);
                println!("Resume at offset {}", session.progress);
                println!();
                for (i, chapter) in chapters.iter().enumerate() {
                    println!(
                        "{:>4}. {} ({} chars)",
                        i + 1,
                        display_title(chapter),
                        chapter.content.chars().count()
                    );
                }
            }
            OutputFormat::Json => {
                let toc: Vec<_> = chapters
                    .iter()
                    .map(|c| serde_json::json!({"title": c.title, "anchor": c.anchor}))
                    .collect();
                self.json(&serde_json::json!({"session": session, "chapters": toc}));
            }
            OutputFormat::Quiet => {
                for chapter in chapters {
                    println!("{}", chapter.anchor);
                }
            }
        }
    }

    /// Print one chapter's text
    pub fn print_chapter(&self, chapter: &Chapter) {
        match self.format {
            OutputFormat::Human => {
                println!("── {} ──", display_title(chapter));
                println!();
                println!("{}", chapter.content);
            }
            OutputFormat::Json => self.json(chapter),
            OutputFormat::Quiet => println!("{}", chapter.content),
        }
    }

    /// Print a list of posts
    pub fn print_posts(&self, posts: &[PostRecord]) {
        match self.format {
            OutputFormat::Human => {
                if posts.is_empty() {
                    println!("No posts found.");
                    return;
                }
                for post in posts {
                    println!(
                        "{} | {} | {}",
                        post.id,
                        post.display_date(),
                        truncate(&post.title, 50)
                    );
                }
                println!("\n{} post(s)", posts.len());
            }
            OutputFormat::Json => self.json(posts),
            OutputFormat::Quiet => {
                for post in posts {
                    println!("{}", post.id);
                }
            }
        }
    }

    /// Print a single post
    pub fn print_post(&self, post: &PostRecord) {
        match self.format {
            OutputFormat::Human => {
                println!("{}", post.title);
                println!("{}", post.display_date());
                println!();
                println!("{}", post.content);
            }
            OutputFormat::Json => self.json(post),
            OutputFormat::Quiet => println!("{}", post.id),
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning to stderr (suppressed in quiet mode)
    pub fn warning(&self, message: &str) {
        if !self.is_quiet() {
            eprintln!("⚠ {}", message);
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn display_title(chapter: &Chapter) -> &str {
    if chapter.title.is_empty() {
        "(untitled)"
    } else {
        &chapter.title
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format epoch milliseconds as a UTC timestamp
fn format_millis(millis: i64) -> String {
    if millis <= 0 {
        return "never".to_string();
    }
    millis_to_datetime(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string())
}

/// Human-readable byte size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("三体第一部地球往事", 6), "三体第...");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(0), "never");
        assert_eq!(format_millis(1_700_000_000_000), "2023-11-14 22:13");
    }

    #[test]
    fn test_display_title() {
        let chapter = Chapter {
            title: String::new(),
            content: String::new(),
            anchor: "p-0".to_string(),
        };
        assert_eq!(display_title(&chapter), "(untitled)");
    }
}
