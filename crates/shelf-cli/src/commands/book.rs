//! Book command handlers

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::debug;

use shelf_core::{
    BookContent, BookRecord, Library, OpenedBook, ProgressOutcome, RemoteProgress, SyncError,
};

use crate::editor::confirm;
use crate::output::Output;

/// List books, most recently read first
pub async fn list(library: &Library, output: &Output) -> Result<()> {
    let shelf = library.list_books().await?;
    output.print_shelf(&shelf);
    Ok(())
}

/// Show the remote record of a book
pub async fn show(library: &Library, file_name: String, output: &Output) -> Result<()> {
    let book = find(library, &file_name).await?;
    output.print_book(&book);
    Ok(())
}

/// Upload a local file as a new book
pub async fn upload(
    library: &Library,
    path: PathBuf,
    name: Option<String>,
    output: &Output,
) -> Result<()> {
    let file_name = match name {
        Some(name) => name,
        None => file_name_of(&path)?,
    };
    let content =
        std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;

    let book = library
        .upload(&file_name, content)
        .await
        .context("Failed to upload book")?;

    output.success(&format!("Uploaded {}", book.file_name));
    if !output.is_quiet() && !output.is_json() {
        println!();
    }
    output.print_book(&book);
    Ok(())
}

/// Open a book and print its contents or table of contents
///
/// Falls back to the cached copy when the remote store is unreachable.
pub async fn open(
    library: &Library,
    file_name: String,
    chapter: Option<usize>,
    save_to: Option<PathBuf>,
    offline: bool,
    output: &Output,
) -> Result<()> {
    let opened = if offline {
        open_cached(library, &file_name)?
    } else {
        match library.find_book(&file_name).await {
            Ok(Some(book)) => library.open_book(&book).await?,
            Ok(None) => bail!("Book not found: {}", file_name),
            Err(e @ SyncError::RetrievalFailed { .. }) => {
                output.warning(&format!("{}; opening cached copy", e));
                open_cached(library, &file_name)?
            }
            Err(e) => return Err(e.into()),
        }
    };

    match &opened.content {
        BookContent::Pdf(bytes) => {
            let target = save_to.unwrap_or_else(|| PathBuf::from(&opened.session.file_name));
            std::fs::write(&target, bytes)
                .with_context(|| format!("Failed to write {}", target.display()))?;
            output.success(&format!(
                "Saved PDF to {} (resume at page {})",
                target.display(),
                opened.session.progress
            ));
        }
        BookContent::Text(chapters) => match chapter {
            Some(n) => {
                let chapter = n
                    .checked_sub(1)
                    .and_then(|i| chapters.get(i))
                    .with_context(|| {
                        format!("Chapter {} out of range (1-{})", n, chapters.len())
                    })?;
                output.print_chapter(chapter);
            }
            None => output.print_toc(&opened),
        },
    }

    Ok(())
}

fn open_cached(library: &Library, file_name: &str) -> Result<OpenedBook> {
    library
        .open_cached(file_name)?
        .with_context(|| format!("{} is not cached", file_name))
}

/// Save the reading position of a cached book
pub async fn progress(
    library: &Library,
    file_name: String,
    offset: u64,
    output: &Output,
) -> Result<()> {
    match library.save_progress_for(&file_name, offset).await {
        Ok(ProgressOutcome::NotCached) => {
            bail!("{} is not cached; open it first", file_name)
        }
        Ok(ProgressOutcome::Saved(remote)) => {
            debug!("Progress for {} saved: {:?}", file_name, remote);
            match remote {
                RemoteProgress::LocalOnly => output.warning(&format!(
                    "No remote record for {}; progress saved locally only",
                    file_name
                )),
                RemoteProgress::Stale { id } => output.warning(&format!(
                    "Remote record {} no longer exists; progress saved locally only",
                    id
                )),
                RemoteProgress::Updated { .. } | RemoteProgress::Relinked { .. } => {}
            }
            output.success(&format!("Saved progress {} for {}", offset, file_name));
            Ok(())
        }
        Err(e @ SyncError::RemoteWriteFailed { .. }) => {
            output.warning(&format!("Saved locally, but {}", e));
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete a book remotely and locally
pub async fn delete(
    library: &Library,
    file_name: String,
    yes: bool,
    output: &Output,
) -> Result<()> {
    let book = find(library, &file_name).await?;

    if !yes && output.should_prompt() {
        let prompt = format!("Delete '{}' ({})?", book.title, book.file_name);
        if !confirm(&prompt)? {
            output.message("Cancelled.");
            return Ok(());
        }
    }

    library.delete_book(&book).await?;
    output.success(&format!("Deleted {}", book.file_name));
    Ok(())
}

async fn find(library: &Library, file_name: &str) -> Result<BookRecord> {
    library
        .find_book(file_name)
        .await?
        .with_context(|| format!("Book not found: {}", file_name))
}

/// Book name for an uploaded path: its final component
fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("Cannot derive a book name from {}", path.display()))
}
