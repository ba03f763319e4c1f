//! Post command handlers

use anyhow::{bail, Context, Result};

use shelf_core::Library;

use crate::editor::{confirm, edit_text};
use crate::output::Output;

/// List posts, newest first
pub async fn list(library: &Library, output: &Output) -> Result<()> {
    let posts = library.posts().list().await?;
    output.print_posts(&posts);
    Ok(())
}

/// Show a single post
pub async fn show(library: &Library, id: String, output: &Output) -> Result<()> {
    let post = library
        .posts()
        .get(&id)
        .await?
        .with_context(|| format!("Post not found: {}", id))?;
    output.print_post(&post);
    Ok(())
}

/// Create a new post
///
/// Opens the editor for the content when `--content` is not given.
pub async fn create(
    library: &Library,
    title: String,
    content: Option<String>,
    output: &Output,
) -> Result<()> {
    let content = match content {
        Some(content) => content,
        None => edit_text("")?,
    };

    let post = library.posts().create(&title, &content).await?;
    output.success(&format!("Created post: {}", post.id));
    Ok(())
}

/// Edit a post's title and content
pub async fn edit(
    library: &Library,
    id: String,
    title: Option<String>,
    content: Option<String>,
    output: &Output,
) -> Result<()> {
    let posts = library.posts();
    let post = posts
        .get(&id)
        .await?
        .with_context(|| format!("Post not found: {}", id))?;

    let title = title.unwrap_or(post.title);
    let content = match content {
        Some(content) => content,
        None => edit_text(&post.content)?,
    };

    posts.update(&id, &title, &content).await?;
    output.success(&format!("Updated post: {}", id));
    Ok(())
}

/// Delete a post
pub async fn delete(library: &Library, id: String, yes: bool, output: &Output) -> Result<()> {
    if !yes && output.should_prompt() && !confirm(&format!("Delete post {}?", id))? {
        output.message("Cancelled.");
        return Ok(());
    }

    if !library.posts().delete(&id).await? {
        bail!("Post not found: {}", id);
    }
    output.success(&format!("Deleted post: {}", id));
    Ok(())
}
