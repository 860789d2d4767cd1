//! Plain-text rendering of command results
//!
//! Everything here writes structured records as text to an output stream,
//! normally stdout. No business logic lives in this module.

use std::io::{self, Write};

use crate::cache::CacheStats;
use crate::data::{EnrichedPost, EnrichedUser};
use crate::todo::{Todo, TodoStats};

/// Renders a user list, one block per user
pub fn render_users(out: &mut dyn Write, users: &[&EnrichedUser]) -> io::Result<()> {
    if users.is_empty() {
        return writeln!(out, "No users found. Try a different search or --refresh.");
    }

    for user in users {
        let status = if user.is_online { "online" } else { "offline" };
        let company = user
            .user
            .company
            .as_ref()
            .map(|c| c.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or("Unknown");

        writeln!(
            out,
            "[{}] {} (@{}) - {}",
            user.user.id, user.display_name, user.user.username, status
        )?;
        writeln!(out, "    email:   {}", user.user.email)?;
        writeln!(out, "    phone:   {}", user.user.phone)?;
        writeln!(out, "    website: {}", user.user.website)?;
        writeln!(out, "    company: {}", company)?;
        writeln!(out, "    address: {}", user.full_address)?;
    }
    writeln!(out, "{} user(s)", users.len())?;
    Ok(())
}

/// Renders the posts of one user under a heading
pub fn render_posts(out: &mut dyn Write, heading: &str, posts: &[EnrichedPost]) -> io::Result<()> {
    writeln!(out, "== {} ==", heading)?;

    if posts.is_empty() {
        writeln!(out, "This user has not published any posts.")?;
        return Ok(());
    }

    for post in posts {
        writeln!(out, "#{} {}", post.post.id, post.post.title)?;
        writeln!(
            out,
            "    {} | {} likes | {} comments | {}",
            post.published_at.format("%Y-%m-%d"),
            post.likes,
            post.comments,
            post.read_time_label()
        )?;
        writeln!(out, "    {}", post.excerpt)?;
    }
    Ok(())
}

/// Renders cache statistics
pub fn render_cache_stats(out: &mut dyn Write, stats: &CacheStats) -> io::Result<()> {
    writeln!(out, "entries: {}", stats.size)?;
    writeln!(out, "approximate size: {} bytes", stats.approximate_bytes)?;
    for key in &stats.keys {
        writeln!(out, "  {}", key)?;
    }
    Ok(())
}

/// Renders the todo list followed by its counts
pub fn render_todos(out: &mut dyn Write, todos: &[Todo], stats: TodoStats) -> io::Result<()> {
    if todos.is_empty() {
        writeln!(out, "No todos yet. Add one with `fetchdesk todo add <TEXT>`.")?;
    }
    for todo in todos {
        let mark = if todo.completed { "x" } else { " " };
        writeln!(
            out,
            "[{}] {}  {}  (created {})",
            mark,
            todo.id,
            todo.text,
            todo.created_at.format("%Y-%m-%d %H:%M")
        )?;
    }
    writeln!(
        out,
        "total: {} | completed: {} | pending: {}",
        stats.total, stats.completed, stats.pending
    )?;
    Ok(())
}
