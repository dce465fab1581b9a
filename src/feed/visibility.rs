//! The one visibility rule for posts, shared by both query paths.
//!
//! The aggregated query calls it through the `post_visible` SQL function; the
//! client-filtered path calls [`is_visible`] directly.

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

use crate::error::Result;
use crate::graph::MAX_DEPTH;

/// Name of the SQL scalar function wrapping [`is_visible`].
pub const POST_VISIBLE_FN: &str = "post_visible";

/// Degree ceiling encoded in a post's `connection_type`.
///
/// Reads a leading (optionally signed) integer, ignoring surrounding text.
/// Missing, unparseable and zero values mean the default ceiling of 3.
pub fn parse_degree_ceiling(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return MAX_DEPTH as i64;
    };
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    match digits[..end].parse::<i64>() {
        Ok(0) | Err(_) => MAX_DEPTH as i64,
        Ok(n) => sign * n,
    }
}

/// Facts about one (post, viewer) pair needed to decide visibility.
#[derive(Debug, Clone, Copy)]
pub struct VisibilityInput<'a> {
    pub viewer_id: &'a str,
    pub owner_id: &'a str,
    /// Viewer's degree to the owner; 0 for the viewer's own posts.
    pub viewer_degree: u32,
    pub connection_type: Option<&'a str>,
    pub hide_from_chat: bool,
    /// Owner and viewer are connected in both directions.
    pub owner_in_chat: bool,
}

/// A post is visible when the viewer is within its degree ceiling and, for
/// `hide_from_chat` posts, when owner and viewer are chat peers.
/// Owners are exempt from the ceiling only; a viewer is never their own chat
/// peer, so their own `hide_from_chat` posts stay hidden.
pub fn is_visible(input: &VisibilityInput<'_>) -> bool {
    let own = input.owner_id == input.viewer_id;
    if !own && i64::from(input.viewer_degree) > parse_degree_ceiling(input.connection_type) {
        return false;
    }
    if input.hide_from_chat && !input.owner_in_chat {
        return false;
    }
    true
}

/// Register `post_visible(viewer, owner, degree, connection_type, hide_from_chat, owner_in_chat)`.
pub fn register(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        POST_VISIBLE_FN,
        6,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let viewer_id: String = ctx.get(0)?;
            let owner_id: String = ctx.get(1)?;
            let viewer_degree: u32 = ctx.get(2)?;
            let connection_type: Option<String> = ctx.get(3)?;
            let hide_from_chat: bool = ctx.get(4)?;
            let owner_in_chat: bool = ctx.get(5)?;
            Ok(is_visible(&VisibilityInput {
                viewer_id: &viewer_id,
                owner_id: &owner_id,
                viewer_degree,
                connection_type: connection_type.as_deref(),
                hide_from_chat,
                owner_in_chat,
            }))
        },
    )?;
    Ok(())
}
