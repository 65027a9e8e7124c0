//! Nickname templates.

use crate::server::model::profile::Profile;

/// Longest nickname the chat platform accepts.
pub const MAX_NICK_CHARS: usize = 32;

/// Renders a nickname template for a profile.
///
/// Supports `{{ name }}`, `{{ tid }}` and `{{ tag }}`, with optional whitespace inside
/// the braces. Unknown placeholders are kept verbatim. The result is cut to 32 chars.
///
/// # Returns
/// - `Some(String)` - The rendered nickname
/// - `None` - The template, or its rendering, is blank
pub fn render(template: &str, profile: &Profile) -> Option<String> {
    if template.trim().is_empty() {
        return None;
    }

    let tag = profile
        .faction
        .as_ref()
        .map(|f| f.tag.as_str())
        .unwrap_or_default();
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };

        match after[..end].trim() {
            "name" => out.push_str(&profile.name),
            "tid" => out.push_str(&profile.tid.to_string()),
            "tag" => out.push_str(tag),
            _ => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    let nick: String = out.trim().chars().take(MAX_NICK_CHARS).collect();
    let nick = nick.trim_end().to_string();
    (!nick.is_empty()).then_some(nick)
}
