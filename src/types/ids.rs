//! Normalized identifiers used across the data model.

/// Normalize a caller-supplied agent id: trim, lowercase, and collapse any
/// character outside `[a-z0-9_-]` to `-`. Used both as the state key and as
/// the directory name under the state root.
pub fn normalize_agent_id(raw: &str) -> String {
    let trimmed = raw.trim().to_lowercase();
    let mut out = String::with_capacity(trimmed.len());
    let mut last_dash = false;
    for c in trimmed.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
            last_dash = c == '-';
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_whitespace_and_case() {
        assert_eq!(normalize_agent_id("  Research Bot  "), "research-bot");
    }

    #[test]
    fn collapses_repeated_separators() {
        assert_eq!(normalize_agent_id("a///b   c"), "a-b-c");
    }

    #[test]
    fn keeps_underscores_and_dashes() {
        assert_eq!(normalize_agent_id("agent_007-x"), "agent_007-x");
    }
}
