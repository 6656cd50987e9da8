//! Context → segments.

/// Split a context on every literal occurrence of `split_tag`.
///
/// An empty tag leaves the context whole. Empty segments are kept.
pub fn split_segments<'a>(context: &'a str, split_tag: &str) -> Vec<&'a str> {
    if split_tag.is_empty() {
        vec![context]
    } else {
        context.split(split_tag).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_on_pipe() {
        assert_eq!(split_segments("a|b|c", "|"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_tag_keeps_context_whole() {
        assert_eq!(split_segments("  a|b \n", ""), vec!["  a|b \n"]);
        assert_eq!(split_segments("", ""), vec![""]);
    }

    #[test]
    fn test_empty_segments_preserved() {
        assert_eq!(split_segments("|a||b|", "|"), vec!["", "a", "", "b", ""]);
    }

    #[test]
    fn test_multichar_tag() {
        assert_eq!(split_segments("one<s>two", "<s>"), vec!["one", "two"]);
        assert_eq!(split_segments("no tag here", "<s>"), vec!["no tag here"]);
    }
}
