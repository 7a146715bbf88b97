/// Compiled LIKE patterns
///
/// `%` matches any run of characters, `_` exactly one. A backslash escapes
/// the next character.

#[derive(Debug, Clone)]
pub(crate) enum CompiledPattern {
    /// "abc" (no wildcards)
    Exact(String),
    /// "abc%"
    Prefix(String),
    /// "%abc"
    Suffix(String),
    /// "%abc%"
    Contains(String),
    Complex(Vec<PatternSegment>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PatternSegment {
    Literal(Vec<char>),
    AnyChar,
    AnyChars,
}

impl CompiledPattern {
    /// Compile a LIKE pattern; `fold_case` lowercases the pattern, and
    /// callers must then pass lowercased text to `matches`
    pub(crate) fn compile(pattern: &str, fold_case: bool) -> Self {
        let pattern = if fold_case {
            pattern.to_lowercase()
        } else {
            pattern.to_string()
        };

        let mut segments = Vec::new();
        let mut literal = Vec::new();
        let mut chars = pattern.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '\\' => match chars.next() {
                    Some(escaped) => literal.push(escaped),
                    None => literal.push('\\'),
                },
                '%' | '_' => {
                    if !literal.is_empty() {
                        segments.push(PatternSegment::Literal(std::mem::take(&mut literal)));
                    }
                    if ch == '_' {
                        segments.push(PatternSegment::AnyChar);
                    } else if segments.last() != Some(&PatternSegment::AnyChars) {
                        segments.push(PatternSegment::AnyChars);
                    }
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(PatternSegment::Literal(literal));
        }

        let text = |chars: &Vec<char>| chars.iter().collect::<String>();
        match segments.as_slice() {
            [] => CompiledPattern::Exact(String::new()),
            [PatternSegment::Literal(l)] => CompiledPattern::Exact(text(l)),
            [PatternSegment::Literal(l), PatternSegment::AnyChars] => CompiledPattern::Prefix(text(l)),
            [PatternSegment::AnyChars, PatternSegment::Literal(l)] => CompiledPattern::Suffix(text(l)),
            [PatternSegment::AnyChars, PatternSegment::Literal(l), PatternSegment::AnyChars] => {
                CompiledPattern::Contains(text(l))
            }
            _ => CompiledPattern::Complex(segments),
        }
    }

    #[inline]
    pub(crate) fn matches(&self, text: &str) -> bool {
        match self {
            CompiledPattern::Exact(pattern) => text == pattern,
            CompiledPattern::Prefix(prefix) => text.starts_with(prefix.as_str()),
            CompiledPattern::Suffix(suffix) => text.ends_with(suffix.as_str()),
            CompiledPattern::Contains(substring) => text.contains(substring.as_str()),
            CompiledPattern::Complex(segments) => {
                let chars: Vec<char> = text.chars().collect();
                Self::match_segments(&chars, segments, 0, 0)
            }
        }
    }

    fn match_segments(text: &[char], segments: &[PatternSegment], ti: usize, si: usize) -> bool {
        if si >= segments.len() {
            return ti >= text.len();
        }
        match &segments[si] {
            PatternSegment::AnyChars => {
                // trailing % matches the rest
                if si + 1 == segments.len() {
                    return true;
                }
                (ti..=text.len()).any(|start| Self::match_segments(text, segments, start, si + 1))
            }
            PatternSegment::AnyChar => {
                ti < text.len() && Self::match_segments(text, segments, ti + 1, si + 1)
            }
            PatternSegment::Literal(literal) => {
                let end = ti + literal.len();
                end <= text.len()
                    && text[ti..end] == literal[..]
                    && Self::match_segments(text, segments, end, si + 1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_paths() {
        assert!(matches!(CompiledPattern::compile("abc", false), CompiledPattern::Exact(_)));
        assert!(matches!(CompiledPattern::compile("abc%", false), CompiledPattern::Prefix(_)));
        assert!(matches!(CompiledPattern::compile("%abc", false), CompiledPattern::Suffix(_)));
        assert!(matches!(CompiledPattern::compile("%abc%", false), CompiledPattern::Contains(_)));
        assert!(CompiledPattern::compile("J%", false).matches("John"));
        assert!(!CompiledPattern::compile("J%", false).matches("john"));
    }

    #[test]
    fn test_complex_patterns() {
        let p = CompiledPattern::compile("a_c%e", false);
        assert!(p.matches("abcde"));
        assert!(p.matches("abce"));
        assert!(!p.matches("ace"));
        assert!(CompiledPattern::compile("%", false).matches(""));
        assert!(CompiledPattern::compile("%%b%%", false).matches("abc"));
    }

    #[test]
    fn test_escape_and_case_folding() {
        let p = CompiledPattern::compile("100\\%", false);
        assert!(p.matches("100%"));
        assert!(!p.matches("1000"));
        let p = CompiledPattern::compile("BO%", true);
        assert!(p.matches("bob"));
    }
}
