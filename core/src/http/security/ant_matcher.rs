//! Ant-style path patterns for access rules.
//!
//! - `?` matches one character
//! - `*` matches zero or more characters within a path segment
//! - `**` matches zero or more whole segments
//!
//! Patterns are matched against the request path only; the query string is
//! never part of the match.
//!
//! ```rust
//! use registration_security_core::http::security::ant_matcher::AntMatcher;
//!
//! let login = AntMatcher::new("/login*");
//! assert!(login.matches("/login"));
//! assert!(login.matches("/loginError"));
//! assert!(!login.matches("/login/nested"));
//!
//! let resources = AntMatcher::new("/resources/**");
//! assert!(resources.matches("/resources"));
//! assert!(resources.matches("/resources/css/site.css"));
//! ```
//!
//! # Spring Equivalent
//! `org.springframework.util.AntPathMatcher`

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Glob(Vec<char>),
    AnyDepth,
}

/// A compiled Ant-style path pattern.
#[derive(Debug, Clone)]
pub struct AntMatcher {
    pattern: String,
    segments: Vec<Segment>,
}

impl AntMatcher {
    pub fn new(pattern: &str) -> Self {
        let segments = split_path(pattern)
            .map(|part| {
                if part == "**" {
                    Segment::AnyDepth
                } else if part.contains(['*', '?']) {
                    Segment::Glob(part.chars().collect())
                } else {
                    Segment::Literal(part.to_string())
                }
            })
            .collect();

        AntMatcher {
            pattern: pattern.to_string(),
            segments,
        }
    }

    /// Returns the pattern as written.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, path: &str) -> bool {
        let path: Vec<&str> = split_path(path).collect();
        match_segments(&self.segments, &path)
    }
}

impl From<&str> for AntMatcher {
    fn from(pattern: &str) -> Self {
        AntMatcher::new(pattern)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        }
        Some((segment, rest)) => match path.split_first() {
            None => false,
            Some((head, tail)) => {
                let head_matches = match segment {
                    Segment::Literal(literal) => literal == head,
                    Segment::Glob(glob) => match_glob(glob, &head.chars().collect::<Vec<_>>()),
                    Segment::AnyDepth => unreachable!("handled above"),
                };
                head_matches && match_segments(rest, tail)
            }
        },
    }
}

/// Matches one segment against a `*`/`?` glob with backtracking on the last star.
fn match_glob(glob: &[char], text: &[char]) -> bool {
    let (mut g, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match glob.get(g) {
            Some('*') => {
                star = Some((g, t));
                g += 1;
            }
            Some('?') => {
                g += 1;
                t += 1;
            }
            Some(c) if *c == text[t] => {
                g += 1;
                t += 1;
            }
            _ => match star {
                Some((star_g, star_t)) => {
                    g = star_g + 1;
                    t = star_t + 1;
                    star = Some((star_g, star_t + 1));
                }
                None => return false,
            },
        }
    }

    glob[g..].iter().all(|c| *c == '*')
}

/// An ordered set of patterns; matches when any member matches.
#[derive(Debug, Clone, Default)]
pub struct AntMatchers {
    matchers: Vec<AntMatcher>,
}

impl AntMatchers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_all(mut self, patterns: &[&str]) -> Self {
        self.matchers.extend(patterns.iter().map(|p| AntMatcher::new(p)));
        self
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(path))
    }

    pub fn find_match(&self, path: &str) -> Option<&AntMatcher> {
        self.matchers.iter().find(|m| m.matches(path))
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}
