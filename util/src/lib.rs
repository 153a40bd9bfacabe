//! Shared plumbing for the simulator crates.
//!
//! The main export is [`Multiregex`](struct.Multiregex.html), a dispatcher
//! over a list of alternative regular expressions that both tokenizers
//! (assembly lines and constant expressions) are built on.

use regex::Regex;

/// A match produced by [`Multiregex::search`](struct.Multiregex.html#method.search).
///
/// `choice` is the index of the alternative that matched; `position` and
/// `length` locate the match inside the searched string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiregexMatch {
    pub position: usize,
    pub length: usize,
    pub choice: usize,
}

impl MultiregexMatch {
    pub fn end(&self) -> usize {
        self.position + self.length
    }

    /// The matched slice of `source`.
    pub fn text<'t>(&self, source: &'t str) -> &'t str {
        &source[self.position..self.position + self.length]
    }
}

/// A set of alternative regular expressions searched as one unit.
///
/// At every search position the alternatives compete; the earliest match
/// wins, ties are broken by match length (longest first) and then by the
/// order in which the alternatives were supplied. This makes keyword-ish
/// patterns take precedence over generic ones simply by listing them first.
pub struct Multiregex {
    choices: Vec<Regex>,
}

impl Multiregex {
    /// Compiles the alternatives. Panics on an invalid pattern; the
    /// patterns are compile-time constants of the caller.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Multiregex {
        let choices = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()).expect("invalid multiregex pattern"))
            .collect();
        Multiregex { choices }
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// Searches `data` starting at byte offset `from`.
    pub fn search_at(&self, data: &str, from: usize) -> Option<MultiregexMatch> {
        let mut best: Option<MultiregexMatch> = None;
        for (choice, regex) in self.choices.iter().enumerate() {
            if let Some(m) = regex.find(&data[from..]) {
                let candidate = MultiregexMatch {
                    position: from + m.start(),
                    length: m.end() - m.start(),
                    choice,
                };
                let better = match &best {
                    None => true,
                    Some(b) => {
                        candidate.position < b.position
                            || (candidate.position == b.position && candidate.length > b.length)
                    }
                };
                if better {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    pub fn search(&self, data: &str) -> Option<MultiregexMatch> {
        self.search_at(data, 0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn earliest_match_wins() {
        let multi = Multiregex::new(&["bcd", "ab"]);
        let m = multi.search("xabcd").unwrap();
        assert_eq!(m.position, 1);
        assert_eq!(m.choice, 1);
    }

    #[test]
    fn longest_match_breaks_position_ties() {
        let multi = Multiregex::new(&["<", "<<"]);
        let m = multi.search("<<3").unwrap();
        assert_eq!(m.length, 2);
        assert_eq!(m.choice, 1);
    }

    #[test]
    fn listing_order_breaks_full_ties() {
        let multi = Multiregex::new(&["[a-z]+", "[a-z]+"]);
        let m = multi.search("abc").unwrap();
        assert_eq!(m.choice, 0);
    }

    #[test]
    fn no_match() {
        let multi = Multiregex::new(&["[0-9]+"]);
        assert_eq!(multi.search("abc"), None);
    }

    #[test]
    fn match_text() {
        let multi = Multiregex::new(&["0x[0-9a-f]+"]);
        let m = multi.search("lw 0x1f").unwrap();
        assert_eq!(m.text("lw 0x1f"), "0x1f");
    }
}
