// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! PARTITION QoS policy (DDS v1.4 Sec.2.2.3.13)
//!
//! Writers and readers communicate only if their partition sets intersect.
//!
//! # Matching
//!
//! - An empty list is the default partition, i.e. the single name `""`.
//! - A name may contain `*` (any run of characters) and `?` (one character).
//!   A pattern is evaluated against the *other* side's literal names.
//! - Two patterns never match each other, not even when textually equal.
//!
//! ```
//! use hdds_dcps::qos::partition::Partition;
//!
//! let writer = Partition::new(vec!["sensor.front".to_string()]);
//! let reader = Partition::single("sensor.*");
//! assert!(writer.is_compatible_with(&reader));
//!
//! // Both sides are patterns: no match.
//! assert!(!Partition::single("a*").is_compatible_with(&Partition::single("a*")));
//! ```

/// PARTITION QoS policy
///
/// Empty list means default partition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Partition {
    /// Partition names or glob patterns (case-sensitive)
    pub names: Vec<String>,
}

impl Partition {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn single(name: &str) -> Self {
        Self {
            names: vec![name.to_string()],
        }
    }

    /// True for the default (empty) partition.
    pub fn is_default(&self) -> bool {
        self.names.is_empty()
    }

    pub fn add(&mut self, name: String) {
        if !self.names.contains(&name) {
            self.names.push(name);
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.names.retain(|n| n != name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn effective_names(&self) -> Vec<&str> {
        if self.names.is_empty() {
            vec![""]
        } else {
            self.names.iter().map(String::as_str).collect()
        }
    }

    /// True if the two partition sets intersect (symmetric).
    pub fn is_compatible_with(&self, other: &Partition) -> bool {
        let ours = self.effective_names();
        let theirs = other.effective_names();
        ours.iter().any(|a| theirs.iter().any(|b| names_match(a, b)))
    }
}

fn is_pattern(name: &str) -> bool {
    name.contains(|c: char| c == '*' || c == '?')
}

/// Compare one name from each side.
fn names_match(a: &str, b: &str) -> bool {
    match (is_pattern(a), is_pattern(b)) {
        (false, false) => a == b,
        (true, false) => glob_match(a, b),
        (false, true) => glob_match(b, a),
        (true, true) => false,
    }
}

/// Glob match supporting `*` and `?` (iterative, with backtracking on `*`).
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Partition {
        Partition::new(list.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_default_partitions_match() {
        assert!(Partition::default().is_compatible_with(&Partition::default()));
        assert!(!Partition::default().is_compatible_with(&names(&["A"])));
    }

    #[test]
    fn test_literal_intersection() {
        assert!(names(&["A", "B"]).is_compatible_with(&names(&["B"])));
        assert!(!names(&["A"]).is_compatible_with(&names(&["B"])));
    }

    #[test]
    fn test_glob_against_literal() {
        assert!(names(&["AB"]).is_compatible_with(&names(&["A*"])));
        assert!(names(&["A*"]).is_compatible_with(&names(&["ABC"])));
        assert!(names(&["A?"]).is_compatible_with(&names(&["AB"])));
        assert!(!names(&["A?"]).is_compatible_with(&names(&["ABC"])));
    }

    #[test]
    fn test_star_matches_default_partition() {
        assert!(names(&["*"]).is_compatible_with(&Partition::default()));
    }

    #[test]
    fn test_two_patterns_never_match() {
        assert!(!names(&["A*"]).is_compatible_with(&names(&["A*"])));
        assert!(!names(&["*"]).is_compatible_with(&names(&["?"])));
    }

    #[test]
    fn test_glob_match_cases() {
        assert!(glob_match("*", ""));
        assert!(glob_match("a*c", "abbbc"));
        assert!(glob_match("a*c*", "acxx"));
        assert!(!glob_match("a*c", "abd"));
        assert!(glob_match("??", "xy"));
        assert!(!glob_match("??", "x"));
    }

    #[test]
    fn test_add_remove() {
        let mut p = Partition::default();
        p.add("x".to_string());
        p.add("x".to_string());
        assert_eq!(p.len(), 1);
        assert!(p.contains("x"));
        p.remove("x");
        assert!(p.is_default());
    }
}
