//! Least Connections selection with random tie-break.

use rand::seq::SliceRandom;

/// Least connections selector.
/// Selects a host with the minimum tracked connection count.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks among `(host, count)` candidates.
    pub fn pick<'a, I>(&self, candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let mut min = u64::MAX;
        let mut ties: Vec<&'a str> = Vec::new();

        for (host, count) in candidates {
            if count < min {
                min = count;
                ties.clear();
                ties.push(host);
            } else if count == min {
                ties.push(host);
            }
        }

        // Uniform among equals
        ties.choose(&mut rand::thread_rng()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_least_conn() {
        let lb = LeastConnections::new();

        assert_eq!(lb.pick(vec![("h1", 1), ("h2", 0)]), Some("h2"));
        assert_eq!(lb.pick(vec![("h1", 1), ("h2", 2)]), Some("h1"));
        assert_eq!(lb.pick(Vec::<(&str, u64)>::new()), None);
    }

    #[test]
    fn test_ties_broken_randomly() {
        let lb = LeastConnections::new();
        let mut seen = HashSet::new();

        for _ in 0..200 {
            let host = lb.pick(vec![("h1", 3), ("h2", 3), ("h3", 4)]).unwrap();
            seen.insert(host);
        }
        assert_eq!(seen, HashSet::from(["h1", "h2"]));
    }
}
