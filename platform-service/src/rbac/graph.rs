use std::collections::{HashMap, HashSet};

/// Adjacency list keyed by node id.
pub type Graph = HashMap<String, Vec<String>>;

/// Depth-first search for a path `from -> ... -> to`. Returns the path
/// including both ends, or `None` when `to` is unreachable.
pub fn find_path(graph: &Graph, from: &str, to: &str) -> Option<Vec<String>> {
    let mut visited = HashSet::new();
    let mut path = Vec::new();
    if walk(graph, from, to, &mut visited, &mut path) {
        Some(path)
    } else {
        None
    }
}

fn walk(
    graph: &Graph,
    from: &str,
    to: &str,
    visited: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> bool {
    path.push(from.to_string());
    if from == to {
        return true;
    }
    if !visited.insert(from.to_string()) {
        path.pop();
        return false;
    }
    if let Some(edges) = graph.get(from) {
        for next in edges {
            if walk(graph, next, to, visited, path) {
                return true;
            }
        }
    }
    path.pop();
    false
}

/// Whether adding the edges `node -> targets` closes a cycle. Returns the
/// cycle starting and ending at `node`.
pub fn cycle_through(graph: &Graph, node: &str, targets: &[String]) -> Option<Vec<String>> {
    for target in targets {
        if let Some(path) = find_path(graph, target, node) {
            let mut cycle = Vec::with_capacity(path.len() + 1);
            cycle.push(node.to_string());
            cycle.extend(path);
            return Some(cycle);
        }
    }
    None
}

/// Find any cycle reachable from `start`, returned as a closed path.
pub fn find_cycle(graph: &Graph, start: &str) -> Option<Vec<String>> {
    let mut done = HashSet::new();
    let mut stack = Vec::new();
    cycle_from(graph, start, &mut done, &mut stack)
}

fn cycle_from(
    graph: &Graph,
    node: &str,
    done: &mut HashSet<String>,
    stack: &mut Vec<String>,
) -> Option<Vec<String>> {
    if let Some(pos) = stack.iter().position(|n| n == node) {
        let mut cycle = stack[pos..].to_vec();
        cycle.push(node.to_string());
        return Some(cycle);
    }
    if done.contains(node) {
        return None;
    }
    stack.push(node.to_string());
    if let Some(edges) = graph.get(node) {
        for next in edges {
            if let Some(cycle) = cycle_from(graph, next, done, stack) {
                return Some(cycle);
            }
        }
    }
    stack.pop();
    done.insert(node.to_string());
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> Graph {
        edges
            .iter()
            .map(|(from, to)| {
                (
                    from.to_string(),
                    to.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_find_path() {
        let g = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &[])]);
        assert_eq!(
            find_path(&g, "a", "c"),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(find_path(&g, "c", "a"), None);
    }

    #[test]
    fn test_cycle_through_new_edge() {
        let g = graph(&[("b", &["c"]), ("c", &["a"])]);
        let cycle = cycle_through(&g, "a", &["b".to_string()]).unwrap();
        assert_eq!(cycle, vec!["a", "b", "c", "a"]);
        assert!(cycle_through(&g, "x", &["b".to_string()]).is_none());
    }

    #[test]
    fn test_self_edge_is_cycle() {
        let g = Graph::new();
        assert_eq!(
            cycle_through(&g, "a", &["a".to_string()]),
            Some(vec!["a".to_string(), "a".to_string()])
        );
    }

    #[test]
    fn test_find_cycle_behind_diamond() {
        let g = graph(&[("a", &["b", "c"]), ("b", &["c"]), ("c", &["b"])]);
        assert_eq!(find_cycle(&g, "a"), Some(vec!["b".into(), "c".into(), "b".into()]));

        let acyclic = graph(&[("a", &["b", "c"]), ("b", &["d"]), ("c", &["d"])]);
        assert_eq!(find_cycle(&acyclic, "a"), None);
    }

    #[test]
    fn test_diamond_is_not_cycle() {
        let g = graph(&[("b", &["d"]), ("c", &["d"]), ("d", &[])]);
        assert!(cycle_through(&g, "a", &["b".to_string(), "c".to_string()]).is_none());
    }
}
