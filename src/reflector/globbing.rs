//! Minimal shell-style glob support for `incoming_pattern` and
//! `delete_patterns` — `*` and `?` wildcards only, no character classes.
//! The upstream patterns never need more than that.

use std::fs;
use std::path::PathBuf;

/// Match `text` against a pattern containing `*` (any run of characters)
/// and `?` (exactly one character).
#[must_use]
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    matches(&p, &t)
}

fn matches(p: &[char], t: &[char]) -> bool {
    match p.first() {
        None => t.is_empty(),
        Some('*') => matches(&p[1..], t) || (!t.is_empty() && matches(p, &t[1..])),
        Some('?') => !t.is_empty() && matches(&p[1..], &t[1..]),
        Some(c) => t.first() == Some(c) && matches(&p[1..], &t[1..]),
    }
}

/// Expand a path pattern with at most one wildcard-bearing component per
/// segment (e.g. `/home/*/uploads`) into the directories that currently
/// exist on disk. Non-wildcard segments are passed through literally.
#[must_use]
pub fn expand_path_pattern(pattern: &str) -> Vec<PathBuf> {
    let components: Vec<&str> = pattern.split('/').collect();
    let mut current = vec![PathBuf::from(if pattern.starts_with('/') { "/" } else { "." })];

    for component in components {
        if component.is_empty() {
            continue;
        }
        if component.contains('*') || component.contains('?') {
            let mut next = Vec::new();
            for base in &current {
                let Ok(entries) = fs::read_dir(base) else {
                    continue;
                };
                for entry in entries.filter_map(Result::ok) {
                    let name = entry.file_name();
                    let name = name.to_string_lossy();
                    if glob_match(component, &name) && entry.path().is_dir() {
                        next.push(entry.path());
                    }
                }
            }
            current = next;
        } else {
            current = current.into_iter().map(|base| base.join(component)).collect();
        }
    }

    current.into_iter().filter(|p| p.is_dir()).collect()
}

/// True if `filename` matches any of `patterns`.
#[must_use]
pub fn matches_any(filename: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| glob_match(p, filename))
}
