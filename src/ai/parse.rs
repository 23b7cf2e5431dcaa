//! Best-effort post-processing of raw model output.
//!
//! None of these functions fail: malformed output degrades to an empty or
//! default value.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::prompts::Category;

/// Related-note suggestions are capped at this many indices.
pub const MAX_RELATED: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTask {
    pub task: String,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

/// Strip a leading ```` ```json ```` or ```` ``` ```` fence and a trailing ```` ``` ````.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    }
    if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse a JSON array out of model output, or return an empty list.
pub fn parse_json_list<T: DeserializeOwned>(raw: &str) -> Vec<T> {
    match serde_json::from_str(strip_code_fences(raw)) {
        Ok(items) => items,
        Err(e) => {
            tracing::debug!("Discarding unparseable structured output: {}", e);
            Vec::new()
        }
    }
}

pub fn tasks(raw: &str) -> Vec<ExtractedTask> {
    parse_json_list(raw)
}

pub fn flashcards(raw: &str) -> Vec<Flashcard> {
    parse_json_list(raw)
}

/// Split a comma-separated list, dropping blanks, keeping at most `max` entries.
pub fn comma_list(raw: &str, max: usize) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(max)
        .map(str::to_string)
        .collect()
}

/// Map classifier output onto the fixed category set.
pub fn category(raw: &str) -> Category {
    let cleaned = raw.trim().to_lowercase().replace(['"', '\''], "");
    Category::from_str(cleaned.trim()).unwrap_or_default()
}

/// Indices of related candidates, in-bounds and de-duplicated, at most [`MAX_RELATED`].
pub fn related_indices(raw: &str, candidate_count: usize) -> Vec<usize> {
    if raw.to_lowercase().contains("none") {
        return Vec::new();
    }

    let mut indices = Vec::new();
    for token in raw.split(',').map(str::trim) {
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let Ok(idx) = token.parse::<usize>() else {
            continue;
        };
        if idx < candidate_count && !indices.contains(&idx) {
            indices.push(idx);
        }
        if indices.len() == MAX_RELATED {
            break;
        }
    }
    indices
}

/// Title of a generated note: its first line without `#`, or the topic.
pub fn note_title(body: &str, topic: &str) -> String {
    let first_line = body.lines().next().unwrap_or("");
    let title = first_line.replace('#', "");
    let title = title.trim();
    if title.is_empty() {
        topic.to_string()
    } else {
        title.to_string()
    }
}

/// Mermaid source without surrounding fences or a `mermaid` language tag.
pub fn flowchart(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.contains("```") {
        return trimmed.to_string();
    }
    let body = trimmed.split("```").nth(1).unwrap_or("");
    let body = body.strip_prefix("mermaid").unwrap_or(body);
    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```\n[2]\n```"), "[2]");
        assert_eq!(strip_code_fences("[3]"), "[3]");
    }

    #[test]
    fn both_opening_fences_are_stripped_independently() {
        assert_eq!(strip_code_fences("```json```[4]```"), "[4]");
        assert_eq!(strip_code_fences("``````"), "");
    }

    #[test]
    fn tasks_parse_from_fenced_json() {
        let raw = "```json\n[{\"task\": \"Submit report\", \"deadline\": \"Friday\", \"priority\": \"high\"}, {\"task\": \"Buy milk\"}]\n```";
        let parsed = tasks(raw);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].deadline.as_deref(), Some("Friday"));
        assert_eq!(parsed[1].priority, None);
    }

    #[test]
    fn malformed_structured_output_is_empty() {
        assert!(tasks("Sure! Here are your tasks: buy milk").is_empty());
        assert!(flashcards("{\"question\": \"not a list\"}").is_empty());
        assert!(flashcards("").is_empty());
    }

    #[test]
    fn comma_list_drops_blanks_and_caps() {
        assert_eq!(comma_list("a, b,, c ,d", 3), vec!["a", "b", "c"]);
        assert!(comma_list(" , ", 5).is_empty());
    }

    #[test]
    fn category_is_always_in_set() {
        assert_eq!(category(" \"Work\" \n"), Category::Work);
        assert_eq!(category("'finance'"), Category::Finance);
        assert_eq!(category("Category: work"), Category::Other);
        assert_eq!(category(""), Category::Other);
    }

    #[test]
    fn related_indices_stay_in_bounds() {
        assert_eq!(related_indices("2, 5, 1", 4), vec![2, 1]);
        assert_eq!(related_indices("1, 1, 0, 3, 2", 10), vec![1, 0, 3]);
        assert_eq!(related_indices("None of these", 5), Vec::<usize>::new());
        assert_eq!(related_indices("-1, 2a, 0", 3), vec![0]);
        assert!(related_indices("0, 1", 0).is_empty());
    }

    #[test]
    fn note_title_falls_back_to_topic() {
        assert_eq!(note_title("# Rust Ownership\nbody", "rust"), "Rust Ownership");
        assert_eq!(note_title("###\nbody", "rust"), "rust");
        assert_eq!(note_title("", "rust"), "rust");
    }

    #[test]
    fn flowchart_fences_are_removed() {
        assert_eq!(
            flowchart("```mermaid\nflowchart TD\n  A --> B\n```"),
            "flowchart TD\n  A --> B"
        );
        assert_eq!(flowchart("graph LR\nA-->B"), "graph LR\nA-->B");
    }
}
