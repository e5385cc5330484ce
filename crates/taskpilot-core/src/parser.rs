//! Parsing of task lists out of free-form model output

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// First bracketed sequence of double-quoted strings, escapes allowed
static ARRAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[(?:\s*"(?:[^"\\]|\\.)*"\s*,?)+\s*\]"#).expect("array pattern is valid")
});

static NO_TASK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^No( (new|further|additional|extra|other))? tasks? (is )?(required|needed|added|created|inputted).*$",
    )
    .expect("no-task pattern is valid")
});

static TASK_COMPLETE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^Task (complete|completed|finished|done|over|success).*")
        .expect("task-complete pattern is valid")
});

static DO_NOTHING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\s*|Do nothing(\s.*)?)$").expect("do-nothing pattern is valid")
});

/// Extract the first JSON string array embedded anywhere in `input`
///
/// Returns an empty list when no array is found or the match is not valid
/// JSON (e.g. a trailing comma). Never fails.
pub fn extract_array(input: &str) -> Vec<String> {
    let Some(found) = ARRAY_RE.find(input) else {
        warn!(input, "Could not extract array from model output");
        return Vec::new();
    };

    match serde_json::from_str::<Vec<String>>(found.as_str()) {
        Ok(tasks) => tasks,
        Err(e) => {
            warn!(error = %e, matched = found.as_str(), "Failed to parse matched array");
            Vec::new()
        }
    }
}

/// Whether a generated task is an actual task rather than a non-answer
/// such as "No new tasks needed", "Task complete" or "Do nothing".
pub fn is_real_task(input: &str) -> bool {
    !NO_TASK_RE.is_match(input) && !TASK_COMPLETE_RE.is_match(input) && !DO_NOTHING_RE.is_match(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_array() {
        let tasks = extract_array(r#"["Book a venue", "Order a cake"]"#);
        assert_eq!(tasks, vec!["Book a venue", "Order a cake"]);
    }

    #[test]
    fn test_extract_array_surrounded_by_prose() {
        let output = r#"Sure! Here are the tasks:
["Research venues", "Send invitations"]
Let me know if you need anything else."#;
        assert_eq!(
            extract_array(output),
            vec!["Research venues", "Send invitations"]
        );
    }

    #[test]
    fn test_extract_array_with_escapes() {
        let output = r#"Tasks: ["Print \"hello\"", "Use a \\ path"] done"#;
        assert_eq!(
            extract_array(output),
            vec![r#"Print "hello""#, r"Use a \ path"]
        );
    }

    #[test]
    fn test_extract_multiline_array() {
        let output = "```json\n[\n  \"First\",\n  \"Second\"\n]\n```";
        assert_eq!(extract_array(output), vec!["First", "Second"]);
    }

    #[test]
    fn test_extract_first_array_only() {
        let output = r#"["one"] and then ["two", "three"]"#;
        assert_eq!(extract_array(output), vec!["one"]);
    }

    #[test]
    fn test_extract_no_array() {
        assert!(extract_array("I could not think of any tasks.").is_empty());
        assert!(extract_array("").is_empty());
        assert!(extract_array("[1, 2, 3]").is_empty());
        assert!(extract_array("[]").is_empty());
    }

    #[test]
    fn test_extract_trailing_comma_is_rejected() {
        assert!(extract_array(r#"["a", "b",]"#).is_empty());
    }

    #[test]
    fn test_filters_non_tasks() {
        assert!(!is_real_task("No tasks needed"));
        assert!(!is_real_task("No new tasks added."));
        assert!(!is_real_task("no additional task is required"));
        assert!(!is_real_task("Task completed."));
        assert!(!is_real_task("task done"));
        assert!(!is_real_task(""));
        assert!(!is_real_task("   "));
        assert!(!is_real_task("Do nothing"));
        assert!(!is_real_task("do nothing at all"));
    }

    #[test]
    fn test_keeps_real_tasks() {
        assert!(is_real_task("Write a draft outline"));
        assert!(is_real_task("Do nothingness research"));
        assert!(is_real_task("Notify guests that no tasks are needed"));
        assert!(is_real_task("Taskforce meeting"));
    }
}
