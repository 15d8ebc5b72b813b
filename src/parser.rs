use crate::models::TaskPriority;
use regex::Regex;

#[derive(Debug, PartialEq)]
pub struct ParsedTitle {
    pub title: String,
    pub priority: Option<TaskPriority>,
}

/// Quick-add syntax for new task titles: a `!1`/`!2`/`!3` token anywhere
/// in the input sets the priority (low/medium/high). The first valid
/// token wins; all tokens are stripped from the title.
pub fn parse_title_input(input: &str) -> ParsedTitle {
    let priority_re = Regex::new(r"!(\d+)\s*").unwrap();

    let mut priority = None;

    // Priority
    for caps in priority_re.captures_iter(input) {
        if let Some(priority_match) = caps.get(1) {
            if priority.is_none() {
                priority = match priority_match.as_str() {
                    "1" => Some(TaskPriority::Low),
                    "2" => Some(TaskPriority::Medium),
                    "3" => Some(TaskPriority::High),
                    _ => None,
                };
            }
        }
    }

    let title = priority_re.replace_all(input, "").to_string();

    let title = Regex::new(r"\s+")
        .unwrap()
        .replace_all(&title, " ")
        .trim()
        .to_string();

    ParsedTitle { title, priority }
}
