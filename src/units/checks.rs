//! Built-in quality checks
//!
//! Checks run on translated, non-fuzzy units. Each failing check is stored on
//! the unit by id; the ids also key the per-check counts cache.

/// Check id and human readable name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckInfo {
    pub id: &'static str,
    pub name: &'static str,
}

pub const CHECKS: [CheckInfo; 5] = [
    CheckInfo {
        id: "same",
        name: "Unchanged translation",
    },
    CheckInfo {
        id: "begin_newline",
        name: "Starting newline",
    },
    CheckInfo {
        id: "end_newline",
        name: "Trailing newline",
    },
    CheckInfo {
        id: "end_stop",
        name: "Trailing stop",
    },
    CheckInfo {
        id: "placeholders",
        name: "Format placeholders",
    },
];

/// Ids of the checks failing for a source/target pair
pub fn run_checks(sources: &[String], targets: &[String], flags: &[String]) -> Vec<String> {
    let mut failing = Vec::new();
    let Some(last_source) = sources.last() else {
        return failing;
    };

    for (idx, target) in targets.iter().enumerate() {
        if target.is_empty() {
            continue;
        }
        // first form pairs with the singular source, the rest with the plural
        let source = sources.get(idx.min(1)).unwrap_or(last_source);
        for check in CHECKS {
            if failing.iter().any(|f| f == check.id) {
                continue;
            }
            if check_fails(check.id, source, target, flags) {
                failing.push(check.id.to_string());
            }
        }
    }
    failing
}

fn check_fails(id: &str, source: &str, target: &str, flags: &[String]) -> bool {
    if flags.iter().any(|f| f == &format!("ignore-{}", id)) {
        return false;
    }
    match id {
        "same" => source == target && source.chars().any(char::is_alphabetic),
        "begin_newline" => source.starts_with('\n') != target.starts_with('\n'),
        "end_newline" => source.ends_with('\n') != target.ends_with('\n'),
        "end_stop" => {
            let src = source.trim_end();
            let tgt = target.trim_end();
            src.chars().count() > 4 && src.ends_with('.') != tgt.ends_with('.')
        }
        "placeholders" => placeholders(source) != placeholders(target),
        _ => false,
    }
}

/// printf style placeholders (`%s`, `%d`, `%(name)s`, `%1$s`), sorted
fn placeholders(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if c != '%' {
            continue;
        }
        if let Some(&(_, '%')) = chars.peek() {
            chars.next();
            continue;
        }
        let mut end = None;
        let mut in_name = false;
        while let Some(&(idx, next)) = chars.peek() {
            if in_name {
                in_name = next != ')';
                chars.next();
                continue;
            }
            match next {
                '(' => {
                    in_name = true;
                    chars.next();
                }
                '0'..='9' | '$' | '-' | '+' | ' ' | '#' | '.' | 'l' | 'h' => {
                    chars.next();
                }
                's' | 'd' | 'i' | 'f' | 'u' | 'x' | 'X' | 'e' | 'E' | 'g' | 'G' | 'c' => {
                    end = Some(idx + next.len_utf8());
                    chars.next();
                    break;
                }
                _ => break,
            }
        }
        if let Some(end) = end {
            found.push(text[start..end].to_string());
        }
    }
    found.sort();
    found
}
