//! Key-line extraction from raw tool output.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Regex, RegexSet};

/// Lines matching any of these are kept in a directory summary.
static KEY_LINES: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        // resource change announcement: `# aws_s3_bucket.logs will be created`
        r#"(?i)#\s+[\w\[\]\-._"]+\s+will\s+be"#,
        r"(?i)plan:",
        r"(?i)warning",
        r"(?i)error",
        r"(?i)outputs",
        r"\s+(?:~|->|\+|-|-/\+|\+/-)\s+",
        r"(?i)no\s+changes",
        r"(?i)configuration is valid",
    ])
    .expect("valid key line patterns")
});

/// CSI (`ESC [ ... final`), OSC (`ESC ] ... BEL|ST`) and two-byte escapes.
static CONTROL_SEQUENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
        .expect("valid control sequence pattern")
});

/// Remove terminal control sequences and carriage returns.
pub fn strip_control_sequences(text: &str) -> Cow<'_, str> {
    if !text.contains('\u{1b}') && !text.contains('\r') {
        return Cow::Borrowed(text);
    }
    let cleaned = CONTROL_SEQUENCE.replace_all(text, "");
    Cow::Owned(cleaned.replace('\r', ""))
}

pub fn is_key_line(line: &str) -> bool {
    KEY_LINES.is_match(line)
}

/// Salient lines of `output` in their original order, each prefixed with `> `.
pub fn extract_key_lines(output: &str) -> Vec<String> {
    strip_control_sequences(output)
        .split('\n')
        .filter(|line| is_key_line(line))
        .map(|line| format!("> {line}"))
        .collect()
}
