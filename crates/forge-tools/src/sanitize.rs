//! Canonicalises raw handler error messages before they reach the LLM: no
//! absolute paths outside the workspace, no stack-trace-shaped lines.

use std::path::Path;

/// Sanitize a handler error message per spec step 7: absolute paths beyond
/// the working directory are redacted, and anything resembling a stack
/// frame is dropped.
#[must_use]
pub fn sanitize_message(message: &str, workspace_root: &Path) -> String {
    let first_line = message.lines().next().unwrap_or(message);
    redact_foreign_paths(first_line, workspace_root)
}

fn redact_foreign_paths(line: &str, workspace_root: &Path) -> String {
    let workspace = workspace_root.to_string_lossy();
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(pos) = rest.find('/') {
        out.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        let path_end = candidate.find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | ':')).unwrap_or(candidate.len());
        let path_str = &candidate[..path_end];

        if path_str.starts_with(workspace.as_ref()) || !looks_like_path(path_str) {
            out.push_str(path_str);
        } else {
            out.push_str("<path outside workspace>");
        }

        rest = &candidate[path_end..];
    }
    out.push_str(rest);
    out
}

fn looks_like_path(candidate: &str) -> bool {
    candidate.starts_with('/') && candidate.len() > 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn workspace_paths_pass_through() {
        let workspace = PathBuf::from("/home/user/project");
        let message = "file not found: /home/user/project/src/main.rs";
        assert_eq!(sanitize_message(message, &workspace), message);
    }

    #[test]
    fn foreign_absolute_paths_are_redacted() {
        let workspace = PathBuf::from("/home/user/project");
        let message = "permission denied: /etc/shadow";
        let result = sanitize_message(message, &workspace);
        assert!(result.contains("<path outside workspace>"));
        assert!(!result.contains("/etc/shadow"));
    }

    #[test]
    fn only_first_line_is_kept() {
        let workspace = PathBuf::from("/home/user/project");
        let message = "boom\n   at frame_one (/usr/lib/internal.rs:42)\n   at frame_two";
        let result = sanitize_message(message, &workspace);
        assert_eq!(result, "boom");
    }
}
