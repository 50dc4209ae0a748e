use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("malformed diff: {0}")]
    Malformed(String),
    #[error("context mismatch at {file}:{line}")]
    ContextMismatch { file: String, line: usize },
    #[error("patched file missing: {0}")]
    MissingFile(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

struct Hunk {
    old_start: usize,
    removed: Vec<String>,
    added: Vec<String>,
}

struct FilePatch {
    path: String,
    hunks: Vec<Hunk>,
}

/// Applies a unified diff to files under `root`. The diff is the candidate
/// generator's output; a context mismatch means the snapshot no longer
/// matches and the candidate errors rather than corrupting the copy.
pub fn apply_patch(root: &Path, diff: &str) -> Result<(), PatchError> {
    for patch in parse_diff(diff)? {
        let target = root.join(&patch.path);
        if !target.is_file() {
            return Err(PatchError::MissingFile(patch.path));
        }
        let text = std::fs::read_to_string(&target)?;
        let had_trailing_newline = text.ends_with('\n');
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();

        // Apply bottom-up so earlier hunk offsets stay valid.
        for hunk in patch.hunks.iter().rev() {
            let start = hunk.old_start.saturating_sub(1);
            let end = start + hunk.removed.len();
            if end > lines.len() || lines[start..end] != hunk.removed[..] {
                return Err(PatchError::ContextMismatch {
                    file: patch.path.clone(),
                    line: hunk.old_start,
                });
            }
            lines.splice(start..end, hunk.added.iter().cloned());
        }

        let mut out = lines.join("\n");
        if had_trailing_newline && !out.is_empty() {
            out.push('\n');
        }
        std::fs::write(&target, out)?;
    }
    Ok(())
}

fn parse_diff(diff: &str) -> Result<Vec<FilePatch>, PatchError> {
    let mut patches: Vec<FilePatch> = Vec::new();
    let mut lines = diff.lines().peekable();

    while let Some(line) = lines.next() {
        if let Some(old_path) = line.strip_prefix("--- ") {
            let new_line = lines
                .next()
                .ok_or_else(|| PatchError::Malformed("missing +++ line".to_string()))?;
            let new_path = new_line
                .strip_prefix("+++ ")
                .ok_or_else(|| PatchError::Malformed(format!("expected +++, got {new_line}")))?;
            let path = strip_prefix(new_path)
                .or_else(|| strip_prefix(old_path))
                .ok_or_else(|| PatchError::Malformed("no usable file path".to_string()))?;
            patches.push(FilePatch {
                path: path.to_string(),
                hunks: Vec::new(),
            });
        } else if let Some(header) = line.strip_prefix("@@ ") {
            let patch = patches
                .last_mut()
                .ok_or_else(|| PatchError::Malformed("hunk before file header".to_string()))?;
            let old_start = parse_hunk_start(header)?;
            let mut hunk = Hunk {
                old_start,
                removed: Vec::new(),
                added: Vec::new(),
            };
            while let Some(&body) = lines.peek() {
                match body.as_bytes().first() {
                    Some(b'-') => hunk.removed.push(body[1..].to_string()),
                    Some(b'+') => hunk.added.push(body[1..].to_string()),
                    Some(b' ') => {
                        // Context lines participate in both sides.
                        hunk.removed.push(body[1..].to_string());
                        hunk.added.push(body[1..].to_string());
                    }
                    _ => break,
                }
                lines.next();
            }
            patch.hunks.push(hunk);
        }
    }

    if patches.is_empty() {
        return Err(PatchError::Malformed("no file headers".to_string()));
    }
    Ok(patches)
}

fn strip_prefix(path: &str) -> Option<&str> {
    let path = path.trim();
    if path == "/dev/null" {
        return None;
    }
    Some(
        path.strip_prefix("a/")
            .or_else(|| path.strip_prefix("b/"))
            .unwrap_or(path),
    )
}

/// `-12,3 +12,4 @@` → 12.
fn parse_hunk_start(header: &str) -> Result<usize, PatchError> {
    let old = header
        .strip_prefix('-')
        .and_then(|h| h.split_whitespace().next())
        .ok_or_else(|| PatchError::Malformed(format!("bad hunk header: {header}")))?;
    let start = old.split(',').next().unwrap_or(old);
    start
        .parse()
        .map_err(|_| PatchError::Malformed(format!("bad hunk header: {header}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(content: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.js"), content).unwrap();
        dir
    }

    #[test]
    fn applies_single_line_replacement() {
        let dir = fixture("const a = 1;\nif (xs.indexOf(x) !== -1) {\n}\n");
        let diff = "--- a/app.js\n+++ b/app.js\n@@ -2,1 +2,1 @@\n\
                    -if (xs.indexOf(x) !== -1) {\n+if (xs.includes(x)) {\n";
        apply_patch(dir.path(), diff).unwrap();
        let out = std::fs::read_to_string(dir.path().join("app.js")).unwrap();
        assert_eq!(out, "const a = 1;\nif (xs.includes(x)) {\n}\n");
    }

    #[test]
    fn applies_multi_line_hunk() {
        let dir = fixture("for (const s of xs) {\n  const re = new RegExp('^x');\n}\n");
        let diff = "--- a/app.js\n+++ b/app.js\n@@ -1,2 +1,3 @@\n\
                    -for (const s of xs) {\n-  const re = new RegExp('^x');\n\
                    +const hoistedPattern = new RegExp('^x');\n\
                    +for (const s of xs) {\n+  const re = hoistedPattern;\n";
        apply_patch(dir.path(), diff).unwrap();
        let out = std::fs::read_to_string(dir.path().join("app.js")).unwrap();
        assert_eq!(
            out,
            "const hoistedPattern = new RegExp('^x');\nfor (const s of xs) {\n  const re = hoistedPattern;\n}\n"
        );
    }

    #[test]
    fn context_mismatch_is_rejected() {
        let dir = fixture("something else entirely\n");
        let diff = "--- a/app.js\n+++ b/app.js\n@@ -1,1 +1,1 @@\n-expected line\n+new line\n";
        let err = apply_patch(dir.path(), diff).unwrap_err();
        assert!(matches!(err, PatchError::ContextMismatch { .. }));
    }

    #[test]
    fn missing_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let diff = "--- a/gone.js\n+++ b/gone.js\n@@ -1,1 +1,1 @@\n-x\n+y\n";
        assert!(matches!(
            apply_patch(dir.path(), diff),
            Err(PatchError::MissingFile(_))
        ));
    }
}
