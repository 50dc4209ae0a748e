pub mod patterns;
pub mod source;

pub use patterns::{PatternMatcher, PatternRegistry};
pub use source::{NodeKind, ParseError, SourceNode, SourceUnit, parse_source};

use crate::models::Opportunity;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A file the scanner had to skip, with the reason. Skips are recorded and
/// surfaced but never abort a run.
#[derive(Debug, Clone)]
pub struct ScanDiagnostic {
    pub file_path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub opportunities: Vec<Opportunity>,
    pub diagnostics: Vec<ScanDiagnostic>,
    pub files_scanned: usize,
}

const SOURCE_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "jsx", "ts", "tsx"];
const SKIPPED_DIRS: &[&str] = &["node_modules", "dist", "build", "coverage", "vendor"];

/// Read-only, side-effect-free walk of a repository snapshot. The same
/// snapshot always produces the same opportunity set.
#[derive(Clone)]
pub struct Scanner {
    registry: Arc<PatternRegistry>,
}

impl Scanner {
    pub fn new(registry: Arc<PatternRegistry>) -> Self {
        Self { registry }
    }

    pub fn scan_tree(&self, run_id: &str, root: &Path) -> std::io::Result<ScanReport> {
        let mut report = ScanReport::default();
        let mut files = Vec::new();
        collect_source_files(root, &mut files)?;
        files.sort();

        for file in files {
            let rel = file
                .strip_prefix(root)
                .unwrap_or(&file)
                .to_string_lossy()
                .to_string();

            let text = match std::fs::read_to_string(&file) {
                Ok(text) => text,
                Err(e) => {
                    report.diagnostics.push(ScanDiagnostic {
                        file_path: rel,
                        message: format!("unreadable: {}", e),
                    });
                    continue;
                }
            };

            match parse_source(&text) {
                Ok(unit) => {
                    report.files_scanned += 1;
                    self.scan_unit(run_id, &rel, &unit, &mut report.opportunities);
                }
                Err(e) => {
                    tracing::debug!("Skipping {}: {}", rel, e);
                    report.diagnostics.push(ScanDiagnostic {
                        file_path: rel,
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    fn scan_unit(
        &self,
        run_id: &str,
        file_path: &str,
        unit: &SourceUnit,
        out: &mut Vec<Opportunity>,
    ) {
        for node in &unit.nodes {
            for matcher in self.registry.matchers() {
                if let Some(confidence) = matcher.visit(node) {
                    out.push(Opportunity {
                        id: uuid::Uuid::new_v4().to_string(),
                        run_id: run_id.to_string(),
                        pattern_kind: matcher.kind(),
                        file_path: file_path.to_string(),
                        start_line: node.span.start_line as i64,
                        start_col: node.span.start_col as i64,
                        end_line: node.span.end_line as i64,
                        end_col: node.span.end_col as i64,
                        confidence,
                        snippet: node.snippet.clone(),
                    });
                }
            }
        }
    }
}

fn collect_source_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if path.is_dir() {
            if name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref()) {
                continue;
            }
            collect_source_files(&path, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e))
        {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PatternKind;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn clean_tree_yields_no_opportunities() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "src/ok.js",
            "export function sum(xs) {\n  return xs.reduce((a, b) => a + b, 0);\n}\n",
        );

        let scanner = Scanner::new(Arc::new(PatternRegistry::default()));
        let report = scanner.scan_tree("run-1", dir.path()).unwrap();
        assert!(report.opportunities.is_empty());
        assert_eq!(report.files_scanned, 1);
    }

    #[test]
    fn malformed_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bad.js", "function broken() {\n");
        write(
            dir.path(),
            "good.js",
            "for (const x of xs) {\n  acc = [...acc, x];\n}\n",
        );

        let scanner = Scanner::new(Arc::new(PatternRegistry::default()));
        let report = scanner.scan_tree("run-1", dir.path()).unwrap();
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].file_path, "bad.js");
        assert_eq!(report.opportunities.len(), 1);
        assert_eq!(report.opportunities[0].pattern_kind, PatternKind::LoopSpread);
    }

    #[test]
    fn node_modules_are_not_scanned() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "node_modules/dep/index.js",
            "for (;;) { s += 'x'; }\n",
        );

        let scanner = Scanner::new(Arc::new(PatternRegistry::default()));
        let report = scanner.scan_tree("run-1", dir.path()).unwrap();
        assert!(report.opportunities.is_empty());
        assert_eq!(report.files_scanned, 0);
    }
}
