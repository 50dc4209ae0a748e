use crate::models::{Opportunity, PatternKind};

/// A generated patch before persistence: a unified diff confined to the
/// opportunity's span (plus necessarily co-located edits such as a hoisted
/// declaration) and the reasoning behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateDraft {
    pub diff: String,
    pub rationale: String,
}

/// Turns one opportunity into 0..N candidate patches. Not every pattern has
/// a safe span-confined rewrite; those yield zero candidates and the run
/// proceeds.
#[derive(Debug, Clone, Default)]
pub struct CandidateGenerator;

impl CandidateGenerator {
    pub fn generate(&self, opportunity: &Opportunity, source: &str) -> Vec<CandidateDraft> {
        let lines: Vec<&str> = source.lines().collect();
        let line_idx = opportunity.start_line as usize - 1;
        let Some(&line) = lines.get(line_idx) else {
            return Vec::new();
        };

        match opportunity.pattern_kind {
            PatternKind::SetMembership => self.rewrite_membership(opportunity, line),
            PatternKind::LoopRegexConstruction => {
                self.hoist_out_of_loop(opportunity, &lines, "hoistedPattern")
            }
            PatternKind::JsonParseCache => {
                self.hoist_out_of_loop(opportunity, &lines, "parsedOnce")
            }
            // String accumulation, per-iteration find and spread all need a
            // rewrite of surrounding control flow, which is outside the
            // span; same for swapping sync IO to async signatures.
            PatternKind::LoopStringConcat
            | PatternKind::LoopArrayFind
            | PatternKind::LoopSpread
            | PatternKind::SyncIoInHandler => Vec::new(),
        }
    }

    /// `xs.indexOf(x) <cmp>` → `xs.includes(x)` / `!xs.includes(x)`.
    fn rewrite_membership(&self, opportunity: &Opportunity, line: &str) -> Vec<CandidateDraft> {
        let bytes = line.as_bytes();
        let dot = opportunity.start_col as usize - 1;
        let end = opportunity.end_col as usize - 1;
        if dot >= bytes.len() || end > bytes.len() || bytes.get(dot) != Some(&b'.') {
            return Vec::new();
        }

        // Receiver expression directly before `.indexOf`.
        let mut recv_start = dot;
        while recv_start > 0 {
            let c = bytes[recv_start - 1];
            if c.is_ascii_alphanumeric() || matches!(c, b'_' | b'$' | b'.' | b']' | b'[') {
                recv_start -= 1;
            } else {
                break;
            }
        }
        if recv_start == dot {
            return Vec::new();
        }
        let receiver = &line[recv_start..dot];

        let open = dot + ".indexOf".len();
        let Some(close) = matching_paren(bytes, open) else {
            return Vec::new();
        };
        let arg = &line[open + 1..close];
        let comparison = line[close + 1..end].trim();

        let negated = matches!(comparison, "=== -1" | "===-1" | "== -1" | "==-1");
        let replacement = if negated {
            format!("!{}.includes({})", receiver, arg)
        } else {
            format!("{}.includes({})", receiver, arg)
        };

        let new_line = format!("{}{}{}", &line[..recv_start], replacement, &line[end..]);
        let diff = single_line_diff(
            &opportunity.file_path,
            opportunity.start_line as usize,
            line,
            &new_line,
        );

        vec![CandidateDraft {
            diff,
            rationale: "set_membership: replaces a linear indexOf scan with includes; \
                        avoids an O(n) scan per lookup. For hot paths a Set gives O(1) \
                        membership."
                .to_string(),
        }]
    }

    /// Hoists a loop-invariant literal expression (regex construction or
    /// JSON.parse of a literal) to a `const` directly above the enclosing
    /// loop and references it from the original site.
    fn hoist_out_of_loop(
        &self,
        opportunity: &Opportunity,
        lines: &[&str],
        binding: &str,
    ) -> Vec<CandidateDraft> {
        let target_idx = opportunity.start_line as usize - 1;
        let line = lines[target_idx];
        let start = opportunity.start_col as usize - 1;
        let end = opportunity.end_col as usize - 1;
        if end > line.len() || start >= end {
            return Vec::new();
        }
        let expr = &line[start..end];
        if !is_loop_invariant_literal(expr) {
            return Vec::new();
        }

        let Some(loop_idx) = enclosing_loop_line(lines, target_idx) else {
            return Vec::new();
        };

        let indent: String = lines[loop_idx]
            .chars()
            .take_while(|c| c.is_whitespace())
            .collect();
        let hoisted = format!("{}const {} = {};", indent, binding, expr);
        let new_target = format!("{}{}{}", &line[..start], binding, &line[end..]);

        let old_block: Vec<&str> = lines[loop_idx..=target_idx].to_vec();
        let mut new_block: Vec<String> = vec![hoisted];
        new_block.extend(old_block[..old_block.len() - 1].iter().map(|s| s.to_string()));
        new_block.push(new_target);

        let diff = block_diff(
            &opportunity.file_path,
            loop_idx + 1,
            &old_block,
            &new_block,
        );

        let category = match opportunity.pattern_kind {
            PatternKind::LoopRegexConstruction => "avoids recompiling the regex every iteration",
            _ => "avoids reparsing the same JSON every iteration",
        };
        vec![CandidateDraft {
            diff,
            rationale: format!(
                "{}: hoists a loop-invariant expression above the loop; {}.",
                opportunity.pattern_kind.as_str(),
                category
            ),
        }]
    }
}

/// A literal regex (`/…/flags`), or a construction/parse call whose
/// arguments are all string literals. Anything referencing surrounding
/// bindings is not safe to hoist.
fn is_loop_invariant_literal(expr: &str) -> bool {
    let expr = expr.trim();
    if expr.starts_with('/') {
        return true;
    }
    let args = expr
        .find('(')
        .and_then(|open| expr.rfind(')').map(|close| &expr[open + 1..close]));
    let Some(args) = args else {
        return false;
    };
    args.split(',').all(|a| {
        let a = a.trim();
        (a.starts_with('\'') && a.ends_with('\'') && a.len() >= 2)
            || (a.starts_with('"') && a.ends_with('"') && a.len() >= 2)
    })
}

fn enclosing_loop_line(lines: &[&str], from: usize) -> Option<usize> {
    for idx in (0..from).rev() {
        let t = lines[idx].trim_start();
        if (t.starts_with("for ") || t.starts_with("for(") || t.starts_with("while ")
            || t.starts_with("while(") || t == "do {" || t.starts_with("do {"))
            && lines[idx].trim_end().ends_with('{')
        {
            return Some(idx);
        }
    }
    None
}

fn matching_paren(bytes: &[u8], open: usize) -> Option<usize> {
    if bytes.get(open) != Some(&b'(') {
        return None;
    }
    let mut depth = 0i32;
    for (offset, &c) in bytes[open..].iter().enumerate() {
        match c {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn single_line_diff(path: &str, line_no: usize, old: &str, new: &str) -> String {
    format!(
        "--- a/{path}\n+++ b/{path}\n@@ -{line_no},1 +{line_no},1 @@\n-{old}\n+{new}\n"
    )
}

fn block_diff(path: &str, start_line: usize, old: &[&str], new: &[String]) -> String {
    let mut diff = format!(
        "--- a/{path}\n+++ b/{path}\n@@ -{},{} +{},{} @@\n",
        start_line,
        old.len(),
        start_line,
        new.len()
    );
    for line in old {
        diff.push('-');
        diff.push_str(line);
        diff.push('\n');
    }
    for line in new {
        diff.push('+');
        diff.push_str(line);
        diff.push('\n');
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{PatternRegistry, parse_source};

    fn opportunities_for(src: &str) -> Vec<Opportunity> {
        let unit = parse_source(src).unwrap();
        let mut out = Vec::new();
        let registry = PatternRegistry::default();
        for node in &unit.nodes {
            for matcher in registry.matchers() {
                if let Some(confidence) = matcher.visit(node) {
                    out.push(Opportunity {
                        id: "o".into(),
                        run_id: "r".into(),
                        pattern_kind: matcher.kind(),
                        file_path: "src/app.js".into(),
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
        out
    }

    #[test]
    fn index_of_present_becomes_includes() {
        let src = "if (xs.indexOf(x) !== -1) {\n  use(x);\n}\n";
        let opportunities = opportunities_for(src);
        assert_eq!(opportunities.len(), 1);

        let drafts = CandidateGenerator.generate(&opportunities[0], src);
        assert_eq!(drafts.len(), 1);
        assert_eq!(
            drafts[0].diff,
            "--- a/src/app.js\n+++ b/src/app.js\n@@ -1,1 +1,1 @@\n\
             -if (xs.indexOf(x) !== -1) {\n+if (xs.includes(x)) {\n"
        );
        assert!(drafts[0].rationale.contains("set_membership"));
        assert!(drafts[0].rationale.contains("O(n)"));
    }

    #[test]
    fn index_of_absent_becomes_negated_includes() {
        let src = "if (xs.indexOf(x) === -1) {\n  add(x);\n}\n";
        let opportunities = opportunities_for(src);
        let drafts = CandidateGenerator.generate(&opportunities[0], src);
        assert!(drafts[0].diff.contains("+if (!xs.includes(x)) {"));
    }

    #[test]
    fn literal_regex_in_loop_is_hoisted() {
        let src = "for (const s of items) {\n  const re = new RegExp('^x');\n  re.test(s);\n}\n";
        let opportunities = opportunities_for(src);
        assert_eq!(opportunities.len(), 1);

        let drafts = CandidateGenerator.generate(&opportunities[0], src);
        assert_eq!(drafts.len(), 1);
        let diff = &drafts[0].diff;
        assert!(diff.contains("+const hoistedPattern = new RegExp('^x');"));
        assert!(diff.contains("+  const re = hoistedPattern;"));
        assert!(diff.contains("-for (const s of items) {"));
        assert!(diff.contains("+for (const s of items) {"));
    }

    #[test]
    fn dynamic_regex_yields_no_candidate() {
        let src = "for (const s of items) {\n  const re = new RegExp(s.prefix);\n}\n";
        let opportunities = opportunities_for(src);
        assert_eq!(opportunities.len(), 1);
        assert!(CandidateGenerator.generate(&opportunities[0], src).is_empty());
    }

    #[test]
    fn patterns_without_safe_rewrites_yield_nothing() {
        let src = "for (const x of xs) {\n  out += 'row';\n  acc = [...acc, x];\n}\n";
        let opportunities = opportunities_for(src);
        assert_eq!(opportunities.len(), 2);
        for opportunity in &opportunities {
            assert!(CandidateGenerator.generate(opportunity, src).is_empty());
        }
    }
}
