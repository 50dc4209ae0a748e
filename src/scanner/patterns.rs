use crate::models::PatternKind;
use crate::scanner::source::{NodeKind, SourceNode};

/// A single pattern rule: visits each construct node and reports a match
/// confidence when the node (in its lexical context) exhibits the pattern.
pub trait PatternMatcher: Send + Sync {
    fn kind(&self) -> PatternKind;
    fn visit(&self, node: &SourceNode) -> Option<f64>;
}

/// Open catalog of matchers. Adding a pattern kind is a registration here;
/// the scanner walking files never changes.
pub struct PatternRegistry {
    matchers: Vec<Box<dyn PatternMatcher>>,
}

impl PatternRegistry {
    pub fn empty() -> Self {
        Self {
            matchers: Vec::new(),
        }
    }

    pub fn register(&mut self, matcher: Box<dyn PatternMatcher>) {
        self.matchers.push(matcher);
    }

    pub fn matchers(&self) -> &[Box<dyn PatternMatcher>] {
        &self.matchers
    }
}

impl Default for PatternRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(SetMembership));
        registry.register(Box::new(JsonParseCache));
        registry.register(Box::new(LoopStringConcat));
        registry.register(Box::new(LoopArrayFind));
        registry.register(Box::new(LoopSpread));
        registry.register(Box::new(LoopRegexConstruction));
        registry.register(Box::new(SyncIoInHandler));
        registry
    }
}

/// `indexOf` compared against -1/0 where `includes` (or a Set) is the
/// idiomatic form. Purely syntactic, so confidence is high; an existing
/// `includes` call never matches.
struct SetMembership;

impl PatternMatcher for SetMembership {
    fn kind(&self) -> PatternKind {
        PatternKind::SetMembership
    }

    fn visit(&self, node: &SourceNode) -> Option<f64> {
        match node.kind {
            NodeKind::IndexOfCompare { .. } => Some(0.9),
            _ => None,
        }
    }
}

/// `JSON.parse` evaluated once per iteration; a literal argument makes the
/// repeated work certain, a dynamic one only likely.
struct JsonParseCache;

impl PatternMatcher for JsonParseCache {
    fn kind(&self) -> PatternKind {
        PatternKind::JsonParseCache
    }

    fn visit(&self, node: &SourceNode) -> Option<f64> {
        match node.kind {
            NodeKind::JsonParseCall { literal_arg } if node.ctx.loop_depth > 0 => {
                Some(if literal_arg { 0.85 } else { 0.6 })
            }
            _ => None,
        }
    }
}

/// String accumulation via `+=` in a loop body.
struct LoopStringConcat;

impl PatternMatcher for LoopStringConcat {
    fn kind(&self) -> PatternKind {
        PatternKind::LoopStringConcat
    }

    fn visit(&self, node: &SourceNode) -> Option<f64> {
        match node.kind {
            NodeKind::StringConcatAssign { .. } if node.ctx.loop_depth > 0 => Some(0.75),
            _ => None,
        }
    }
}

/// `Array.prototype.find` inside a loop, an O(n) scan per iteration.
struct LoopArrayFind;

impl PatternMatcher for LoopArrayFind {
    fn kind(&self) -> PatternKind {
        PatternKind::LoopArrayFind
    }

    fn visit(&self, node: &SourceNode) -> Option<f64> {
        match node.kind {
            NodeKind::ArrayFindCall if node.ctx.loop_depth > 0 => Some(0.8),
            _ => None,
        }
    }
}

/// Array/object spread in a loop body, quadratic accumulation. The spread
/// heuristic is lexical, so confidence is the lowest in the catalog.
struct LoopSpread;

impl PatternMatcher for LoopSpread {
    fn kind(&self) -> PatternKind {
        PatternKind::LoopSpread
    }

    fn visit(&self, node: &SourceNode) -> Option<f64> {
        match node.kind {
            NodeKind::SpreadInLiteral if node.ctx.loop_depth > 0 => Some(0.6),
            _ => None,
        }
    }
}

/// Regex compiled inside a loop body. Construction at module or function
/// top level never matches.
struct LoopRegexConstruction;

impl PatternMatcher for LoopRegexConstruction {
    fn kind(&self) -> PatternKind {
        PatternKind::LoopRegexConstruction
    }

    fn visit(&self, node: &SourceNode) -> Option<f64> {
        match node.kind {
            NodeKind::RegexConstruction { .. } if node.ctx.loop_depth > 0 => Some(0.85),
            _ => None,
        }
    }
}

/// Blocking filesystem/process call inside an exported request handler or
/// a route-registered callback.
struct SyncIoInHandler;

impl PatternMatcher for SyncIoInHandler {
    fn kind(&self) -> PatternKind {
        PatternKind::SyncIoInHandler
    }

    fn visit(&self, node: &SourceNode) -> Option<f64> {
        match node.kind {
            NodeKind::SyncIoCall { .. } if node.ctx.in_handler => Some(0.7),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::source::parse_source;

    fn match_kinds(src: &str) -> Vec<PatternKind> {
        let registry = PatternRegistry::default();
        let unit = parse_source(src).unwrap();
        let mut kinds = Vec::new();
        for node in &unit.nodes {
            for matcher in registry.matchers() {
                if matcher.visit(node).is_some() {
                    kinds.push(matcher.kind());
                }
            }
        }
        kinds
    }

    #[test]
    fn three_index_of_forms_yield_three_membership_matches() {
        let src = r#"
            if (xs.indexOf(a) !== -1) {}
            if (xs.indexOf(b) >= 0) {}
            if (xs.indexOf(c) === -1) {}
        "#;
        let kinds = match_kinds(src);
        assert_eq!(kinds, vec![PatternKind::SetMembership; 3]);
    }

    #[test]
    fn includes_yields_zero_matches() {
        let src = r#"
            if (xs.includes(a)) {}
            if (!ys.includes(b)) {}
        "#;
        assert!(match_kinds(src).is_empty());
    }

    #[test]
    fn loop_patterns_require_a_loop() {
        let src = r#"
            let out = '';
            const topLevel = /outside/;
            for (const item of items) {
                out += item.name + ', ';
                const hit = lookup.find(l => l.id === item.id);
                acc = [...acc, item];
                const re = new RegExp('^' + item.prefix);
            }
        "#;
        let kinds = match_kinds(src);
        assert_eq!(
            kinds,
            vec![
                PatternKind::LoopStringConcat,
                PatternKind::LoopArrayFind,
                PatternKind::LoopSpread,
                PatternKind::LoopRegexConstruction,
            ]
        );
    }

    #[test]
    fn json_parse_in_loop_matches() {
        let src = r#"
            while (busy()) {
                const cfg = JSON.parse('{"retries": 3}');
                use(cfg);
            }
        "#;
        assert_eq!(match_kinds(src), vec![PatternKind::JsonParseCache]);
    }

    #[test]
    fn sync_io_matches_once_per_call_site() {
        let src = r#"
            export function handleReport(req, res) {
                if (existsSync(req.path)) {
                    const data = readFileSync(req.path);
                    writeFileSync('./out', data);
                }
            }
        "#;
        let kinds = match_kinds(src);
        assert_eq!(kinds, vec![PatternKind::SyncIoInHandler; 3]);
    }

    #[test]
    fn registry_is_extensible() {
        struct Always;
        impl PatternMatcher for Always {
            fn kind(&self) -> PatternKind {
                PatternKind::LoopSpread
            }
            fn visit(&self, _node: &SourceNode) -> Option<f64> {
                Some(1.0)
            }
        }

        let mut registry = PatternRegistry::empty();
        registry.register(Box::new(Always));
        assert_eq!(registry.matchers().len(), 1);
    }
}
