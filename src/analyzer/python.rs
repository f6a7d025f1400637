//! Python analyzer built on tree-sitter

use std::path::Path;

use tree_sitter::Node;

use super::{AnalysisError, Facts, ImportFact, TypeDeclaration, UnitAnalyzer};

/// Level placeholder for absolute imports, fixed up once the whole file
/// has been seen (a `from __future__ import absolute_import` anywhere in the
/// file changes the meaning of every plain import).
const ABSOLUTE: i32 = 0;

/// Extracts imports and class declarations from Python source
///
/// Imports and classes in nested scopes (functions, conditionals) are
/// reported too, in source order.
#[derive(Debug, Clone, Default)]
pub struct PythonAnalyzer {
    implicit_relative_imports: bool,
}

impl PythonAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat plain imports as "package-relative first, then absolute"
    /// (level `-1`), unless the file opts into absolute imports.
    pub fn with_implicit_relative_imports(mut self, enabled: bool) -> Self {
        self.implicit_relative_imports = enabled;
        self
    }
}

/// Import fact plus whether its level still needs fixing up
struct Pending {
    fact: ImportFact,
    plain: bool,
}

#[derive(Default)]
struct Collector {
    imports: Vec<Pending>,
    types: Vec<TypeDeclaration>,
    absolute_import: bool,
}

impl UnitAnalyzer for PythonAnalyzer {
    fn analyze(&self, path: &Path, source: &str) -> Result<Facts, AnalysisError> {
        let language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| AnalysisError::Grammar(format!("{:?}", e)))?;

        let tree = parser.parse(source, None).ok_or_else(|| {
            AnalysisError::Grammar(format!("parser gave up on {}", path.display()))
        })?;
        let root = tree.root_node();

        if root.has_error() {
            let line = first_error_line(root).unwrap_or(1);
            return Err(AnalysisError::Syntax {
                path: path.to_path_buf(),
                line,
            });
        }

        let src = source.as_bytes();
        let mut collector = Collector::default();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "import_statement" => import_statement(node, src, &mut collector),
                "import_from_statement" => import_from_statement(node, src, &mut collector),
                "future_import_statement" => future_import_statement(node, src, &mut collector),
                "class_definition" => class_definition(node, src, &mut collector),
                _ => {}
            }
            let mut cursor = node.walk();
            let children: Vec<Node> = node.named_children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }

        let plain_level = if self.implicit_relative_imports && !collector.absolute_import {
            -1
        } else {
            ABSOLUTE
        };
        let imports = collector
            .imports
            .into_iter()
            .map(|p| {
                let mut fact = p.fact;
                if p.plain {
                    fact.level = plain_level;
                }
                fact
            })
            .collect();

        Ok(Facts {
            imports,
            types: collector.types,
        })
    }
}

/// `import a.b`, `import a.b as c`
fn import_statement(node: Node, src: &[u8], out: &mut Collector) {
    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        let Some((target, alias)) = import_name(name, src) else {
            continue;
        };
        let symbol = alias.unwrap_or_else(|| target.clone());
        out.imports.push(Pending {
            fact: ImportFact::new(symbol, target, ABSOLUTE),
            plain: true,
        });
    }
}

/// `from m import x`, `from .m import x as y`, `from .. import *`
fn import_from_statement(node: Node, src: &[u8], out: &mut Collector) {
    let Some(module) = node.child_by_field_name("module_name") else {
        return;
    };

    let (module_name, level) = match module.kind() {
        "relative_import" => {
            let mut cursor = module.walk();
            let mut level = 0;
            let mut name = String::new();
            for child in module.named_children(&mut cursor) {
                match child.kind() {
                    "import_prefix" => {
                        level = text(child, src).chars().filter(|c| *c == '.').count() as i32;
                    }
                    "dotted_name" => name = dotted_name(child, src),
                    _ => {}
                }
            }
            (name, level)
        }
        _ => (dotted_name(module, src), ABSOLUTE),
    };
    let plain = level == ABSOLUTE;

    let qualify = |name: &str| {
        if module_name.is_empty() {
            name.to_string()
        } else {
            format!("{module_name}.{name}")
        }
    };

    let mut cursor = node.walk();
    let wildcard = node
        .named_children(&mut cursor)
        .any(|c| c.kind() == "wildcard_import");
    if wildcard {
        out.imports.push(Pending {
            fact: ImportFact::new("*", qualify("*"), level),
            plain,
        });
        return;
    }

    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        let Some((imported, alias)) = import_name(name, src) else {
            continue;
        };
        let symbol = alias.unwrap_or_else(|| imported.clone());
        out.imports.push(Pending {
            fact: ImportFact::new(symbol, qualify(&imported), level),
            plain,
        });
    }
}

/// `from __future__ import x` is always absolute
fn future_import_statement(node: Node, src: &[u8], out: &mut Collector) {
    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        let Some((imported, alias)) = import_name(name, src) else {
            continue;
        };
        if imported == "absolute_import" {
            out.absolute_import = true;
        }
        let symbol = alias.unwrap_or_else(|| imported.clone());
        out.imports.push(Pending {
            fact: ImportFact::new(symbol, format!("__future__.{imported}"), 0),
            plain: false,
        });
    }
}

fn class_definition(node: Node, src: &[u8], out: &mut Collector) {
    let Some(name) = node.child_by_field_name("name") else {
        return;
    };
    let mut bases = Vec::new();
    if let Some(args) = node.child_by_field_name("superclasses") {
        let mut cursor = args.walk();
        for arg in args.named_children(&mut cursor) {
            // keyword arguments (metaclass=...) are not bases
            if let Some(base) = base_reference(arg, src) {
                bases.push(base);
            }
        }
    }
    out.types.push(TypeDeclaration {
        name: text(name, src).to_string(),
        bases,
    });
}

/// `(dotted name, alias)` for a `dotted_name` or `aliased_import` node
fn import_name(node: Node, src: &[u8]) -> Option<(String, Option<String>)> {
    match node.kind() {
        "dotted_name" => Some((dotted_name(node, src), None)),
        "aliased_import" => {
            let name = node.child_by_field_name("name")?;
            let alias = node
                .child_by_field_name("alias")
                .map(|a| text(a, src).to_string());
            Some((dotted_name(name, src), alias))
        }
        _ => None,
    }
}

/// Dotted reference for a base-class expression (`Base`, `mod.Base`, `Generic[T]`)
fn base_reference(node: Node, src: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" => Some(text(node, src).to_string()),
        "attribute" => {
            let object = base_reference(node.child_by_field_name("object")?, src)?;
            let attribute = node.child_by_field_name("attribute")?;
            Some(format!("{object}.{}", text(attribute, src)))
        }
        "subscript" => base_reference(node.child_by_field_name("value")?, src),
        _ => None,
    }
}

fn dotted_name(node: Node, src: &[u8]) -> String {
    if node.kind() == "identifier" {
        return text(node, src).to_string();
    }
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() == "identifier")
        .map(|c| text(c, src))
        .collect::<Vec<_>>()
        .join(".")
}

fn text<'a>(node: Node, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or("")
}

fn first_error_line(root: Node) -> Option<usize> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node.start_position().row + 1);
        }
        if !node.has_error() {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}
