//! Name resolution tests against real directory trees

mod common;

use common::TestTree;
use modwatch::resolve::{is_script_name, NameResolver, ResolveError, ResolvedName};

fn resolved(name: &str, package: Option<&str>) -> ResolvedName {
    ResolvedName {
        name: name.to_string(),
        package: package.map(str::to_string),
    }
}

fn project_tree() -> TestTree {
    TestTree::with_files(&[
        ("project/__init__.py", ""),
        ("project/a.py", ""),
        ("project/sub/__init__.py", ""),
        ("project/sub/deep.py", ""),
        ("plain/tool.py", ""),
    ])
}

#[test]
fn test_qualified_name_under_parent_root() {
    let tree = project_tree();
    let mut resolver = NameResolver::new([tree.root()]);
    assert_eq!(
        resolver.resolve(&tree.path("project/a.py")).unwrap(),
        resolved("project.a", Some("project"))
    );
    assert_eq!(
        resolver.resolve(&tree.path("project/sub/deep.py")).unwrap(),
        resolved("project.sub.deep", Some("project.sub"))
    );
}

#[test]
fn test_short_name_when_package_is_only_root() {
    let tree = project_tree();
    let mut resolver = NameResolver::new([tree.path("project")]);
    assert_eq!(resolver.resolve(&tree.path("project/a.py")).unwrap(), resolved("a", None));
}

#[test]
fn test_qualified_name_beats_earlier_short_root() {
    let tree = project_tree();
    // The package directory comes first, yet the deeper root wins
    let mut resolver = NameResolver::new([tree.path("project"), tree.root().to_path_buf()]);
    assert_eq!(
        resolver.resolve(&tree.path("project/a.py")).unwrap(),
        resolved("project.a", Some("project"))
    );
}

#[test]
fn test_package_sentinel_names_the_package() {
    let tree = project_tree();
    let mut resolver = NameResolver::new([tree.root()]);
    assert_eq!(
        resolver.resolve(&tree.path("project/__init__.py")).unwrap(),
        resolved("project", Some("project"))
    );
    assert_eq!(
        resolver.resolve(&tree.path("project/sub/__init__.py")).unwrap(),
        resolved("project.sub", Some("project.sub"))
    );
}

#[test]
fn test_non_package_directory_abandons_root() {
    let tree = project_tree();
    // plain/ has no __init__.py, so the tree root cannot name plain/tool.py
    let mut resolver = NameResolver::new([tree.root()]).strict();
    assert!(matches!(
        resolver.resolve(&tree.path("plain/tool.py")),
        Err(ResolveError::NoSearchRoot(_))
    ));

    let mut resolver = NameResolver::new([tree.root().to_path_buf(), tree.path("plain")]);
    assert_eq!(resolver.resolve(&tree.path("plain/tool.py")).unwrap(), resolved("tool", None));
}

#[test]
fn test_outside_roots_gets_stable_script_name() {
    let tree = project_tree();
    let mut resolver = NameResolver::new([tree.path("project")]);
    let first = resolver.resolve(&tree.path("plain/tool.py")).unwrap();
    assert!(is_script_name(&first.name));
    assert!(first.package.is_none());

    let mut other = NameResolver::new([tree.path("project")]);
    assert_eq!(other.resolve(&tree.path("plain/tool.py")).unwrap(), first);

    let second = other.resolve(&tree.path("project/sub/deep.py")).unwrap();
    assert_ne!(first.name, second.name);
}

#[test]
fn test_missing_search_paths_ignored() {
    let tree = project_tree();
    let resolver = NameResolver::new([
        tree.path("nope"),
        tree.root().to_path_buf(),
        tree.root().to_path_buf(),
    ]);
    assert_eq!(resolver.search_paths(), [tree.root().to_path_buf()]);
}

#[test]
fn test_not_a_unit() {
    let tree = project_tree();
    tree.write("project/data.txt", "");
    let mut resolver = NameResolver::new([tree.root()]);
    assert!(matches!(
        resolver.resolve(&tree.path("project/data.txt")),
        Err(ResolveError::NotAUnit(_))
    ));
    assert!(matches!(
        resolver.resolve(&tree.path("project/missing.py")),
        Err(ResolveError::NotAUnit(_))
    ));
}

#[test]
fn test_relative_path_input_is_normalized() {
    let tree = project_tree();
    let mut resolver = NameResolver::new([tree.root()]);
    let dotted = tree.path("project/sub/../a.py");
    assert_eq!(resolver.resolve(&dotted).unwrap(), resolved("project.a", Some("project")));
}
