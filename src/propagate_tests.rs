use crate::error::ReleaseError;
use crate::graph::PackageGraph;
use crate::manifest::{DependencySection, PackageManifest};
use crate::propagate::{
    assign_changed, classify, persist, propagate, rewrite_dependency_ranges, Mutation,
    ReleaseKind,
};
use crate::test_support::WorkspaceFixture;
use semver::Version;

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

struct Pkg<'a> {
    name: &'a str,
    version: &'a str,
    changed: bool,
    deps: &'a [&'a str],
    peers: &'a [&'a str],
}

fn pkg<'a>(name: &'a str, version: &'a str, changed: bool, deps: &'a [&'a str]) -> Pkg<'a> {
    Pkg {
        name,
        version,
        changed,
        deps,
        peers: &[],
    }
}

fn graph(packages: &[Pkg]) -> PackageGraph {
    let section = |names: &[&str], range: &str| {
        names
            .iter()
            .map(|n| format!(r#""{}": "{}""#, n, range))
            .collect::<Vec<_>>()
            .join(", ")
    };

    PackageGraph::from_entries(packages.iter().map(|p| {
        let json = format!(
            r#"{{ "name": "{}", "version": "{}", "dependencies": {{ {} }}, "peerDependencies": {{ {} }} }}"#,
            p.name,
            p.version,
            section(p.deps, &format!("^{}", p.version)),
            section(p.peers, &format!("^{}", p.version)),
        );
        let manifest =
            PackageManifest::parse(format!("packages/{}/package.json", p.name), &json).unwrap();
        (manifest, p.changed)
    }))
    .unwrap()
}

fn version_of(graph: &PackageGraph, name: &str) -> String {
    graph.get(name).unwrap().version().to_string()
}

fn range_of(graph: &PackageGraph, name: &str, dep: &str) -> String {
    let manifest = &graph.get(name).unwrap().manifest;
    DependencySection::ALL
        .iter()
        .find_map(|s| manifest.dependency_range(*s, dep))
        .unwrap()
        .to_string()
}

#[test]
fn test_classification_table() {
    assert_eq!(classify(&v("0.9.0"), &v("1.0.0")), ReleaseKind::Full);
    assert_eq!(classify(&v("1.2.0"), &v("1.3.0")), ReleaseKind::Partial);
    assert_eq!(classify(&v("0.1.0"), &v("0.2.0")), ReleaseKind::Full);
    assert_eq!(classify(&v("0.1.0"), &v("0.1.1")), ReleaseKind::Partial);
}

#[test]
fn test_classification_edges() {
    // preminor on 0.x is not in the partial set
    assert_eq!(classify(&v("0.1.0"), &v("0.2.0-beta.0")), ReleaseKind::Full);
    assert_eq!(classify(&v("0.1.0-beta.0"), &v("0.1.0-beta.1")), ReleaseKind::Partial);
    assert_eq!(classify(&v("1.2.3"), &v("1.3.0-rc.0")), ReleaseKind::Partial);
    assert_eq!(classify(&v("1.2.3"), &v("2.0.0-rc.0")), ReleaseKind::Full);
    assert_eq!(classify(&v("1.2.3"), &v("1.2.3")), ReleaseKind::Full);
}

#[test]
fn test_full_release_bumps_everything() {
    let mut g = graph(&[
        pkg("app", "1.0.0", false, &["core"]),
        pkg("core", "1.0.0", true, &[]),
        pkg("docs-theme", "1.0.0", false, &[]),
    ]);

    let report = propagate(&mut g, &v("1.0.0"), &v("2.0.0")).unwrap();

    assert_eq!(report.kind, ReleaseKind::Full);
    for name in ["app", "core", "docs-theme"] {
        assert_eq!(version_of(&g, name), "2.0.0");
    }
    assert_eq!(range_of(&g, "app", "core"), "^2.0.0");
    assert_eq!(report.bumped_packages(), vec!["app", "core", "docs-theme"]);
}

#[test]
fn test_partial_release_bumps_dependent() {
    // A changed, B unchanged but depends on A
    let mut g = graph(&[pkg("a", "1.0.0", true, &[]), pkg("b", "1.0.0", false, &["a"])]);

    let mut mutations = assign_changed(&mut g, &v("2.0.0")).unwrap();
    mutations.extend(rewrite_dependency_ranges(&mut g));

    assert_eq!(version_of(&g, "a"), "2.0.0");
    assert_eq!(version_of(&g, "b"), "2.0.0");
    assert_eq!(range_of(&g, "b", "a"), "^2.0.0");
    assert!(mutations.contains(&Mutation::DependencyRange {
        package: "b".to_string(),
        section: DependencySection::Dependencies,
        dependency: "a".to_string(),
        from: "^1.0.0".to_string(),
        to: "^2.0.0".to_string(),
    }));
}

#[test]
fn test_partial_release_follows_transitive_dependencies() {
    let mut g = graph(&[
        pkg("p", "1.2.0", true, &["q"]),
        pkg("q", "1.2.0", false, &["r"]),
        pkg("r", "1.2.0", false, &[]),
        pkg("unrelated", "1.2.0", false, &[]),
    ]);

    let report = propagate(&mut g, &v("1.2.0"), &v("1.3.0")).unwrap();

    assert_eq!(report.kind, ReleaseKind::Partial);
    for name in ["p", "q", "r"] {
        assert_eq!(version_of(&g, name), "1.3.0");
    }
    assert_eq!(version_of(&g, "unrelated"), "1.2.0");
    assert_eq!(range_of(&g, "q", "r"), "^1.3.0");
}

#[test]
fn test_partial_release_terminates_on_cycles() {
    let mut g = graph(&[
        Pkg {
            name: "a",
            version: "1.0.0",
            changed: true,
            deps: &[],
            peers: &["b"],
        },
        Pkg {
            name: "b",
            version: "1.0.0",
            changed: false,
            deps: &[],
            peers: &["a"],
        },
    ]);

    let mutations = assign_changed(&mut g, &v("1.0.1")).unwrap();

    assert_eq!(mutations.len(), 2);
    assert_eq!(version_of(&g, "a"), "1.0.1");
    assert_eq!(version_of(&g, "b"), "1.0.1");
}

#[test]
fn test_partial_release_without_changes_is_fatal() {
    let mut g = graph(&[pkg("a", "1.0.0", false, &[]), pkg("b", "1.0.0", false, &["a"])]);

    let err = propagate(&mut g, &v("1.0.0"), &v("1.0.1")).unwrap_err();

    assert!(matches!(err, ReleaseError::NoChanges));
    assert_eq!(version_of(&g, "a"), "1.0.0");
    assert_eq!(range_of(&g, "b", "a"), "^1.0.0");
}

#[test]
fn test_package_already_at_target_is_not_revisited() {
    let mut g = graph(&[
        pkg("a", "1.1.0", true, &["b"]),
        pkg("b", "1.0.0", false, &[]),
    ]);

    let mutations = assign_changed(&mut g, &v("1.1.0")).unwrap();

    assert!(mutations.is_empty());
    assert_eq!(version_of(&g, "b"), "1.0.0");
}

#[test]
fn test_range_rewrite_is_idempotent() {
    let mut g = graph(&[pkg("a", "1.0.0", true, &[]), pkg("b", "1.0.0", false, &["a"])]);
    propagate(&mut g, &v("1.0.0"), &v("2.0.0")).unwrap();

    assert!(rewrite_dependency_ranges(&mut g).is_empty());
}

#[test]
fn test_external_dependencies_untouched() {
    let manifest = PackageManifest::parse(
        "packages/plugin/package.json",
        r#"{ "name": "plugin", "version": "1.0.0",
             "dependencies": { "core": "workspace:*", "lodash": "^4.0.0" },
             "peerDependencies": { "@vue/devtools-api": "^6.0.0" } }"#,
    )
    .unwrap();
    let core = PackageManifest::parse(
        "packages/core/package.json",
        r#"{ "name": "core", "version": "1.4.0" }"#,
    )
    .unwrap();
    let mut g = PackageGraph::from_entries([(manifest, false), (core, false)]).unwrap();

    let mutations = rewrite_dependency_ranges(&mut g);

    assert_eq!(mutations.len(), 1);
    let plugin = &g.get("plugin").unwrap().manifest;
    assert_eq!(
        plugin.dependency_range(DependencySection::Dependencies, "core"),
        Some("^1.4.0")
    );
    assert_eq!(
        plugin.dependency_range(DependencySection::Dependencies, "lodash"),
        Some("^4.0.0")
    );
    assert_eq!(
        plugin.dependency_range(DependencySection::PeerDependencies, "@vue/devtools-api"),
        Some("^6.0.0")
    );
}

#[test]
fn test_mutation_display() {
    let bump = Mutation::Version {
        package: "core".to_string(),
        from: "1.0.0".to_string(),
        to: "1.1.0".to_string(),
    };
    let range = Mutation::DependencyRange {
        package: "app".to_string(),
        section: DependencySection::PeerDependencies,
        dependency: "core".to_string(),
        from: "^1.0.0".to_string(),
        to: "^1.1.0".to_string(),
    };

    assert_eq!(bump.to_string(), "core => 1.1.0");
    assert_eq!(range.to_string(), "app -> peerDependencies -> core@^1.1.0");
}

#[test]
fn test_persist_writes_every_manifest() {
    let fixture = WorkspaceFixture::new("1.0.0");
    let core_path = fixture.public_package("core", "1.0.0", &[]);
    let app_path = fixture.public_package("app", "1.0.0", &[("core", "^1.0.0")]);

    let mut g = PackageGraph::from_entries([
        (PackageManifest::load(&core_path).unwrap(), true),
        (PackageManifest::load(&app_path).unwrap(), false),
    ])
    .unwrap();
    propagate(&mut g, &v("1.0.0"), &v("1.1.0")).unwrap();

    let mut root = PackageManifest::load(fixture.root().join("package.json")).unwrap();
    root.set_version(&v("1.1.0"));

    assert_eq!(persist(&g, &[&root]).unwrap(), 3);

    let app = PackageManifest::load(&app_path).unwrap();
    assert_eq!(app.version, v("1.1.0"));
    assert_eq!(
        app.dependency_range(DependencySection::Dependencies, "core"),
        Some("^1.1.0")
    );
    assert_eq!(
        PackageManifest::load(fixture.root().join("package.json"))
            .unwrap()
            .version,
        v("1.1.0")
    );
}
