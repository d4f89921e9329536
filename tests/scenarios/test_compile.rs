//! Test: Standalone test compilation
//!
//! - Test environments never inherit build-time needs
//! - The package under test can be overridden
//! - Build pipelines are still compiled, so a broken build pipeline fails

use crate::helpers::*;
use pkgpipe::compile::{CompileError, ValidationError};

const PACKAGE: &str = r#"
package:
  name: jq
  version: "1.7"

pipeline:
  - uses: git-checkout
    with:
      repository: https://github.com/jqlang/jq
      tag: jq-${{package.version}}
  - uses: autoconf/make

subpackages:
  - name: jq-doc
    pipeline:
      - runs: mkdir -p ${{targets.subpkgdir}}/usr/share
        needs:
          packages: [pandoc]
    test:
      pipeline:
        - runs: man -w ${{subpkg.name}}
          needs:
            packages: [man-db]

test:
  environment:
    contents:
      packages: [bash]
  pipeline:
    - runs: jq --version | grep ${{package.version}}
      needs:
        packages: [grep]
"#;

/// The package comes first in the main test environment, then the test needs
#[test]
fn test_main_test_environment() {
    let out = test(PACKAGE).compile().unwrap();

    assert_eq!(out.needs, vec!["grep"]);
    assert_eq!(test_env(&out.configuration), vec!["bash", "jq", "grep"]);
}

/// No build-time package reaches any test environment
#[test]
fn test_build_needs_stay_out() {
    let out = test(PACKAGE).compile().unwrap();
    let cfg = &out.configuration;

    for build_only in ["git", "make", "pandoc"] {
        assert!(!test_env(cfg).contains(&build_only), "{} leaked", build_only);
        assert!(!subpackage_test_env(cfg, "jq-doc").contains(&build_only), "{} leaked", build_only);
        assert!(!build_env(cfg).contains(&build_only), "{} leaked", build_only);
    }
    assert_eq!(subpackage_test_env(cfg, "jq-doc"), vec!["jq-doc", "man-db"]);
}

/// Test steps are substituted in their own context
#[test]
fn test_steps_are_substituted() {
    let out = test(PACKAGE).compile().unwrap();
    let cfg = &out.configuration;

    assert_eq!(cfg.test.as_ref().unwrap().pipeline[0].runs, "jq --version | grep 1.7");
    assert_eq!(
        cfg.subpackages[0].test.as_ref().unwrap().pipeline[0].runs,
        "man -w jq-doc"
    );
    assert_eq!(cfg.pipeline[0].with["tag"], "jq-1.7");
}

/// An explicit package replaces the configured one under test
#[test]
fn test_package_override() {
    let out = test(PACKAGE)
        .with_package(Some("jq-nightly".to_string()))
        .compile()
        .unwrap();

    assert_eq!(test_env(&out.configuration), vec!["bash", "jq-nightly", "grep"]);
    assert_eq!(subpackage_test_env(&out.configuration, "jq-doc"), vec!["jq-doc", "man-db"]);
}

/// A package without a test section still gets a test environment with itself
#[test]
fn test_missing_test_section() {
    let out = test("package:\n  name: tiny\n  version: \"0.1\"\n").compile().unwrap();
    assert!(out.needs.is_empty());
    assert_eq!(test_env(&out.configuration), vec!["tiny"]);
}

/// Build pipelines are compiled too, so their errors fail the test compile
#[test]
fn test_broken_build_pipeline_fails() {
    let yaml = r#"
package:
  name: jq
pipeline:
  - uses: git-checkout
test:
  pipeline:
    - runs: jq --version
"#;
    let err = test(yaml).compile().unwrap_err();

    assert!(err.to_string().starts_with("compiling main pipelines"), "{}", err);
    assert!(matches!(
        err.root_cause(),
        CompileError::Validation(ValidationError::MissingInput(k)) if k == "repository"
    ));
}
