//! Test: Conditional steps and dependency gathering
//!
//! - A step whose condition is false contributes no needs
//! - Nothing nested under a disabled step contributes needs either
//! - Steps without a condition always contribute

use crate::helpers::*;
use pkgpipe::compile::CompileError;
use pkgpipe::core::SubstitutionMap;

/// Sibling steps: only the enabled one contributes
#[test]
fn test_disabled_sibling_is_skipped() {
    let sm = SubstitutionMap::from_pairs([("opt.gnu", "false")]);
    let input = steps(
        r#"
- if: ${{opt.gnu}} == 'true'
  runs: ./build-with-gcc
  needs:
    packages: [gcc]
- runs: make
  needs:
    packages: [make]
"#,
    );

    let mut c = builtin_compiled();
    let out = c.compile_pipelines(&sm, &input).unwrap();

    assert_eq!(c.needs, vec!["make"]);
    assert_eq!(out[0].condition.as_deref(), Some("'false' == 'true'"));
}

/// The same steps with the option switched on contribute both packages
#[test]
fn test_enabled_sibling_contributes() {
    let sm = SubstitutionMap::from_pairs([("opt.gnu", "true")]);
    let input = steps(
        r#"
- if: ${{opt.gnu}} == 'true'
  needs:
    packages: [gcc]
- needs:
    packages: [make]
"#,
    );

    let mut c = builtin_compiled();
    c.compile_pipelines(&sm, &input).unwrap();
    assert_eq!(c.needs, vec!["gcc", "make"]);
}

/// Build options toggle steps through `options.<name>.enabled`
#[test]
fn test_build_option_toggles_step() {
    let yaml = r#"
package:
  name: curl
  version: 8.0.0
options:
  http3:
    environment:
      contents:
        packages: [nghttp3]
pipeline:
  - if: ${{options.http3.enabled}} == 'true'
    runs: ./configure --with-nghttp3
    needs:
      packages: [ngtcp2]
  - runs: make
"#;

    let off = build(yaml).compile().unwrap();
    assert!(!off.needs.contains(&"ngtcp2".to_string()));
    assert!(!build_env(&off.configuration).contains(&"nghttp3"));

    let on = build(yaml)
        .with_build_options(vec!["http3".to_string()])
        .compile()
        .unwrap();
    assert!(on.needs.contains(&"ngtcp2".to_string()));
    assert!(build_env(&on.configuration).contains(&"nghttp3"));
}

/// A disabled parent prunes its whole subtree, even enabled children
#[test]
fn test_disabled_parent_prunes_children() {
    let sm = context("pkg", "1.0");
    let input = steps(
        r#"
- if: ${{build.arch}} == 'riscv64'
  needs:
    packages: [qemu-riscv64]
  pipeline:
    - needs:
        packages: [binfmt]
    - if: "true"
      needs:
        packages: [always]
- runs: echo done
"#,
    );

    let mut c = builtin_compiled();
    c.compile_pipelines(&sm, &input).unwrap();
    assert!(c.needs.is_empty());
}

/// Disabled steps still report where their sources come from
#[test]
fn test_disabled_fetch_still_yields_reference() {
    let sm = context("pkg", "1.0");
    let input = steps(
        r#"
- if: ${{build.arch}} == 'aarch64'
  uses: fetch
  with:
    uri: https://example.com/pkg-1.0.tar.gz
    expected-sha256: beef
"#,
    );

    let mut c = builtin_compiled();
    c.compile_pipelines(&sm, &input).unwrap();
    assert!(c.needs.is_empty());
    assert_eq!(c.external_refs.len(), 1);
    assert_eq!(c.external_refs[0].name, "pkg-1.0.tar.gz");
}

/// Condition text that is not an expression fails needs gathering
#[test]
fn test_unparseable_condition() {
    let sm = SubstitutionMap::from_pairs([("opt.gnu", "maybe")]);
    let input = steps("- if: ${{opt.gnu}} ==\n  runs: x\n");

    let mut c = builtin_compiled();
    let err = c.compile_pipelines(&sm, &input).unwrap_err();
    assert!(err.to_string().starts_with("gathering deps for pipeline[0]"), "{}", err);
    assert!(matches!(err.root_cause(), CompileError::Condition { .. }));
}
