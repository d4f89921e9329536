//! Test: Full package builds
//!
//! - Main and subpackage needs are merged into the build environment
//! - Each subpackage test environment installs the subpackage itself
//! - Subpackage contexts never leak into each other or the main build

use crate::helpers::*;
use pkgpipe::compile::{Build, CompileError};

const PACKAGE: &str = r#"
package:
  name: zlib
  version: 1.3.1
  epoch: 2

environment:
  contents:
    packages: [build-base, busybox]

pipeline:
  - uses: fetch
    with:
      uri: https://zlib.net/zlib-${{package.version}}.tar.gz
      expected-sha256: 9a93b2b7
  - uses: autoconf/configure
  - uses: autoconf/make
  - uses: autoconf/make-install

subpackages:
  - name: zlib-dev
    pipeline:
      - runs: mv ${{targets.destdir}}/usr/include ${{targets.contextdir}}/usr/
    test:
      pipeline:
        - runs: test -f /usr/include/zlib.h

  - name: zlib-static
    pipeline:
      - uses: git-checkout
        with:
          repository: https://github.com/madler/zlib
          tag: v${{package.version}}
      - runs: mv ${{targets.destdir}}/usr/lib/*.a ${{targets.subpkgdir}}/usr/lib/
        needs:
          packages: [findutils]
    test:
      pipeline:
        - runs: ls /usr/lib/libz.a
          needs:
            packages: [coreutils]

test:
  environment:
    contents:
      packages: [zlib-dev]
  pipeline:
    - runs: pkg-config --modversion zlib
      needs:
        packages: [pkgconf]
"#;

/// Build needs are main needs followed by subpackage needs, after the configured packages
#[test]
fn test_build_environment_merge() {
    let out = build(PACKAGE).compile().unwrap();

    assert_eq!(
        build_env(&out.configuration),
        vec![
            "build-base",
            "busybox",
            "wget",
            "busybox",
            "autoconf",
            "automake",
            "make",
            "make",
            "git",
            "findutils",
        ]
    );
    assert_eq!(out.needs.len(), 8);
}

/// Each subpackage test installs its own package, even without needs
#[test]
fn test_subpackage_test_environments() {
    let out = build(PACKAGE).compile().unwrap();

    assert_eq!(subpackage_test_env(&out.configuration, "zlib-dev"), vec!["zlib-dev"]);
    assert_eq!(
        subpackage_test_env(&out.configuration, "zlib-static"),
        vec!["zlib-static", "coreutils"]
    );
}

/// The main test environment gets its needs and then the package itself
#[test]
fn test_main_test_environment() {
    let out = build(PACKAGE).compile().unwrap();

    assert_eq!(test_env(&out.configuration), vec!["zlib-dev", "pkgconf", "zlib"]);
    assert!(!test_env(&out.configuration).contains(&"make"));
}

/// Subpackage steps see their own context directory
#[test]
fn test_subpackage_contexts_are_isolated() {
    let out = build(PACKAGE).compile().unwrap();
    let cfg = &out.configuration;

    assert_eq!(
        cfg.subpackages[0].pipeline[0].runs,
        "mv /home/build/melange-out/zlib/usr/include /home/build/melange-out/zlib-dev/usr/"
    );
    assert_eq!(
        cfg.subpackages[1].pipeline[1].runs,
        "mv /home/build/melange-out/zlib/usr/lib/*.a /home/build/melange-out/zlib-static/usr/lib/"
    );
    assert!(cfg.pipeline[3].runs.contains("DESTDIR=\"/home/build/melange-out/zlib\""));
}

/// References from the main pipeline come before those of subpackages
#[test]
fn test_external_refs_in_order() {
    let out = build(PACKAGE).compile().unwrap();
    let refs: Vec<String> = out.external_refs.iter().map(ToString::to_string).collect();

    assert_eq!(
        refs,
        vec![
            "pkg:generic/zlib-1.3.1.tar.gz?checksum=sha256%3A9a93b2b7&download_url=https%3A%2F%2Fzlib.net%2Fzlib-1.3.1.tar.gz",
            "pkg:github/madler/zlib@v1.3.1",
        ]
    );
}

/// Two compiles of independently loaded configurations agree
#[test]
fn test_build_is_deterministic() {
    let first = build(PACKAGE).compile().unwrap();
    let second = build(PACKAGE).compile().unwrap();
    assert_eq!(first, second);

    // Compiling twice from the same value also agrees.
    let once = build(PACKAGE);
    assert_eq!(once.compile().unwrap(), once.compile().unwrap());
}

/// Build options override variables
#[test]
fn test_build_option_vars() {
    let yaml = r#"
package:
  name: openssl
  version: 3.3.0
vars:
  target: linux-x86_64
options:
  fips:
    vars:
      target: linux-x86_64-fips
pipeline:
  - runs: ./Configure ${{vars.target}}
"#;

    let plain = build(yaml).compile().unwrap();
    assert_eq!(plain.configuration.pipeline[0].runs, "./Configure linux-x86_64");

    let fips = build(yaml)
        .with_build_options(vec!["fips".to_string()])
        .compile()
        .unwrap();
    assert_eq!(fips.configuration.pipeline[0].runs, "./Configure linux-x86_64-fips");
}

/// Enabling an option the package does not declare fails up front
#[test]
fn test_unknown_build_option() {
    let err = build("package:\n  name: x\n")
        .with_build_options(vec!["nope".to_string()])
        .compile()
        .unwrap_err();
    assert!(matches!(err, CompileError::SubstitutionMap(_)));
}

/// Flavor feeds the host triplet
#[test]
fn test_musl_flavor() {
    let yaml = r#"
package:
  name: x
  version: "1"
pipeline:
  - uses: autoconf/configure
"#;
    let out = Build::new(config(yaml), "aarch64")
        .with_flavor("musl")
        .compile()
        .unwrap();
    assert!(out.configuration.pipeline[0]
        .runs
        .contains("--host=aarch64-unknown-linux-musl"));
}

/// A failing main pipeline names the phase and step
#[test]
fn test_main_pipeline_error_path() {
    let yaml = r#"
package:
  name: x
pipeline:
  - runs: ok
  - uses: fetch
"#;
    let err = build(yaml).compile().unwrap_err();
    let msg = err.to_string();
    assert!(msg.starts_with("compiling main pipelines: compiling pipeline[1] (fetch)"), "{}", msg);
}
