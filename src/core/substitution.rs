//! Variable substitution for pipeline text
//!
//! Tokens look like `${{package.version}}` or `${{inputs.uri}}`. A substitution
//! table is keyed by the canonical token text, so `${{inputs.name}}` and a
//! global `${{name}}` never collide.

use crate::core::config::{Configuration, Subpackage};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

const OPEN: &str = "${{";
const CLOSE: &str = "}}";

/// Upper bound on chained references between parameter values
const MAX_RESOLVE_PASSES: usize = 16;

/// Root of all build output inside the build guest
pub const OUT_DIR: &str = "/home/build/melange-out";

/// Where sources are unpacked and built
pub const SRC_DIR: &str = "/home/build";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubstitutionError {
    #[error("variable {key} not defined")]
    Undefined { key: String },

    #[error("{key} still refers to other variables after substitution (cyclic reference?)")]
    Unresolved { key: String },

    #[error("unterminated substitution in {text:?}")]
    Malformed { text: String },

    #[error("build option {0:?} is not declared")]
    UnknownOption(String),

    #[error("var-transform for {to:?}: invalid match expression: {message}")]
    InvalidTransform { to: String, message: String },
}

/// Canonical token for a key, e.g. `package.name` -> `${{package.name}}`
pub fn token(key: &str) -> String {
    format!("{}{}{}", OPEN, key, CLOSE)
}

/// Token for a step input, e.g. `uri` -> `${{inputs.uri}}`
pub fn input_token(name: &str) -> String {
    token(&format!("inputs.{}", name))
}

/// Whether a key is already a full token rather than a bare parameter name
pub fn is_token(key: &str) -> bool {
    key.starts_with(OPEN) && key.ends_with(CLOSE)
}

/// Replace every token in `text` with its value from `map`
pub fn substitute(map: &HashMap<String, String>, text: &str) -> Result<String, SubstitutionError> {
    replace_tokens(map, text, |value| value.to_string())
}

/// Like [`substitute`], but every value is emitted as a single-quoted literal.
///
/// Used for condition expressions so that substituted values are always read
/// as strings, whatever characters they contain.
pub fn substitute_and_quote(
    map: &HashMap<String, String>,
    text: &str,
) -> Result<String, SubstitutionError> {
    replace_tokens(map, text, quote)
}

fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('\'');
    quoted
}

fn replace_tokens<F>(
    map: &HashMap<String, String>,
    text: &str,
    render: F,
) -> Result<String, SubstitutionError>
where
    F: Fn(&str) -> String,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        let end = after.find(CLOSE).ok_or_else(|| SubstitutionError::Malformed {
            text: text.to_string(),
        })?;

        let key = after[..end].trim();
        let value = map
            .get(&token(key))
            .ok_or_else(|| SubstitutionError::Undefined { key: token(key) })?;
        out.push_str(&render(value));

        rest = &after[end + CLOSE.len()..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Every entry of `base` plus every entry of `overrides`; `overrides` wins
pub fn right_join<K, V>(base: &HashMap<K, V>, overrides: &BTreeMap<K, V>) -> BTreeMap<K, V>
where
    K: Clone + Ord + std::hash::Hash,
    V: Clone,
{
    let mut joined: BTreeMap<K, V> = base.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    joined.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    joined
}

/// Global variables known to one build context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionMap {
    substitutions: HashMap<String, String>,
}

impl SubstitutionMap {
    /// Build the global table for a package, architecture and build flavor
    pub fn new(
        cfg: &Configuration,
        arch: &str,
        flavor: &str,
        enabled_options: &[String],
    ) -> Result<Self, SubstitutionError> {
        for opt in enabled_options {
            if !cfg.options.contains_key(opt) {
                return Err(SubstitutionError::UnknownOption(opt.clone()));
            }
        }

        let pkg = &cfg.package;
        let destdir = format!("{}/{}", OUT_DIR, pkg.name);

        let mut subs: HashMap<String, String> = [
            ("package.name", pkg.name.clone()),
            ("package.version", pkg.version.clone()),
            ("package.epoch", pkg.epoch.to_string()),
            ("package.full-version", pkg.full_version()),
            ("package.description", pkg.description.clone()),
            ("package.srcdir", SRC_DIR.to_string()),
            ("targets.outdir", OUT_DIR.to_string()),
            ("targets.destdir", destdir.clone()),
            ("targets.contextdir", destdir),
            ("context.name", pkg.name.clone()),
            ("build.arch", arch.to_string()),
            ("build.goarch", go_arch(arch).to_string()),
            ("build.flavor", flavor.to_string()),
            ("host.triplet.gnu", triplet(arch, flavor)),
            ("host.triplet.rust", rust_triplet(arch, flavor)),
            ("cross.triplet.gnu.glibc", triplet(arch, "gnu")),
            ("cross.triplet.gnu.musl", triplet(arch, "musl")),
        ]
        .into_iter()
        .map(|(k, v)| (token(k), v))
        .collect();

        let mut vars = cfg.vars.clone();
        for opt in enabled_options {
            if let Some(option) = cfg.options.get(opt) {
                vars.extend(option.vars.clone());
            }
        }
        for (name, value) in &vars {
            let value = substitute(&subs, value)?;
            subs.insert(token(&format!("vars.{}", name)), value);
        }

        for vt in &cfg.var_transforms {
            let from = substitute(&subs, &vt.from)?;
            let re = Regex::new(&vt.match_).map_err(|e| SubstitutionError::InvalidTransform {
                to: vt.to.clone(),
                message: e.to_string(),
            })?;
            let output = re.replace_all(&from, vt.replace.as_str()).into_owned();
            debug!("var-transform {} -> {}", vt.to, output);
            subs.insert(token(&format!("vars.{}", vt.to)), output);
        }

        for name in cfg.options.keys() {
            let enabled = enabled_options.iter().any(|o| o == name);
            subs.insert(
                token(&format!("options.{}.enabled", name)),
                enabled.to_string(),
            );
        }

        Ok(Self { substitutions: subs })
    }

    /// Build a table from raw `key -> value` pairs (keys without the token braces)
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            substitutions: pairs
                .into_iter()
                .map(|(k, v)| (token(k.as_ref()), v.into()))
                .collect(),
        }
    }

    /// Derive the table for a subpackage; `self` is left untouched
    pub fn subpackage(&self, sp: &Subpackage) -> Self {
        let mut subs = self.substitutions.clone();
        let subpkgdir = format!("{}/{}", OUT_DIR, sp.name);

        subs.insert(token("subpkg.name"), sp.name.clone());
        subs.insert(token("context.name"), sp.name.clone());
        subs.insert(token("targets.subpkgdir"), subpkgdir.clone());
        subs.insert(token("targets.contextdir"), subpkgdir);

        Self { substitutions: subs }
    }

    /// Look up a variable by bare key, e.g. `package.name`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.substitutions.get(&token(key)).map(String::as_str)
    }

    pub fn substitutions(&self) -> &HashMap<String, String> {
        &self.substitutions
    }

    /// Combine step parameters with the global table.
    ///
    /// Bare parameter names become `${{inputs.<name>}}`; keys that are already
    /// tokens (inherited from an enclosing step) are kept as they are. Bare
    /// names are applied last so a step's own input shadows an inherited one.
    /// Parameter values may reference global variables and each other; a
    /// reference that never resolves is an error.
    pub fn mutate_with(
        &self,
        with: &BTreeMap<String, String>,
    ) -> Result<HashMap<String, String>, SubstitutionError> {
        let mut mutated = self.substitutions.clone();

        let (inherited, own): (Vec<_>, Vec<_>) = with.iter().partition(|(k, _)| is_token(k));
        for (k, v) in inherited {
            mutated.insert(k.clone(), v.clone());
        }
        for (k, v) in own {
            mutated.insert(input_token(k), v.clone());
        }

        // Values may refer to other values, so resolve until nothing changes.
        for _ in 0..MAX_RESOLVE_PASSES {
            let snapshot = mutated.clone();
            let mut changed = false;
            for value in mutated.values_mut() {
                if value.contains(OPEN) {
                    let resolved = substitute(&snapshot, value)?;
                    changed |= resolved != *value;
                    *value = resolved;
                }
            }
            if !changed {
                break;
            }
        }

        let mut unresolved: Vec<&String> = mutated
            .iter()
            .filter(|(_, v)| v.contains(OPEN))
            .map(|(k, _)| k)
            .collect();
        unresolved.sort();
        if let Some(key) = unresolved.first() {
            return Err(SubstitutionError::Unresolved {
                key: key.to_string(),
            });
        }

        Ok(mutated)
    }
}

fn go_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "armv7" | "armhf" => "arm",
        "x86" | "386" => "386",
        other => other,
    }
}

fn triplet(arch: &str, flavor: &str) -> String {
    match arch {
        "x86_64" => format!("x86_64-pc-linux-{}", flavor),
        "armv7" => format!("armv7-unknown-linux-{}eabihf", flavor),
        "x86" | "386" => format!("i686-pc-linux-{}", flavor),
        other => format!("{}-unknown-linux-{}", other, flavor),
    }
}

fn rust_triplet(arch: &str, flavor: &str) -> String {
    match arch {
        "armv7" => format!("armv7-unknown-linux-{}eabihf", flavor),
        "x86" | "386" => format!("i686-unknown-linux-{}", flavor),
        other => format!("{}-unknown-linux-{}", other, flavor),
    }
}
