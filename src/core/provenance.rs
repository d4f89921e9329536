//! Package-URL references for externally fetched sources

use crate::core::substitution::input_token;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;
use percent_encoding::percent_decode_str;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProvenanceError {
    #[error("parsing uri {uri:?}: {message}")]
    InvalidUri { uri: String, message: String },
}

/// A package URL: `pkg:<type>/<namespace>/<name>@<version>?<qualifiers>`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageUrl {
    pub ty: String,
    pub namespace: String,
    pub name: String,
    pub version: String,
    pub qualifiers: BTreeMap<String, String>,
}

impl PackageUrl {
    pub fn new(ty: &str, namespace: &str, name: &str, version: &str) -> Self {
        Self {
            ty: ty.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            qualifiers: BTreeMap::new(),
        }
    }

    pub fn with_qualifier(mut self, key: &str, value: &str) -> Self {
        self.qualifiers.insert(key.to_string(), value.to_string());
        self
    }
}

impl fmt::Display for PackageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pkg:{}/", self.ty)?;
        if !self.namespace.is_empty() {
            write!(f, "{}/", self.namespace)?;
        }
        write!(f, "{}", self.name)?;
        if !self.version.is_empty() {
            write!(f, "@{}", self.version)?;
        }

        let mut sep = '?';
        for (k, v) in &self.qualifiers {
            let escaped: String = url::form_urlencoded::byte_serialize(v.as_bytes()).collect();
            write!(f, "{}{}={}", sep, k, escaped)?;
            sep = '&';
        }
        Ok(())
    }
}

impl Serialize for PackageUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// References for a resolved step, given its template name and mutated parameters
pub fn compute_external_refs(
    uses: &str,
    with: &HashMap<String, String>,
) -> Result<Vec<PackageUrl>, ProvenanceError> {
    let input = |name: &str| input_value(with, name);

    match uses {
        "fetch" => {
            let uri = input("uri");
            let parsed = Url::parse(uri).map_err(|e| ProvenanceError::InvalidUri {
                uri: uri.to_string(),
                message: e.to_string(),
            })?;
            let filename = parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|s| !s.is_empty())
                .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
                .unwrap_or_else(|| parsed.host_str().unwrap_or(uri).to_string());

            let mut purl = PackageUrl::new("generic", "", &filename, "")
                .with_qualifier("download_url", uri);
            if !input("expected-sha256").is_empty() {
                purl = purl.with_qualifier("checksum", &format!("sha256:{}", input("expected-sha256")));
            }
            if !input("expected-sha512").is_empty() {
                purl = purl.with_qualifier("checksum", &format!("sha512:{}", input("expected-sha512")));
            }
            Ok(vec![purl])
        }
        "git-checkout" => {
            let repo = input("repository");
            let tag = input("tag");
            let commit = input("expected-commit");

            if let Some(path) = repo.strip_prefix("https://github.com/") {
                let (namespace, name) = path.split_once('/').unwrap_or(("", path));
                let name = name.trim_end_matches('/').trim_end_matches(".git");
                let version = if tag.is_empty() { commit } else { tag };
                return Ok(vec![PackageUrl::new("github", namespace, name, version)]);
            }

            let name = repo
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or(repo)
                .trim_end_matches(".git");
            let version = if commit.is_empty() { tag } else { commit };
            let vcs_url = if version.is_empty() {
                format!("git+{}", repo)
            } else {
                format!("git+{}@{}", repo, version)
            };
            let purl = PackageUrl::new("generic", "", name, version).with_qualifier("vcs_url", &vcs_url);
            Ok(vec![purl])
        }
        _ => Ok(Vec::new()),
    }
}

fn input_value<'a>(with: &'a HashMap<String, String>, name: &str) -> &'a str {
    with.get(&input_token(name)).map(String::as_str).unwrap_or("")
}
