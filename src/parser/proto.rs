//! Proto import extraction.
//!
//! `import "a/b/c.proto";` refers to the `c_proto` target in package `a/b`.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::import::RawImport;

/// Suffix appended to proto file stems to name their `proto_library` target.
pub const PROTO_TARGET_SUFFIX: &str = "_proto";

static BLOCK_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid comment regex"));

static PROTO_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^([^\n]*?)\bimport\s+(?:public\s+|weak\s+)?"([^"]+)\.proto""#)
        .expect("valid proto import regex")
});

/// Extract imports from a proto definition.
pub fn extract_imports(source: &str) -> Vec<RawImport> {
    let source = BLOCK_COMMENT_RE.replace_all(source, " ");
    let mut imports = Vec::new();

    for caps in PROTO_IMPORT_RE.captures_iter(&source) {
        let prefix = caps.get(1).map_or("", |m| m.as_str());
        if prefix.contains("//") {
            continue;
        }

        let path = caps.get(2).map_or("", |m| m.as_str());
        let (dir, stem) = match path.rsplit_once('/') {
            Some((dir, stem)) => (dir, stem),
            None => ("", path),
        };

        imports.push(RawImport::from(
            dir.replace('/', "."),
            format!("{}{}", stem, PROTO_TARGET_SUFFIX),
        ));
    }

    imports
}
