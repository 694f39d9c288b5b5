//! JSON Lines document loader.

use core_types::{BuildError, BuildResult, Document};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// Read `{slug, title?, text}` records, skipping blank lines. A missing file
/// counts as empty input.
pub fn load_documents(path: &Path) -> BuildResult<Vec<Document>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "input file not found; run the site build first to emit JSONL");
            return Ok(Vec::new());
        }
        Err(err) => return Err(err.into()),
    };

    let mut docs = Vec::new();
    let mut seen = HashSet::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let doc: Document =
            serde_json::from_str(trimmed).map_err(|e| BuildError::InvalidInput {
                line: idx + 1,
                reason: e.to_string(),
            })?;
        if doc.slug.trim().is_empty() {
            return Err(BuildError::InvalidInput {
                line: idx + 1,
                reason: "empty slug".to_string(),
            });
        }
        if !seen.insert(doc.slug.clone()) {
            warn!(slug = %doc.slug, line = idx + 1, "duplicate slug in input");
        }
        docs.push(doc);
    }

    info!(path = %path.display(), documents = docs.len(), "loaded input documents");
    Ok(docs)
}
