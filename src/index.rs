//! Index artifact loading.
//!
//! The artifact is produced by an external indexing tool. It is a versioned
//! JSON document holding every symbol definition and every reference
//! occurrence of one codebase snapshot:
//!
//! ```json
//! {
//!   "version": 1,
//!   "symbols": [
//!     { "id": "pkg.parse", "name": "parse", "kind": "function", "path": "pkg/parse.py" }
//!   ],
//!   "references": [
//!     { "source": "pkg.main", "target": "pkg.parse", "kind": "calls" }
//!   ]
//! }
//! ```
//!
//! Loading only checks structure. Resolving references against symbols is the
//! symbol graph's job.

use crate::error::{IndexError, IndexResult};
use crate::types::{Location, Range, RelationKind, Symbol, SymbolId, SymbolKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Newest artifact format this crate understands
pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexArtifact {
    pub version: u32,
    #[serde(default)]
    pub symbols: Vec<SymbolRecord>,
    #[serde(default)]
    pub references: Vec<ReferenceRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub id: String,
    pub name: String,
    pub kind: SymbolKind,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// A reference occurrence. Either endpoint may name a symbol that is not part
/// of the index (external libraries, unindexed files).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub source: String,
    pub target: String,
    pub kind: RelationKind,
}

/// Parsed artifact contents: validated symbols plus raw reference records.
#[derive(Debug, Clone, Default)]
pub struct RawIndex {
    pub symbols: Vec<Symbol>,
    pub references: Vec<ReferenceRecord>,
}

impl IndexArtifact {
    pub fn new(symbols: Vec<SymbolRecord>, references: Vec<ReferenceRecord>) -> Self {
        Self {
            version: CURRENT_VERSION,
            symbols,
            references,
        }
    }

    /// Serialize to the on-disk JSON form.
    pub fn to_bytes(&self) -> IndexResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

impl SymbolRecord {
    fn into_symbol(self) -> IndexResult<Symbol> {
        let id = SymbolId::new(self.id).ok_or_else(|| IndexError::Corrupted {
            reason: format!("symbol '{}' has an empty id", self.name),
        })?;

        Ok(Symbol {
            id,
            name: self.name,
            kind: self.kind,
            location: Location {
                path: normalize_path(&self.path),
                range: self.range.unwrap_or_default(),
            },
            signature: self.signature,
        })
    }
}

impl From<&Symbol> for SymbolRecord {
    fn from(symbol: &Symbol) -> Self {
        Self {
            id: symbol.id.to_string(),
            name: symbol.name.clone(),
            kind: symbol.kind,
            path: symbol.location.path.clone(),
            range: Some(symbol.location.range),
            signature: symbol.signature.clone(),
        }
    }
}

/// Parse artifact bytes into symbols and reference records.
pub fn parse(bytes: &[u8]) -> IndexResult<RawIndex> {
    let artifact: IndexArtifact = serde_json::from_slice(bytes)?;

    if artifact.version > CURRENT_VERSION {
        return Err(IndexError::UnsupportedVersion {
            found: artifact.version,
            supported: CURRENT_VERSION,
        });
    }

    let mut seen: HashSet<SymbolId> = HashSet::with_capacity(artifact.symbols.len());
    let mut symbols = Vec::with_capacity(artifact.symbols.len());
    for record in artifact.symbols {
        let symbol = record.into_symbol()?;
        if !seen.insert(symbol.id.clone()) {
            return Err(IndexError::Corrupted {
                reason: format!("duplicate symbol id '{}'", symbol.id),
            });
        }
        symbols.push(symbol);
    }

    Ok(RawIndex {
        symbols,
        references: artifact.references,
    })
}

/// Read and parse an artifact from disk.
pub fn load(path: &Path) -> IndexResult<RawIndex> {
    let bytes = std::fs::read(path).map_err(|source| IndexError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&bytes)
}

fn normalize_path(path: &str) -> String {
    path.trim().replace('\\', "/").trim_start_matches('/').to_string()
}
