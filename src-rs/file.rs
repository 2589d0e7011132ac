/*
Copyright 2025 Google LLC

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

     https://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;

use crate::{
    loc::Loc,
    parser::{parse_buf, parse_file},
    stmt::Stmt,
    symtab::{Symbol, intern},
};

/// A parsed list file.
pub struct ListFile {
    pub filename: Symbol,
    pub stmts: Vec<Stmt>,
}

impl ListFile {
    pub fn from_file(filename: &str) -> Result<Option<Arc<ListFile>>> {
        if !std::path::Path::new(filename).is_file() {
            return Ok(None);
        }

        let buf = Bytes::from(
            std::fs::read(filename).with_context(|| format!("Error reading file {filename}"))?,
        );

        let filename = intern(filename);
        let stmts = parse_file(&buf, filename)?;

        Ok(Some(Arc::new(ListFile { filename, stmts })))
    }

    /// Parses script text that does not live on disk. `name` is used for
    /// locations in diagnostics.
    pub fn from_text(name: &str, text: &str) -> Result<Arc<ListFile>> {
        let buf = Bytes::copy_from_slice(text.as_bytes());
        let loc = Loc::new(name, 1);
        let stmts = parse_buf(&buf, loc)?;
        Ok(Arc::new(ListFile {
            filename: loc.filename,
            stmts,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CMakeLists.txt");
        std::fs::write(&path, "project(x)\nmessage(STATUS hi)\n").unwrap();
        let path = path.to_string_lossy().into_owned();
        let lf = ListFile::from_file(&path).unwrap().unwrap();
        assert_eq!(lf.stmts.len(), 2);
        assert_eq!(lf.stmts[1].line(), 2);
        assert_eq!(&*lf.filename.as_str(), path.as_str());
    }

    #[test]
    fn test_missing_file() {
        assert!(ListFile::from_file("/nonexistent/CMakeLists.txt").unwrap().is_none());
    }
}
