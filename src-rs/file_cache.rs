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

//! Parsed list files, shared between every `include()` of the same path.
//! An entry is reparsed when the file's size or modification time changes.

use std::{
    collections::HashMap,
    sync::{Arc, LazyLock},
    time::SystemTime,
};

use anyhow::Result;
use parking_lot::Mutex;

use crate::file::ListFile;

static CACHE: LazyLock<Mutex<ListFileCacheManager>> = LazyLock::new(|| {
    Mutex::new(ListFileCacheManager {
        cache: HashMap::new(),
    })
});

#[derive(Clone, Copy, PartialEq, Eq)]
struct Stamp {
    len: u64,
    mtime: Option<SystemTime>,
}

fn stamp(filename: &str) -> Option<Stamp> {
    let md = std::fs::metadata(filename).ok()?;
    Some(Stamp {
        len: md.len(),
        mtime: md.modified().ok(),
    })
}

struct ListFileCacheManager {
    cache: HashMap<String, (Stamp, Arc<ListFile>)>,
}

impl ListFileCacheManager {
    fn get_list_file(&mut self, filename: &str) -> Result<Option<Arc<ListFile>>> {
        let Some(st) = stamp(filename) else {
            return Ok(None);
        };
        if let Some((cached, lf)) = self.cache.get(filename) {
            if *cached == st {
                return Ok(Some(lf.clone()));
            }
        }
        let lf = ListFile::from_file(filename)?;
        if let Some(lf) = &lf {
            self.cache.insert(filename.to_string(), (st, lf.clone()));
        }
        Ok(lf)
    }
}

/// Returns None when the file does not exist.
pub fn get_list_file(filename: &str) -> Result<Option<Arc<ListFile>>> {
    CACHE.lock().get_list_file(filename)
}

pub fn cached_file_count() -> usize {
    CACHE.lock().cache.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reparse_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.cmake");
        std::fs::write(&path, "set(a 1)\n").unwrap();
        let path = path.to_string_lossy().into_owned();
        let first = get_list_file(&path).unwrap().unwrap();
        let again = get_list_file(&path).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        std::fs::write(&path, "set(a 1)\nset(b 2)\n").unwrap();
        let changed = get_list_file(&path).unwrap().unwrap();
        assert_eq!(changed.stmts.len(), 2);
    }
}
