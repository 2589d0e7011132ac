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

//! The persistent cache layer and its `CMakeCache.txt` file format.

use std::{
    collections::BTreeMap,
    fmt::{Display, Write as _},
    path::Path,
};

use anyhow::{Context, Result};

use crate::{error, log};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEntryType {
    Bool,
    Path,
    FilePath,
    String,
    Internal,
    Static,
    Uninitialized,
}

impl CacheEntryType {
    pub fn parse(s: &str) -> Option<CacheEntryType> {
        Some(match s.to_ascii_uppercase().as_str() {
            "BOOL" => CacheEntryType::Bool,
            "PATH" => CacheEntryType::Path,
            "FILEPATH" => CacheEntryType::FilePath,
            "STRING" => CacheEntryType::String,
            "INTERNAL" => CacheEntryType::Internal,
            "STATIC" => CacheEntryType::Static,
            "UNINITIALIZED" => CacheEntryType::Uninitialized,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CacheEntryType::Bool => "BOOL",
            CacheEntryType::Path => "PATH",
            CacheEntryType::FilePath => "FILEPATH",
            CacheEntryType::String => "STRING",
            CacheEntryType::Internal => "INTERNAL",
            CacheEntryType::Static => "STATIC",
            CacheEntryType::Uninitialized => "UNINITIALIZED",
        }
    }
}

impl Display for CacheEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub value: String,
    pub ty: CacheEntryType,
    pub properties: BTreeMap<String, String>,
}

impl CacheEntry {
    pub fn new(value: &str, ty: CacheEntryType) -> Self {
        CacheEntry {
            value: value.to_string(),
            ty,
            properties: BTreeMap::new(),
        }
    }

    pub fn get_property(&self, prop: &str) -> Option<String> {
        match prop {
            "TYPE" => Some(self.ty.as_str().to_string()),
            "VALUE" => Some(self.value.clone()),
            _ => self.properties.get(prop).cloned(),
        }
    }

    pub fn set_property(&mut self, prop: &str, value: &str) {
        match prop {
            "TYPE" => {
                if let Some(ty) = CacheEntryType::parse(value) {
                    self.ty = ty;
                }
            }
            "VALUE" => self.value = value.to_string(),
            _ => {
                self.properties.insert(prop.to_string(), value.to_string());
            }
        }
    }

    pub fn is_advanced(&self) -> bool {
        self.properties
            .get("ADVANCED")
            .is_some_and(|v| crate::strutil::is_on(v))
    }
}

#[derive(Debug, Default)]
pub struct Cache {
    entries: BTreeMap<String, CacheEntry>,
}

/// Splits a `KEY:TYPE=VALUE` line. The key may be double-quoted, and a
/// single-quoted value keeps its surrounding whitespace.
pub fn parse_entry_line(line: &str) -> Option<(String, CacheEntryType, String)> {
    let (key, rest) = if let Some(quoted) = line.strip_prefix('"') {
        let end = quoted.find('"')?;
        let rest = quoted[end + 1..].strip_prefix(':')?;
        (quoted[..end].to_string(), rest)
    } else {
        let colon = line.find(':')?;
        let eq = line.find('=')?;
        if eq < colon {
            return None;
        }
        (line[..colon].to_string(), &line[colon + 1..])
    };
    let eq = rest.find('=')?;
    let ty = CacheEntryType::parse(rest[..eq].trim())?;
    let mut value = rest[eq + 1..].trim_end_matches(['\r', '\n']);
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        value = &value[1..value.len() - 1];
    }
    if key.is_empty() {
        return None;
    }
    Some((key, ty, value.to_string()))
}

/// Splits `-D` style `NAME[:TYPE]=VALUE`.
pub fn parse_definition(arg: &str) -> Option<(String, Option<CacheEntryType>, String)> {
    if let Some((key, ty, value)) = parse_entry_line(arg) {
        return Some((key, Some(ty), value));
    }
    let (key, value) = arg.split_once('=')?;
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), None, value.to_string()))
}

const PROPERTY_SUFFIXES: &[&str] = &["ADVANCED", "HELPSTRING", "MODIFIED", "STRINGS"];

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut CacheEntry> {
        self.entries.get_mut(key)
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|e| e.value.as_str())
    }

    pub fn set(&mut self, key: &str, value: &str, ty: CacheEntryType, doc: Option<&str>) {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| CacheEntry::new(value, ty));
        entry.value = value.to_string();
        entry.ty = ty;
        if let Some(doc) = doc {
            entry.properties.insert("HELPSTRING".to_string(), doc.to_string());
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CacheEntry)> {
        self.entries.iter()
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut cache = Cache::new();
        let mut help = String::new();
        let mut props: Vec<(String, String, String)> = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim_start();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(h) = line.strip_prefix("//") {
                if !help.is_empty() {
                    help.push('\n');
                }
                help.push_str(h);
                continue;
            }
            let Some((key, ty, value)) = parse_entry_line(line) else {
                error!("Parse error in cache file on line {}: {line}", i + 1);
            };
            let doc = std::mem::take(&mut help);
            if ty == CacheEntryType::Internal
                && let Some((base, suffix)) = key.rsplit_once('-')
                && PROPERTY_SUFFIXES.contains(&suffix)
            {
                props.push((base.to_string(), suffix.to_string(), value));
                continue;
            }
            let mut entry = CacheEntry::new(&value, ty);
            if !doc.is_empty() {
                entry.properties.insert("HELPSTRING".to_string(), doc);
            }
            cache.entries.insert(key, entry);
        }
        for (base, prop, value) in props {
            if let Some(entry) = cache.entries.get_mut(&base) {
                entry.properties.insert(prop, value);
            }
        }
        Ok(cache)
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let cache = Self::parse(&text)
            .with_context(|| format!("while loading {}", path.display()))?;
        log!("loaded {} cache entries from {}", cache.len(), path.display());
        Ok(Some(cache))
    }

    pub fn serialize(&self, build_dir: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# This is the CMakeCache file.");
        let _ = writeln!(out, "# For build in directory: {build_dir}");
        let _ = writeln!(out, "# KEY:TYPE=VALUE");
        let _ = writeln!(out, "# KEY is the name of a variable in the cache.");
        let _ = writeln!(
            out,
            "# TYPE is a hint to GUIs for the type of VALUE, DO NOT EDIT TYPE!."
        );
        let _ = writeln!(out, "# VALUE is the current value for the KEY.\n");
        let _ = writeln!(out, "########################");
        let _ = writeln!(out, "# EXTERNAL cache entries");
        let _ = writeln!(out, "########################\n");
        for (key, entry) in &self.entries {
            if matches!(
                entry.ty,
                CacheEntryType::Internal | CacheEntryType::Static | CacheEntryType::Uninitialized
            ) {
                continue;
            }
            let help = entry
                .properties
                .get("HELPSTRING")
                .map_or("No help, variable specified on the command line.", |s| {
                    s.as_str()
                });
            for h in help.lines() {
                let _ = writeln!(out, "//{h}");
            }
            write_entry(&mut out, key, entry.ty, &entry.value);
            out.push('\n');
        }
        let _ = writeln!(out, "\n########################");
        let _ = writeln!(out, "# INTERNAL cache entries");
        let _ = writeln!(out, "########################\n");
        for (key, entry) in &self.entries {
            for prop in PROPERTY_SUFFIXES {
                if *prop == "HELPSTRING" && entry.ty != CacheEntryType::Internal {
                    continue;
                }
                if let Some(v) = entry.properties.get(*prop) {
                    let _ = writeln!(out, "//{prop} property for variable: {key}");
                    write_entry(
                        &mut out,
                        &format!("{key}-{prop}"),
                        CacheEntryType::Internal,
                        v,
                    );
                }
            }
            if matches!(
                entry.ty,
                CacheEntryType::Internal | CacheEntryType::Static | CacheEntryType::Uninitialized
            ) {
                if let Some(h) = entry.properties.get("HELPSTRING") {
                    for h in h.lines() {
                        let _ = writeln!(out, "//{h}");
                    }
                }
                write_entry(&mut out, key, entry.ty, &entry.value);
            }
        }
        out
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join("CMakeCache.txt");
        let text = self.serialize(&dir.to_string_lossy());
        std::fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))
    }
}

fn write_entry(out: &mut String, key: &str, ty: CacheEntryType, value: &str) {
    let needs_key_quote = key.contains(':') || key.contains('=');
    let needs_value_quote = value.ends_with(char::is_whitespace)
        || value.starts_with(char::is_whitespace)
        || (value.len() >= 2 && value.starts_with('\'') && value.ends_with('\''));
    if needs_key_quote {
        let _ = write!(out, "\"{key}\"");
    } else {
        out.push_str(key);
    }
    let _ = write!(out, ":{ty}=");
    if needs_value_quote {
        let _ = writeln!(out, "'{value}'");
    } else {
        let _ = writeln!(out, "{value}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entry_line() {
        assert_eq!(
            parse_entry_line("FOO:BOOL=ON"),
            Some(("FOO".to_string(), CacheEntryType::Bool, "ON".to_string()))
        );
        assert_eq!(
            parse_entry_line("\"A:B\":STRING=x=y"),
            Some(("A:B".to_string(), CacheEntryType::String, "x=y".to_string()))
        );
        assert_eq!(
            parse_entry_line("S:STRING=' padded '"),
            Some(("S".to_string(), CacheEntryType::String, " padded ".to_string()))
        );
        assert_eq!(parse_entry_line("FOO=1"), None);
        assert_eq!(parse_entry_line("FOO:WHAT=1"), None);
    }

    #[test]
    fn test_parse_definition() {
        assert_eq!(
            parse_definition("X=1"),
            Some(("X".to_string(), None, "1".to_string()))
        );
        assert_eq!(
            parse_definition("X:PATH=/a"),
            Some(("X".to_string(), Some(CacheEntryType::Path), "/a".to_string()))
        );
        assert_eq!(parse_definition("=1"), None);
    }

    #[test]
    fn test_parse_file_with_properties() {
        let text = "# comment\n//Build type\nCMAKE_BUILD_TYPE:STRING=Debug\n\
                    //ADVANCED property for variable: CMAKE_BUILD_TYPE\n\
                    CMAKE_BUILD_TYPE-ADVANCED:INTERNAL=1\nSECRET:INTERNAL=42\n";
        let cache = Cache::parse(text).unwrap();
        let e = cache.get("CMAKE_BUILD_TYPE").unwrap();
        assert_eq!(e.value, "Debug");
        assert_eq!(e.get_property("HELPSTRING").as_deref(), Some("Build type"));
        assert!(e.is_advanced());
        assert_eq!(cache.value("SECRET"), Some("42"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_serialize_then_parse() {
        let mut cache = Cache::new();
        cache.set("OPT", "ON", CacheEntryType::Bool, Some("An option"));
        cache.set("PAD", " x ", CacheEntryType::String, None);
        cache.set("HIDDEN", "1", CacheEntryType::Internal, None);
        cache.get_mut("OPT").unwrap().set_property("ADVANCED", "1");
        let text = cache.serialize("/build");
        let back = Cache::parse(&text).unwrap();
        assert_eq!(back.get("OPT").unwrap().value, "ON");
        assert!(back.get("OPT").unwrap().is_advanced());
        assert_eq!(back.value("PAD"), Some(" x "));
        assert_eq!(back.get("HIDDEN").unwrap().ty, CacheEntryType::Internal);
        assert_eq!(
            back.get("OPT").unwrap().get_property("HELPSTRING").as_deref(),
            Some("An option")
        );
    }

    #[test]
    fn test_parse_error() {
        let err = Cache::parse("GARBAGE\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
