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

//! `find_program`, `find_library`, `find_path` and `find_file`.

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;

use crate::cache::CacheEntryType;
use crate::eval::{Evaluator, ExecutionStatus};
use crate::message::MessageType;
use crate::stmt::{ExpandedArgument, argument_values};
use crate::strutil::{collapse_full_path, is_full_path, is_not_found};
use crate::{error, log};

static LISTED_DIR_COUNT: AtomicUsize = AtomicUsize::new(0);

pub fn listed_dir_count() -> usize {
    LISTED_DIR_COUNT.load(Ordering::Relaxed)
}

/// Directory listings read during one run. Each directory is read at most
/// once; a directory that cannot be read lists as empty.
#[derive(Debug, Default)]
pub struct DirectoryContentCache {
    dirs: HashMap<String, Vec<String>>,
}

impl DirectoryContentCache {
    pub fn list(&mut self, dir: &str) -> &[String] {
        self.dirs.entry(dir.to_string()).or_insert_with(|| {
            LISTED_DIR_COUNT.fetch_add(1, Ordering::Relaxed);
            log!("listing {dir}");
            let mut names: Vec<String> = std::fs::read_dir(dir)
                .map(|entries| {
                    entries
                        .filter_map(|e| e.ok())
                        .filter_map(|e| e.file_name().into_string().ok())
                        .collect()
                })
                .unwrap_or_default();
            names.sort();
            names
        })
    }

    pub fn contains(&mut self, dir: &str, name: &str) -> bool {
        self.list(dir).binary_search_by(|n| n.as_str().cmp(name)).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FindKind {
    Program,
    Library,
    Path,
    File,
}

impl FindKind {
    fn command_name(self) -> &'static str {
        match self {
            FindKind::Program => "find_program",
            FindKind::Library => "find_library",
            FindKind::Path => "find_path",
            FindKind::File => "find_file",
        }
    }

    fn cache_type(self) -> CacheEntryType {
        match self {
            FindKind::Path => CacheEntryType::Path,
            _ => CacheEntryType::FilePath,
        }
    }

    fn default_doc(self) -> &'static str {
        match self {
            FindKind::Program => "Path to a program.",
            FindKind::Library => "Path to a library.",
            FindKind::Path | FindKind::File => "Path to a file.",
        }
    }

    /// Subdirectories searched below each installation prefix.
    fn prefix_subdirs(self) -> &'static [&'static str] {
        match self {
            FindKind::Program => &["bin", "sbin"],
            FindKind::Library => &["lib"],
            FindKind::Path | FindKind::File => &["include"],
        }
    }

    /// The variable holding extra directories for this kind of search.
    fn extra_path_variable(self) -> &'static str {
        match self {
            FindKind::Program => "CMAKE_PROGRAM_PATH",
            FindKind::Library => "CMAKE_LIBRARY_PATH",
            FindKind::Path | FindKind::File => "CMAKE_INCLUDE_PATH",
        }
    }
}

#[derive(Debug, Default)]
struct FindRequest {
    var: String,
    names: Vec<String>,
    hints: Vec<String>,
    paths: Vec<String>,
    suffixes: Vec<String>,
    doc: Option<String>,
    names_per_dir: bool,
    no_default_path: bool,
    no_cmake_path: bool,
    no_cmake_environment_path: bool,
    no_system_environment_path: bool,
    no_cmake_system_path: bool,
    required: bool,
}

#[derive(Clone, Copy)]
enum Section {
    Names,
    Hints,
    Paths,
    Suffixes,
    Doc,
    None,
}

fn parse_request(args: &[String]) -> Result<FindRequest> {
    if args.len() < 2 {
        error!("called with incorrect number of arguments");
    }
    let mut req = FindRequest {
        var: args[0].clone(),
        ..Default::default()
    };
    let rest = &args[1..];
    const KEYWORDS: &[&str] = &[
        "NAMES",
        "NAMES_PER_DIR",
        "HINTS",
        "PATHS",
        "PATH_SUFFIXES",
        "DOC",
        "NO_DEFAULT_PATH",
        "NO_CMAKE_PATH",
        "NO_CMAKE_ENVIRONMENT_PATH",
        "NO_SYSTEM_ENVIRONMENT_PATH",
        "NO_CMAKE_SYSTEM_PATH",
        "NO_PACKAGE_ROOT_PATH",
        "NO_CMAKE_FIND_ROOT_PATH",
        "ONLY_CMAKE_FIND_ROOT_PATH",
        "CMAKE_FIND_ROOT_PATH_BOTH",
        "REQUIRED",
        "ENV",
    ];
    if !rest.iter().any(|a| KEYWORDS.contains(&a.as_str())) {
        // find_xxx(<VAR> name [path...])
        req.names.push(rest[0].clone());
        req.paths.extend(rest[1..].iter().cloned());
        return Ok(req);
    }

    // A leading bare name is followed by search paths.
    let (mut section, mut i) = if rest[0] == "NAMES" {
        (Section::Names, 0)
    } else {
        req.names.push(rest[0].clone());
        (Section::Paths, 1)
    };
    while i < rest.len() {
        let arg = rest[i].as_str();
        match arg {
            "NAMES" => section = Section::Names,
            "HINTS" => section = Section::Hints,
            "PATHS" => section = Section::Paths,
            "PATH_SUFFIXES" => section = Section::Suffixes,
            "DOC" => section = Section::Doc,
            "NAMES_PER_DIR" => req.names_per_dir = true,
            "NO_DEFAULT_PATH" => req.no_default_path = true,
            "NO_CMAKE_PATH" => req.no_cmake_path = true,
            "NO_CMAKE_ENVIRONMENT_PATH" => req.no_cmake_environment_path = true,
            "NO_SYSTEM_ENVIRONMENT_PATH" => req.no_system_environment_path = true,
            "NO_CMAKE_SYSTEM_PATH" => req.no_cmake_system_path = true,
            "NO_PACKAGE_ROOT_PATH"
            | "NO_CMAKE_FIND_ROOT_PATH"
            | "ONLY_CMAKE_FIND_ROOT_PATH"
            | "CMAKE_FIND_ROOT_PATH_BOTH" => section = Section::None,
            "REQUIRED" => req.required = true,
            "ENV" if matches!(section, Section::Hints | Section::Paths) => {
                i += 1;
                if let Some(var) = rest.get(i) {
                    let dirs: Vec<String> = std::env::var(var)
                        .map(|v| v.split(':').filter(|p| !p.is_empty()).map(str::to_string).collect())
                        .unwrap_or_default();
                    if matches!(section, Section::Hints) {
                        req.hints.extend(dirs);
                    } else {
                        req.paths.extend(dirs);
                    }
                }
            }
            _ => match section {
                Section::Names => req.names.push(arg.to_string()),
                Section::Hints => req.hints.push(arg.to_string()),
                Section::Paths => req.paths.push(arg.to_string()),
                Section::Suffixes => req.suffixes.push(arg.to_string()),
                Section::Doc => req.doc = Some(arg.to_string()),
                Section::None => {}
            },
        }
        i += 1;
    }
    Ok(req)
}

fn push_unique(dirs: &mut Vec<String>, dir: String) {
    if !dir.is_empty() && !dirs.contains(&dir) {
        dirs.push(dir);
    }
}

fn list_definition(ev: &Evaluator, name: &str) -> Vec<String> {
    ev.get_definition(name)
        .map(|v| v.split(';').filter(|p| !p.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

/// The directories to search, in order, before path suffixes are applied.
fn search_directories(ev: &Evaluator, kind: FindKind, req: &FindRequest) -> Vec<String> {
    let mut dirs = Vec::new();
    let add_prefixes = |dirs: &mut Vec<String>, prefixes: &[String]| {
        for prefix in prefixes {
            for sub in kind.prefix_subdirs() {
                push_unique(dirs, format!("{}/{sub}", prefix.trim_end_matches('/')));
            }
        }
    };

    if !req.no_default_path && !req.no_cmake_path {
        add_prefixes(&mut dirs, &list_definition(ev, "CMAKE_PREFIX_PATH"));
        for dir in list_definition(ev, kind.extra_path_variable()) {
            push_unique(&mut dirs, dir);
        }
    }
    if !req.no_default_path && !req.no_cmake_environment_path {
        if let Ok(env) = std::env::var("CMAKE_PREFIX_PATH") {
            let prefixes: Vec<String> = env.split(':').map(str::to_string).collect();
            add_prefixes(&mut dirs, &prefixes);
        }
    }
    for hint in &req.hints {
        push_unique(&mut dirs, hint.clone());
    }
    if !req.no_default_path && !req.no_system_environment_path {
        if let Ok(path) = std::env::var("PATH") {
            for dir in path.split(':').filter(|p| !p.is_empty()) {
                let dir = dir.trim_end_matches('/');
                match kind {
                    FindKind::Program => push_unique(&mut dirs, dir.to_string()),
                    // <prefix>/bin in PATH implies <prefix>/lib or <prefix>/include.
                    _ => {
                        let prefix = dir.strip_suffix("/bin").or_else(|| dir.strip_suffix("/sbin"));
                        if let Some(prefix) = prefix {
                            add_prefixes(&mut dirs, &[prefix.to_string()]);
                        }
                    }
                }
            }
        }
    }
    if !req.no_default_path && !req.no_cmake_system_path {
        let mut prefixes = list_definition(ev, "CMAKE_SYSTEM_PREFIX_PATH");
        if prefixes.is_empty() {
            prefixes = ["/usr/local", "/usr", "/"].map(str::to_string).to_vec();
        }
        add_prefixes(&mut dirs, &prefixes);
    }
    for path in &req.paths {
        push_unique(&mut dirs, path.clone());
    }

    let base = ev.current_source_dir();
    let dirs = dirs.into_iter().map(|d| collapse_full_path(&d, &base));
    let mut expanded = Vec::new();
    for dir in dirs {
        let prefix = if dir.ends_with('/') { dir.clone() } else { format!("{dir}/") };
        for suffix in &req.suffixes {
            push_unique(&mut expanded, format!("{prefix}{suffix}"));
        }
        push_unique(&mut expanded, dir);
    }
    expanded
}

fn is_executable(path: &str) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

fn entry_exists(ev: &mut Evaluator, dir: &str, name: &str) -> bool {
    if name.contains('/') {
        Path::new(&format!("{dir}/{name}")).exists()
    } else {
        ev.dir_contents.contains(dir, name)
    }
}

/// The file names `name` may take as a library.
fn library_candidates(ev: &Evaluator, name: &str) -> Vec<String> {
    let mut prefixes = list_definition(ev, "CMAKE_FIND_LIBRARY_PREFIXES");
    if prefixes.is_empty() {
        prefixes.push("lib".to_string());
    }
    let mut suffixes = list_definition(ev, "CMAKE_FIND_LIBRARY_SUFFIXES");
    if suffixes.is_empty() {
        suffixes = vec![".so".to_string(), ".a".to_string()];
    }
    let mut candidates = Vec::new();
    if prefixes.iter().any(|p| name.starts_with(p.as_str())) && suffixes.iter().any(|s| name.ends_with(s.as_str())) {
        candidates.push(name.to_string());
    }
    for suffix in &suffixes {
        for prefix in &prefixes {
            candidates.push(format!("{prefix}{name}{suffix}"));
        }
    }
    candidates
}

fn find_in_dir(ev: &mut Evaluator, kind: FindKind, dir: &str, name: &str) -> Option<String> {
    let joined = |n: &str| format!("{}/{n}", dir.trim_end_matches('/'));
    match kind {
        FindKind::Program => {
            let path = joined(name);
            (entry_exists(ev, dir, name) && is_executable(&path)).then_some(path)
        }
        FindKind::Library => {
            let candidates = library_candidates(ev, name);
            candidates.iter().find(|c| entry_exists(ev, dir, c)).map(|c| joined(c))
        }
        FindKind::Path => entry_exists(ev, dir, name).then(|| dir.trim_end_matches('/').to_string()),
        FindKind::File => entry_exists(ev, dir, name).then(|| joined(name)),
    }
}

fn find_full_path(kind: FindKind, name: &str) -> Option<String> {
    if !is_full_path(name) {
        return None;
    }
    let found = match kind {
        FindKind::Program => is_executable(name),
        FindKind::Library | FindKind::File => Path::new(name).is_file(),
        FindKind::Path => false,
    };
    found.then(|| name.to_string())
}

fn search(ev: &mut Evaluator, kind: FindKind, req: &FindRequest) -> Option<String> {
    for name in &req.names {
        if let Some(found) = find_full_path(kind, name) {
            return Some(found);
        }
    }
    let dirs = search_directories(ev, kind, req);
    if req.names_per_dir {
        for dir in &dirs {
            for name in &req.names {
                if let Some(found) = find_in_dir(ev, kind, dir, name) {
                    return Some(found);
                }
            }
        }
    } else {
        for name in &req.names {
            for dir in &dirs {
                if let Some(found) = find_in_dir(ev, kind, dir, name) {
                    return Some(found);
                }
            }
        }
    }
    None
}

fn run_find(ev: &mut Evaluator, kind: FindKind, args: &[ExpandedArgument]) -> Result<()> {
    let args = argument_values(args);
    let req = parse_request(&args)?;
    let doc = req.doc.clone().unwrap_or_else(|| kind.default_doc().to_string());
    let ty = kind.cache_type();

    if ev.get_definition(&req.var).is_some_and(|v| !is_not_found(v)) {
        if ev.cache.get(&req.var).is_some_and(|e| e.ty == CacheEntryType::Uninitialized) {
            ev.add_cache_definition(&req.var, "", &doc, ty, false);
        }
        return Ok(());
    }

    match search(ev, kind, &req) {
        Some(found) => {
            log!("{} {}: {found}", kind.command_name(), req.var);
            ev.add_cache_definition(&req.var, &found, &doc, ty, true);
        }
        None => {
            ev.add_cache_definition(&req.var, &format!("{}-NOTFOUND", req.var), &doc, ty, true);
            if req.required {
                let text = format!(
                    "Could not find {} using the following names: {}",
                    req.var,
                    req.names.join(", ")
                );
                ev.issue_message(MessageType::FatalError, &text);
            }
        }
    }
    Ok(())
}

pub fn find_program_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    run_find(ev, FindKind::Program, args)
}

pub fn find_library_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    run_find(ev, FindKind::Library, args)
}

pub fn find_path_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    run_find(ev, FindKind::Path, args)
}

pub fn find_file_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    run_find(ev, FindKind::File, args)
}

/// Looks `name` up in the directories of `$PATH`.
pub fn find_program_on_path(name: &str) -> Option<String> {
    if name.contains('/') {
        return is_executable(name).then(|| name.to_string());
    }
    let path = std::env::var("PATH").ok()?;
    path.split(':')
        .filter(|d| !d.is_empty())
        .map(|d| format!("{}/{name}", d.trim_end_matches('/')))
        .find(|p| is_executable(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::testutil::{output, run};
    use crate::strutil::path_to_string;

    fn fixture() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let root = path_to_string(dir.path());
        for d in ["bin", "lib", "include/foo", "other/lib"] {
            std::fs::create_dir_all(format!("{root}/{d}")).unwrap();
        }
        for f in ["lib/libz.a", "lib/libz.so", "other/lib/libcmscriptquux.a", "include/foo/foo.h"] {
            std::fs::write(format!("{root}/{f}"), "").unwrap();
        }
        let tool = format!("{root}/bin/tool");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::write(format!("{root}/bin/data"), "").unwrap();
        (dir, root)
    }

    #[test]
    fn test_directory_content_cache() {
        let (_dir, root) = fixture();
        let mut cache = DirectoryContentCache::default();
        assert!(cache.contains(&format!("{root}/lib"), "libz.a"));
        // Entries created later are not seen.
        std::fs::write(format!("{root}/lib/late"), "").unwrap();
        assert!(!cache.contains(&format!("{root}/lib"), "late"));
        assert!(cache.list(&format!("{root}/missing")).is_empty());
    }

    #[test]
    fn test_find_library() {
        let (_dir, root) = fixture();
        let ev = run(&format!(
            "find_library(Z_LIB NAMES z PATHS {root}/lib NO_DEFAULT_PATH)\n\
             find_library(M_LIB cmscriptquux {root}/lib {root}/other/lib)\n\
             message(\"${{Z_LIB}} ${{M_LIB}}\")\n"
        ));
        assert_eq!(output(&ev), vec![format!("{root}/lib/libz.so {root}/other/lib/libcmscriptquux.a")]);
        assert_eq!(ev.cache.get("Z_LIB").unwrap().ty, CacheEntryType::FilePath);
    }

    #[test]
    fn test_find_path_and_file_with_suffixes() {
        let (_dir, root) = fixture();
        let ev = run(&format!(
            "find_path(FOO_DIR foo.h PATHS {root}/include PATH_SUFFIXES foo NO_DEFAULT_PATH)\n\
             find_file(FOO_H NAMES foo/foo.h HINTS {root}/include NO_DEFAULT_PATH)\n\
             message(\"${{FOO_DIR}} ${{FOO_H}}\")\n"
        ));
        assert_eq!(output(&ev), vec![format!("{root}/include/foo {root}/include/foo/foo.h")]);
        assert_eq!(ev.cache.get("FOO_DIR").unwrap().ty, CacheEntryType::Path);
    }

    #[test]
    fn test_find_program_requires_executable() {
        let (_dir, root) = fixture();
        let ev = run(&format!(
            "find_program(TOOL tool PATHS {root}/bin NO_DEFAULT_PATH)\n\
             find_program(DATA data PATHS {root}/bin NO_DEFAULT_PATH)\n\
             message(\"${{TOOL}} ${{DATA}}\")\n"
        ));
        assert_eq!(output(&ev), vec![format!("{root}/bin/tool DATA-NOTFOUND")]);
    }

    #[test]
    fn test_cached_result_short_circuits() {
        let (_dir, root) = fixture();
        let ev = run(&format!(
            "set(Z_LIB /already/there CACHE FILEPATH \"\")\n\
             find_library(Z_LIB z PATHS {root}/lib NO_DEFAULT_PATH)\n\
             message(${{Z_LIB}})\n"
        ));
        assert_eq!(output(&ev), vec!["/already/there"]);
    }

    #[test]
    fn test_not_found_retried_and_required() {
        let (_dir, root) = fixture();
        let ev = run(&format!(
            "find_library(Q_LIB q PATHS {root}/lib NO_DEFAULT_PATH)\n\
             message(${{Q_LIB}})\n\
             find_library(Q_LIB NAMES q z PATHS {root}/lib NO_DEFAULT_PATH)\n\
             message(${{Q_LIB}})\n\
             find_file(NONE NAMES none.h PATHS {root} NO_DEFAULT_PATH REQUIRED)\n"
        ));
        assert_eq!(output(&ev), vec!["Q_LIB-NOTFOUND".to_string(), format!("{root}/lib/libz.so")]);
        assert_eq!(
            ev.messenger.texts(MessageType::FatalError),
            vec!["Could not find NONE using the following names: none.h"]
        );
    }

    #[test]
    fn test_find_program_on_path() {
        assert_eq!(find_program_on_path("/definitely/not/here"), None);
        assert!(find_program_on_path("sh").is_some());
    }
}
