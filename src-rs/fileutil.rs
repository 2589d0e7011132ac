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

use std::ffi::{CStr, CString};
use std::path::Path;
use std::slice;
use std::time::SystemTime;

use crate::log;
use crate::strutil::{concat_dir, filename_name, filename_path, path_to_string};

pub fn get_timestamp(filename: &str) -> Option<SystemTime> {
    std::fs::metadata(filename).ok()?.modified().ok()
}

fn field_to_string(field: &[libc::c_char]) -> String {
    // SAFETY: utsname fields are NUL-terminated within their fixed-size
    // arrays, and we only read until that terminator.
    let s = unsafe { CStr::from_ptr(field.as_ptr()) };
    s.to_string_lossy().into_owned()
}

/// The kernel name and machine architecture, as `uname -s` and `uname -m`
/// print them.
pub fn host_system_info() -> (String, String) {
    // SAFETY: utsname is plain old data, so the zero value is valid.
    let mut uts: libc::utsname = unsafe { std::mem::zeroed() };
    // SAFETY: uts is a valid, writable utsname.
    if unsafe { libc::uname(&mut uts) } != 0 {
        return ("UNKNOWN".to_string(), "UNKNOWN".to_string());
    }
    (field_to_string(&uts.sysname), field_to_string(&uts.machine))
}

pub fn has_wildcard(pat: &str) -> bool {
    pat.contains(['?', '*', '['])
}

// Use libc glob for the per-component wildcard matching and the sorted
// output it already provides.
fn libc_glob(pattern: &str) -> Vec<String> {
    let Ok(pat) = CString::new(pattern) else {
        return Vec::new();
    };
    let mut ret = Vec::new();
    // SAFETY: All of the types in glob_t are safe to be zero'd.
    let mut gl: libc::glob_t = unsafe { std::mem::zeroed() };
    // SAFETY: gl has been zero'd above, and pat is used as an input.
    // We'll free any allocated memory with globfree below.
    let r = unsafe { libc::glob(pat.as_ptr(), 0, None, &mut gl) };
    if r == 0 && gl.gl_pathc > 0 && !gl.gl_pathv.is_null() {
        // SAFETY: glob succeeded and gl_pathv holds gl_pathc entries that
        // stay valid until globfree.
        let paths = unsafe { slice::from_raw_parts(gl.gl_pathv, gl.gl_pathc) };
        ret.reserve_exact(gl.gl_pathc);
        for ptr in paths {
            if !ptr.is_null() {
                // SAFETY: non-null C string created by glob, copied out
                // immediately.
                let s = unsafe { CStr::from_ptr(*ptr) };
                ret.push(s.to_string_lossy().into_owned());
            }
        }
    }
    // SAFETY: we're no longer using anything from gl, and this will
    // only free things allocated by libc::glob.
    unsafe { libc::globfree(&mut gl) };
    ret
}

pub fn fnmatch(pattern: &str, s: &str) -> bool {
    let (Ok(pattern), Ok(s)) = (CString::new(pattern), CString::new(s)) else {
        return false;
    };
    // SAFETY: Both CStrings are inputs that outlive the call.
    unsafe { libc::fnmatch(pattern.as_ptr(), s.as_ptr(), 0) == 0 }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GlobOptions {
    pub recurse: bool,
    /// Report matching directories as well as files.
    pub list_directories: bool,
    pub follow_symlinks: bool,
}

fn walk(dir: &str, name_pattern: &str, opts: GlobOptions, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    for name in names {
        let path = concat_dir(dir, &name);
        let p = Path::new(&path);
        let is_link = p.symlink_metadata().is_ok_and(|m| m.file_type().is_symlink());
        let is_dir = p.is_dir();
        if is_dir && (!is_link || opts.follow_symlinks) {
            if opts.list_directories && fnmatch(name_pattern, &name) {
                out.push(path.clone());
            }
            walk(&path, name_pattern, opts, out);
        } else if fnmatch(name_pattern, &name) {
            out.push(path);
        }
    }
}

/// Expands `pattern` the way `file(GLOB)` and `file(GLOB_RECURSE)` do. The
/// result is sorted. With `recurse`, the final component is matched in
/// every directory below the ones the leading components name.
pub fn glob(pattern: &str, opts: GlobOptions) -> Vec<String> {
    log!("glob({pattern}, {opts:?})");
    let mut out = if !opts.recurse {
        let found = if has_wildcard(pattern) {
            libc_glob(pattern)
        } else if Path::new(pattern).symlink_metadata().is_ok() {
            vec![pattern.to_string()]
        } else {
            Vec::new()
        };
        found
            .into_iter()
            .filter(|p| opts.list_directories || !Path::new(p).is_dir())
            .collect()
    } else {
        let dir_pattern = filename_path(pattern);
        let name_pattern = filename_name(pattern);
        let dirs = if dir_pattern.is_empty() {
            vec![".".to_string()]
        } else if has_wildcard(dir_pattern) {
            libc_glob(dir_pattern)
        } else {
            vec![dir_pattern.to_string()]
        };
        let mut out = Vec::new();
        for dir in dirs {
            walk(&dir, name_pattern, opts, &mut out);
        }
        out
    };
    out.sort();
    out.dedup();
    out
}

/// Makes `path` relative to `base`. Both must be absolute.
pub fn relative_path(base: &str, path: &str) -> String {
    let base: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    let target: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let common = base.iter().zip(&target).take_while(|(a, b)| a == b).count();
    let mut parts: Vec<&str> = vec![".."; base.len() - common];
    parts.extend(&target[common..]);
    parts.join("/")
}

pub fn real_path(path: &str) -> String {
    match std::fs::canonicalize(path) {
        Ok(p) => path_to_string(&p),
        Err(_) => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path("/a/b", "/a/b/c/d"), "c/d");
        assert_eq!(relative_path("/a/b/x", "/a/b/c"), "../c");
        assert_eq!(relative_path("/a/b", "/a/b"), "");
        assert_eq!(relative_path("/", "/usr/lib"), "usr/lib");
    }

    #[test]
    fn test_fnmatch() {
        assert!(fnmatch("*.c", "main.c"));
        assert!(!fnmatch("*.c", "main.h"));
        assert!(fnmatch("lib?.a", "libx.a"));
    }

    #[test]
    fn test_host_system_info() {
        let (system, processor) = host_system_info();
        assert!(!system.is_empty());
        assert!(!processor.is_empty());
    }

    #[test]
    fn test_glob() {
        let dir = tempfile::tempdir().unwrap();
        let root = path_to_string(dir.path());
        std::fs::create_dir_all(format!("{root}/sub/deep")).unwrap();
        for f in ["a.c", "b.h", "sub/c.c", "sub/deep/d.c"] {
            std::fs::write(format!("{root}/{f}"), "").unwrap();
        }
        let flat = glob(&format!("{root}/*.c"), GlobOptions::default());
        assert_eq!(flat, vec![format!("{root}/a.c")]);

        let opts = GlobOptions {
            recurse: true,
            ..Default::default()
        };
        let deep = glob(&format!("{root}/*.c"), opts);
        assert_eq!(
            deep,
            vec![format!("{root}/a.c"), format!("{root}/sub/c.c"), format!("{root}/sub/deep/d.c")]
        );

        let with_dirs = glob(
            &format!("{root}/*"),
            GlobOptions {
                list_directories: true,
                ..Default::default()
            },
        );
        assert!(with_dirs.contains(&format!("{root}/sub")));
    }

    #[test]
    fn test_get_timestamp() {
        let f = tempfile::NamedTempFile::new().unwrap();
        assert!(get_timestamp(&path_to_string(f.path())).is_some());
        assert!(get_timestamp("/no/such/file/anywhere").is_none());
    }
}
