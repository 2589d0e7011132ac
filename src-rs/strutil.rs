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

use std::{cmp::Ordering, path::Path};

pub fn is_space(c: char) -> bool {
    ('\t'..='\r').contains(&c) || c == ' '
}

pub fn word_scanner(s: &str) -> impl Iterator<Item = &str> {
    s.split(is_space).filter(|s| !s.is_empty())
}

pub fn trim_prefix_str<'a>(s: &'a str, prefix: &str) -> &'a str {
    match s.strip_prefix(prefix) {
        Some(s) => s,
        None => s,
    }
}

pub fn trim_space(s: &str) -> &str {
    s.trim_matches(is_space)
}

/// True for the constants a script may use to spell "true".
pub fn is_on(s: &str) -> bool {
    matches!(
        s.to_ascii_uppercase().as_str(),
        "1" | "ON" | "YES" | "TRUE" | "Y"
    )
}

/// True for the constants a script may use to spell "false", including the
/// empty string and anything ending in `-NOTFOUND`.
pub fn is_off(s: &str) -> bool {
    if s.is_empty() {
        return true;
    }
    let upper = s.to_ascii_uppercase();
    matches!(
        upper.as_str(),
        "0" | "OFF" | "NO" | "FALSE" | "N" | "IGNORE" | "NOTFOUND"
    ) || upper.ends_with("-NOTFOUND")
}

pub fn is_not_found(s: &str) -> bool {
    s == "NOTFOUND" || s.ends_with("-NOTFOUND")
}

/// Parses the whole string as a C `double`, accepting leading whitespace and
/// hexadecimal integers.
pub fn parse_c_double(s: &str) -> Option<f64> {
    let t = s.trim_start_matches(is_space);
    if t.is_empty() {
        return None;
    }
    let (neg, digits) = match t.as_bytes()[0] {
        b'-' => (true, &t[1..]),
        b'+' => (false, &t[1..]),
        _ => (false, t),
    };
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        let v = i64::from_str_radix(hex, 16).ok()? as f64;
        return Some(if neg { -v } else { v });
    }
    t.parse::<f64>().ok()
}

/// Reads the longest prefix of `s` that forms a decimal floating point
/// number, like `sscanf("%lg")`.
pub fn scan_double_prefix(s: &str) -> Option<f64> {
    let t = s.trim_start_matches(is_space);
    let b = t.as_bytes();
    let mut i = 0;
    if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
        i += 1;
    }
    let int_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    let mut mantissa = i - int_start;
    if i < b.len() && b[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        mantissa += i - frac_start;
    }
    if mantissa == 0 {
        return None;
    }
    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        let mut j = i + 1;
        if j < b.len() && (b[j] == b'+' || b[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    t[..i].parse::<f64>().ok()
}

/// `atoi` semantics: leading whitespace, optional sign, then as many digits
/// as there are. Anything unparsable is zero.
pub fn parse_leading_int(s: &str) -> i64 {
    let t = s.trim_start_matches(is_space);
    let b = t.as_bytes();
    let mut i = 0;
    if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
        i += 1;
    }
    let start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    if i == start {
        return 0;
    }
    t[..i].parse::<i64>().unwrap_or(0)
}

/// Parses a whole string as an integer, as list indexes and `math` results
/// are written.
pub fn parse_int(s: &str) -> Option<i64> {
    let t = trim_space(s);
    if t.is_empty() {
        return None;
    }
    t.parse::<i64>().ok()
}

pub fn is_integer(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit())
}

/// Compares dotted version strings component by component. Missing
/// components compare as zero, and each component is read as a leading
/// unsigned integer.
pub fn version_compare(lhs: &str, rhs: &str) -> Ordering {
    let (mut l, mut r) = (lhs.as_bytes(), rhs.as_bytes());
    fn take_num(s: &mut &[u8]) -> u64 {
        let n = s.iter().take_while(|c| c.is_ascii_digit()).count();
        let v = std::str::from_utf8(&s[..n])
            .ok()
            .and_then(|d| d.parse::<u64>().ok())
            .unwrap_or(0);
        *s = &s[n..];
        v
    }
    while l.first().is_some_and(u8::is_ascii_digit) || r.first().is_some_and(u8::is_ascii_digit)
    {
        let lv = take_num(&mut l);
        let rv = take_num(&mut r);
        match lv.cmp(&rv) {
            Ordering::Equal => {}
            ord => return ord,
        }
        if l.first() == Some(&b'.') {
            l = &l[1..];
        }
        if r.first() == Some(&b'.') {
            r = &r[1..];
        }
    }
    Ordering::Equal
}

pub fn normalize_path(mut o: &str) -> String {
    if o.is_empty() {
        return String::new();
    }
    let mut ret = String::new();
    if let Some(rest) = o.strip_prefix('/') {
        ret.push('/');
        o = rest;
    }
    for dir in o.split('/') {
        if dir == "." || (dir == ".." && ret == "/") {
            continue;
        } else if dir == ".." && !ret.is_empty() && ret != ".." && !ret.ends_with("/..") {
            match ret.rfind('/') {
                Some(0) => ret.truncate(1),
                Some(index) => ret.truncate(index),
                None => ret.clear(),
            }
        } else if !dir.is_empty() {
            if !ret.is_empty() && !ret.ends_with('/') {
                ret.push('/');
            }
            ret.push_str(dir);
        }
    }
    ret
}

/// Makes `path` absolute relative to `base` and removes `.` and `..`
/// components.
pub fn collapse_full_path(path: &str, base: &str) -> String {
    if path.starts_with('/') {
        let n = normalize_path(path);
        return if n.is_empty() { "/".to_string() } else { n };
    }
    let joined = if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    };
    let n = normalize_path(&joined);
    if n.is_empty() { "/".to_string() } else { n }
}

pub fn concat_dir(b: &str, n: &str) -> String {
    let mut r = String::new();
    if !b.is_empty() && !n.starts_with('/') {
        r.push_str(b);
        r.push('/');
    }
    r.push_str(n);
    normalize_path(&r)
}

pub fn path_to_string(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

/// Everything before the last slash, or "" when there is none.
pub fn filename_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(i) => &path[..i],
        None => "",
    }
}

pub fn filename_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// The name up to the first dot.
pub fn filename_without_extension(path: &str) -> &str {
    let name = filename_name(path);
    match name.find('.') {
        Some(i) => &name[..i],
        None => name,
    }
}

/// The name up to the last dot.
pub fn filename_without_last_extension(path: &str) -> &str {
    let name = filename_name(path);
    match name.rfind('.') {
        Some(i) => &name[..i],
        None => name,
    }
}

/// The extension starting at the first dot of the name.
pub fn filename_extension(path: &str) -> &str {
    let name = filename_name(path);
    match name.find('.') {
        Some(i) => &name[i..],
        None => "",
    }
}

pub fn filename_last_extension(path: &str) -> &str {
    let name = filename_name(path);
    match name.rfind('.') {
        Some(i) => &name[i..],
        None => "",
    }
}

/// Absolute on this host: leading slash, or a leading tilde.
pub fn is_full_path(path: &str) -> bool {
    path.starts_with('/') || path.starts_with('~')
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_word_scanner() {
        let words: Vec<&str> = word_scanner("  foo \t bar\nbaz ").collect();
        assert_eq!(words, vec!["foo", "bar", "baz"]);
    }

    #[test]
    fn test_is_on_off() {
        for s in ["1", "ON", "on", "Yes", "TRUE", "y"] {
            assert!(is_on(s), "{s}");
        }
        for s in ["", "0", "OFF", "no", "false", "N", "IGNORE", "NOTFOUND", "FOO-NOTFOUND"] {
            assert!(is_off(s), "{s}");
        }
        assert!(!is_on("2"));
        assert!(!is_off("2"));
        assert!(!is_off("abc"));
    }

    #[test]
    fn test_parse_c_double() {
        assert_eq!(parse_c_double("2"), Some(2.0));
        assert_eq!(parse_c_double(" -1.5e2"), Some(-150.0));
        assert_eq!(parse_c_double("0x10"), Some(16.0));
        assert_eq!(parse_c_double("10abc"), None);
        assert_eq!(parse_c_double(""), None);
    }

    #[test]
    fn test_scan_double_prefix() {
        assert_eq!(scan_double_prefix("10abc"), Some(10.0));
        assert_eq!(scan_double_prefix("  3.5"), Some(3.5));
        assert_eq!(scan_double_prefix("1e3x"), Some(1000.0));
        assert_eq!(scan_double_prefix("1ex"), Some(1.0));
        assert_eq!(scan_double_prefix("abc"), None);
        assert_eq!(scan_double_prefix("."), None);
    }

    #[test]
    fn test_parse_leading_int() {
        assert_eq!(parse_leading_int("42"), 42);
        assert_eq!(parse_leading_int(" -3x"), -3);
        assert_eq!(parse_leading_int("x"), 0);
    }

    #[test]
    fn test_version_compare() {
        assert_eq!(version_compare("3.13", "3.13.0"), Ordering::Equal);
        assert_eq!(version_compare("2.4", "3.0"), Ordering::Less);
        assert_eq!(version_compare("3.10", "3.9"), Ordering::Greater);
        assert_eq!(version_compare("1.2.3a", "1.2.3"), Ordering::Equal);
        assert_eq!(version_compare("", "0"), Ordering::Equal);
    }

    #[test]
    fn test_is_integer() {
        assert!(is_integer("0"));
        assert!(is_integer("1234"));
        assert!(!is_integer(""));
        assert!(!is_integer("a234"));
        assert!(!is_integer("12a4"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "");
        assert_eq!(normalize_path("."), "");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("////tmp////"), "/tmp");
        assert_eq!(normalize_path("a//.//b"), "a/b");
        assert_eq!(normalize_path("a////b//../c/////"), "a/c");
        assert_eq!(normalize_path("../foo"), "../foo");
        assert_eq!(normalize_path("x/../../foo"), "../foo");
        assert_eq!(normalize_path("/../foo"), "/foo");
        assert_eq!(normalize_path("/a/.."), "/");
        assert_eq!(normalize_path("/a/b/.."), "/a");
    }

    #[test]
    fn test_collapse_full_path() {
        assert_eq!(collapse_full_path("b/../c", "/src"), "/src/c");
        assert_eq!(collapse_full_path("/x/./y", "/src"), "/x/y");
        assert_eq!(collapse_full_path("", "/src"), "/src");
        assert_eq!(collapse_full_path("..", "/"), "/");
    }

    #[test]
    fn test_filename_components() {
        assert_eq!(filename_path("/a/b/c.tar.gz"), "/a/b");
        assert_eq!(filename_path("/c"), "/");
        assert_eq!(filename_path("c"), "");
        assert_eq!(filename_name("/a/b/c.tar.gz"), "c.tar.gz");
        assert_eq!(filename_without_extension("/a/b/c.tar.gz"), "c");
        assert_eq!(filename_without_last_extension("/a/b/c.tar.gz"), "c.tar");
        assert_eq!(filename_extension("/a/b/c.tar.gz"), ".tar.gz");
        assert_eq!(filename_last_extension("/a/b/c.tar.gz"), ".gz");
        assert!(is_full_path("/x"));
        assert!(!is_full_path("x/y"));
    }
}
