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


use std::{
    env,
    ffi::{OsStr, OsString},
    os::unix::ffi::{OsStrExt, OsStringExt},
    sync::LazyLock,
    vec::IntoIter,
};

pub static FLAGS: LazyLock<Flags> = LazyLock::new(|| {
    if cfg!(test) {
        Flags::default()
    } else {
        Flags::from_args(env::args_os().collect())
    }
});

#[derive(Debug, Default)]
pub struct Flags {
    /// `-P <file>`: run one script instead of configuring a project.
    pub script: Option<String>,
    pub source_dir: Option<String>,
    pub binary_dir: Option<String>,
    /// `-D NAME[:TYPE]=VALUE`, in command-line order.
    pub cache_definitions: Vec<String>,
    /// `-U <glob>`
    pub cache_removals: Vec<String>,
    /// `-C <file>`: populates the cache before the main list file runs.
    pub initial_cache: Option<String>,
    /// Everything after `--`, plus positional arguments in script mode.
    pub script_args: Vec<String>,
    pub trace: bool,
    pub warn_uninitialized: bool,
    pub no_cache: bool,
    pub enable_stat_logs: bool,
    pub color_warnings: bool,

    pub cpu_profile_path: Option<OsString>,
    pub memory_profile_path: Option<OsString>,
}

fn parse_command_line_option_with_arg(
    option: &str,
    arg: &OsStr,
    args: &mut IntoIter<OsString>,
) -> Option<OsString> {
    let arg = arg.as_bytes();
    let arg = arg.strip_prefix(option.as_bytes())?;
    if arg.is_empty() {
        return args.next();
    }
    if let Some(arg) = arg.strip_prefix(b"=") {
        return Some(OsString::from_vec(arg.to_vec()));
    }
    // E.g, -DFOO=1
    if option.len() == 2 {
        return Some(OsString::from_vec(arg.to_vec()));
    }
    None
}

fn lossy(s: OsString) -> String {
    s.to_string_lossy().into_owned()
}

impl Flags {
    pub fn from_args(args: Vec<OsString>) -> Flags {
        let mut iter = args.into_iter();
        let mut flags = Flags::default();
        // argv[0]
        iter.next();

        while let Some(arg) = iter.next() {
            match arg.as_bytes() {
                b"--" => {
                    flags.script_args.extend(iter.by_ref().map(lossy));
                    break;
                }
                b"--trace" => flags.trace = true,
                b"--warn-uninitialized" => flags.warn_uninitialized = true,
                b"--no-cache" => flags.no_cache = true,
                b"--stats" => flags.enable_stat_logs = true,
                b"--color_warnings" => flags.color_warnings = true,
                _ => {
                    if let Some(arg) = parse_command_line_option_with_arg("-P", &arg, &mut iter) {
                        flags.script = Some(lossy(arg));
                    } else if let Some(arg) = parse_command_line_option_with_arg("-S", &arg, &mut iter) {
                        flags.source_dir = Some(lossy(arg));
                    } else if let Some(arg) = parse_command_line_option_with_arg("-B", &arg, &mut iter) {
                        flags.binary_dir = Some(lossy(arg));
                    } else if let Some(arg) = parse_command_line_option_with_arg("-D", &arg, &mut iter) {
                        flags.cache_definitions.push(lossy(arg));
                    } else if let Some(arg) = parse_command_line_option_with_arg("-U", &arg, &mut iter) {
                        flags.cache_removals.push(lossy(arg));
                    } else if let Some(arg) = parse_command_line_option_with_arg("-C", &arg, &mut iter) {
                        flags.initial_cache = Some(lossy(arg));
                    } else if let Some(arg) = parse_command_line_option_with_arg("--cpu_profile", &arg, &mut iter) {
                        flags.cpu_profile_path = Some(arg)
                    } else if let Some(arg) = parse_command_line_option_with_arg("--mem_profile", &arg, &mut iter) {
                        flags.memory_profile_path = Some(arg)
                    } else if flags.script.is_some() {
                        flags.script_args.push(lossy(arg));
                    } else if arg.as_bytes().starts_with(b"-") {
                        panic!("Unknown flag: {}", arg.to_string_lossy());
                    } else if flags.source_dir.is_none() {
                        flags.source_dir = Some(lossy(arg));
                    } else {
                        panic!("Unexpected argument: {}", arg.to_string_lossy());
                    }
                }
            }
        }

        if flags.script.is_some() && flags.source_dir.is_some() {
            panic!("-P cannot be combined with a source directory");
        }

        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Flags {
        Flags::from_args(std::iter::once("cmscript").chain(args.iter().copied()).map(|s| s.into()).collect())
    }

    #[test]
    fn test_project_flags() {
        let flags = parse(&["-S", "src", "-Bbuild", "-DA=1", "-D", "B:BOOL=ON", "-U", "C*", "--trace", "--no-cache"]);
        assert_eq!(flags.source_dir.as_deref(), Some("src"));
        assert_eq!(flags.binary_dir.as_deref(), Some("build"));
        assert_eq!(flags.cache_definitions, vec!["A=1", "B:BOOL=ON"]);
        assert_eq!(flags.cache_removals, vec!["C*"]);
        assert!(flags.trace && flags.no_cache);
        assert!(flags.script.is_none());
    }

    #[test]
    fn test_script_flags() {
        let flags = parse(&["-P", "run.cmake", "x", "--", "-y", "--trace"]);
        assert_eq!(flags.script.as_deref(), Some("run.cmake"));
        assert_eq!(flags.script_args, vec!["x", "-y", "--trace"]);
        assert!(!flags.trace);
    }

    #[test]
    fn test_positional_source_dir() {
        let flags = parse(&["..", "--stats"]);
        assert_eq!(flags.source_dir.as_deref(), Some(".."));
        assert!(flags.enable_stat_logs);
    }

    #[test]
    fn test_parse_command_line_option_with_arg() {
        assert_eq!(
            parse_command_line_option_with_arg(
                "--cpu_profile",
                &OsString::from("--cpu_profile=out/cpu.prof"),
                &mut vec![].into_iter()
            ),
            Some(OsString::from("out/cpu.prof"))
        );
        assert_eq!(
            parse_command_line_option_with_arg("-C", &OsString::from("-Cinit.cmake"), &mut vec![].into_iter()),
            Some(OsString::from("init.cmake"))
        );
    }
}
