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


// TODO: Add docs
#![allow(missing_docs)]
// These are the lints enabled by default in Android
// #![deny(missing_docs)]
#![deny(warnings)]
#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::undocumented_unsafe_blocks)]

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

#[cfg(feature = "gperf")]
use gperftools::{HEAP_PROFILER, PROFILER};

use cmscript::cache::{Cache, CacheEntryType, parse_definition};
use cmscript::eval::{Evaluator, WorkingMode};
use cmscript::fileutil::fnmatch;
use cmscript::flags::FLAGS;
use cmscript::log;
use cmscript::strutil::collapse_full_path;

#[cfg(all(feature = "jemalloc", not(feature = "gperf"), target_os = "linux"))]
use tikv_jemallocator::Jemalloc;

// Use jemalloc for better performance, but gperftools will use tcmalloc for
// heap debugging.
#[cfg(all(feature = "jemalloc", not(feature = "gperf"), target_os = "linux"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn run_script(script: &str) -> Result<bool> {
    let mut ev = Evaluator::new(WorkingMode::Script);
    Ok(ev.run_script(script, &FLAGS.script_args))
}

/// Applies `-D` and `-U` to the loaded cache.
fn apply_command_line_cache(ev: &mut Evaluator) -> Result<()> {
    for def in &FLAGS.cache_definitions {
        let Some((name, ty, value)) = parse_definition(def) else {
            anyhow::bail!("Parse error in command line argument: {def}\nShould be: VAR:type=value");
        };
        log!("-D {name}={value}");
        ev.cache.set(
            &name,
            &value,
            ty.unwrap_or(CacheEntryType::Uninitialized),
            Some("No help, variable specified on the command line."),
        );
    }
    for glob in &FLAGS.cache_removals {
        let doomed: Vec<String> = ev.cache.keys().filter(|k| fnmatch(glob, k)).cloned().collect();
        for key in doomed {
            log!("-U {key}");
            ev.cache.remove(&key);
        }
    }
    Ok(())
}

fn run_project(source_dir: &str) -> Result<bool> {
    let cwd = std::env::current_dir()?.to_string_lossy().into_owned();
    let source_dir = collapse_full_path(source_dir, &cwd);
    let binary_dir = match &FLAGS.binary_dir {
        Some(dir) => collapse_full_path(dir, &cwd),
        None => cwd.clone(),
    };
    std::fs::create_dir_all(&binary_dir)
        .with_context(|| format!("failed to create binary directory {binary_dir}"))?;

    let mut ev = Evaluator::new(WorkingMode::Project);
    let binary_path = Path::new(&binary_dir);
    if let Some(cache) = Cache::load(&binary_path.join("CMakeCache.txt"))? {
        ev.cache = cache;
    }
    apply_command_line_cache(&mut ev)?;
    if let Some(initial) = &FLAGS.initial_cache {
        ev.set_home_directories(&source_dir, &binary_dir);
        let initial = collapse_full_path(initial, &cwd);
        if !ev.read_list_file(&initial) {
            anyhow::bail!("Error processing file: {initial}");
        }
    }

    let ok = ev.configure(&source_dir, &binary_dir);
    if ok && !FLAGS.no_cache {
        ev.cache.save(binary_path)?;
    }
    Ok(ok)
}

fn run() -> Result<bool> {
    if let Some(script) = &FLAGS.script {
        return run_script(script);
    }
    let Some(source_dir) = &FLAGS.source_dir else {
        anyhow::bail!("No source directory specified. Use -S <dir> or -P <file>.");
    };
    run_project(source_dir)
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Warn)
        .format(|buf, record| {
            if let (Some(file), Some(line)) = (record.file(), record.line()) {
                writeln!(buf, "*cmscript*: {file}:{line}: {}", record.args())
            } else {
                writeln!(buf, "*cmscript*: {}", record.args())
            }
        })
        .parse_env("CMSCRIPT_LOG")
        .init();

    #[cfg(feature = "gperf")]
    {
        use std::os::unix::ffi::OsStrExt;
        if let Some(path) = &FLAGS.cpu_profile_path {
            PROFILER
                .lock()
                .unwrap()
                .start(std::ffi::CString::new(path.as_bytes()).unwrap())
                .unwrap();
        }
        if let Some(path) = &FLAGS.memory_profile_path {
            HEAP_PROFILER
                .lock()
                .unwrap()
                .start(std::ffi::CString::new(path.as_bytes()).unwrap())
                .unwrap();
        }
    }

    let ret = match run() {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(err) => {
            for cause in err.chain() {
                eprintln!("{cause}");
            }
            1
        }
    };
    #[cfg(feature = "gperf")]
    {
        if FLAGS.cpu_profile_path.is_some() {
            PROFILER.lock().unwrap().stop().unwrap();
        }
        if FLAGS.memory_profile_path.is_some() {
            HEAP_PROFILER.lock().unwrap().stop().unwrap();
        }
    }
    cmscript::stats::report_all_stats();
    std::process::exit(ret);
}
