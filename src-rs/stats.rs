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


//! Timing of interesting regions of interpretation: parsing, list files,
//! includes, function calls. Enabled with `--stats`.

use crate::{file_cache::cached_file_count, find::listed_dir_count, flags::FLAGS, symtab::symbol_count};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    fmt::Display,
    sync::Arc,
    time::{Duration, Instant},
};

static ALL_STATS: Mutex<Vec<Arc<Stats>>> = Mutex::new(Vec::new());

/// Regions slower than this are reported as soon as they end.
const SLOW_THRESHOLD: Duration = Duration::from_secs(3);

/// How many of the slowest list files / functions each site reports.
const TOP_DETAILS: usize = 10;

#[derive(Default, Clone, Copy)]
struct Totals {
    count: u64,
    elapsed: Duration,
}

impl Totals {
    fn add(&mut self, elapsed: Duration) {
        self.count += 1;
        self.elapsed += elapsed;
    }
}

#[derive(Default)]
struct Collected {
    totals: Totals,
    /// Keyed by file path or function name.
    detailed: HashMap<String, Totals>,
}

/// `Stats` represents a single collection site.
pub struct Stats {
    name: &'static str,
    collected: Mutex<Collected>,
}

impl Stats {
    /// Create a new `Stats` instance. Normally you would use [`collect_stats!`]
    /// or [`collect_stats_with_slow_report!`] to call this.
    #[doc(hidden)]
    pub fn new(name: &'static str) -> Arc<Self> {
        let stats = Arc::new(Self {
            name,
            collected: Mutex::new(Collected::default()),
        });
        ALL_STATS.lock().push(stats.clone());
        stats
    }

    /// The implementation behind [`collect_stats!`]
    #[doc(hidden)]
    #[must_use]
    pub fn start_scope(self: &Arc<Self>) -> StatsScope<'_> {
        StatsScope {
            st: self,
            detail: None,
            start: Instant::now(),
        }
    }

    /// The implementation behind [`collect_stats_with_slow_report!`]
    #[doc(hidden)]
    #[must_use]
    pub fn start_scope_with_slow_report(self: &Arc<Self>, detail: &str) -> StatsScope<'_> {
        StatsScope {
            st: self,
            detail: Some(detail.to_string()),
            start: Instant::now(),
        }
    }

    fn record(&self, elapsed: Duration, detail: Option<&str>) {
        let mut collected = self.collected.lock();
        collected.totals.add(elapsed);
        if let Some(detail) = detail {
            match collected.detailed.get_mut(detail) {
                Some(totals) => totals.add(elapsed),
                None => {
                    let mut totals = Totals::default();
                    totals.add(elapsed);
                    collected.detailed.insert(detail.to_string(), totals);
                }
            }
        }
    }

    fn slowest(&self) -> Vec<(String, Totals)> {
        let collected = self.collected.lock();
        let mut detailed: Vec<(String, Totals)> =
            collected.detailed.iter().map(|(k, v)| (k.clone(), *v)).collect();
        detailed.sort_by(|a, b| b.1.elapsed.cmp(&a.1.elapsed).then_with(|| a.0.cmp(&b.0)));
        detailed.truncate(TOP_DETAILS);
        detailed
    }

    fn dump_top(&self) {
        let slowest = self.slowest();
        let width = slowest.iter().map(|(_, t)| t.count.to_string().len()).max().unwrap_or(1);
        for (name, totals) in slowest {
            eprintln!(
                "*cmscript*: {:>6.3} / {:>width$} {name}",
                totals.elapsed.as_secs_f64(),
                totals.count,
            );
        }
    }
}

impl Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let collected = self.collected.lock();
        let Totals { count, elapsed } = collected.totals;
        write!(f, "{}: {} / {}", self.name, elapsed.as_secs_f64(), count)?;
        if !collected.detailed.is_empty() {
            write!(f, " ({} unique)", collected.detailed.len())?;
        }
        Ok(())
    }
}

/// Records one region when dropped.
pub struct StatsScope<'a> {
    st: &'a Stats,
    detail: Option<String>,
    start: Instant,
}

impl Drop for StatsScope<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        self.st.record(elapsed, self.detail.as_deref());
        if let Some(detail) = &self.detail {
            if elapsed > SLOW_THRESHOLD {
                eprintln!(
                    "*cmscript*: slow {} ({}): {detail}",
                    self.st.name,
                    elapsed.as_secs_f64()
                );
            }
        }
    }
}

/// Times this block of code. Count and total duration are reported by
/// [`report_all_stats`].
#[macro_export]
macro_rules! collect_stats {
    ($name:literal) => {
        static STATS: std::sync::LazyLock<std::sync::Arc<$crate::stats::Stats>> =
            std::sync::LazyLock::new(|| $crate::stats::Stats::new($name));
        let _ssr = if $crate::flags::FLAGS.enable_stat_logs {
            Some(STATS.start_scope())
        } else {
            None
        };
    };
}

/// Like [`collect_stats!`], but also keeps per-`$detail` totals (a list file
/// path or a function name) and reports the ten slowest. A single region over
/// three seconds is logged as it finishes.
#[macro_export]
macro_rules! collect_stats_with_slow_report {
    ($name:literal, $detail:expr) => {
        static STATS: std::sync::LazyLock<std::sync::Arc<$crate::stats::Stats>> =
            std::sync::LazyLock::new(|| $crate::stats::Stats::new($name));
        let _ssr = if $crate::flags::FLAGS.enable_stat_logs {
            Some(STATS.start_scope_with_slow_report($detail))
        } else {
            None
        };
    };
}

/// Report all the statistics to stderr, if `--stats` is enabled.
pub fn report_all_stats() {
    let all_stats = std::mem::take(&mut *ALL_STATS.lock());
    if FLAGS.enable_stat_logs {
        for stats in all_stats {
            eprintln!("*cmscript*: {stats}");
            stats.dump_top();
        }
        eprintln!("*cmscript*: {} symbols", symbol_count());
        eprintln!("*cmscript*: {} list files parsed", cached_file_count());
        eprintln!("*cmscript*: {} directories listed", listed_dir_count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slowest_details() {
        let stats = Stats {
            name: "include time",
            collected: Mutex::new(Collected::default()),
        };
        stats.record(Duration::from_millis(5), Some("a.cmake"));
        stats.record(Duration::from_millis(20), Some("b.cmake"));
        stats.record(Duration::from_millis(10), Some("a.cmake"));
        stats.record(Duration::from_millis(1), None);

        let slowest = stats.slowest();
        assert_eq!(slowest[0].0, "b.cmake");
        assert_eq!(slowest[1].0, "a.cmake");
        assert_eq!(slowest[1].1.count, 2);
        assert_eq!(stats.to_string(), "include time: 0.036 / 4 (2 unique)");
    }
}
