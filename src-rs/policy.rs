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

//! Versioned behavior switches. Each policy records the release that
//! introduced it; declaring a minimum version opts into every policy that
//! release knows about.

use std::{collections::HashMap, fmt::Display, sync::LazyLock};

use anyhow::Result;

use crate::{error, strutil::version_compare};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyId(pub u16);

impl Display for PolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CMP{:04}", self.0)
    }
}

impl PolicyId {
    pub fn parse(s: &str) -> Option<PolicyId> {
        let digits = s.strip_prefix("CMP")?;
        if digits.len() != 4 || !digits.bytes().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let id = PolicyId(digits.parse().ok()?);
        policy_info(id).map(|_| id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyStatus {
    Old,
    Warn,
    New,
    RequiredIfUsed,
    RequiredAlways,
}

impl PolicyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyStatus::Old => "OLD",
            PolicyStatus::Warn => "",
            PolicyStatus::New => "NEW",
            PolicyStatus::RequiredIfUsed | PolicyStatus::RequiredAlways => "NEW",
        }
    }

    /// Whether commands should take the legacy code path.
    pub fn is_old_behavior(self) -> bool {
        matches!(self, PolicyStatus::Old | PolicyStatus::Warn)
    }
}

pub struct PolicyInfo {
    pub id: PolicyId,
    pub version: (u32, u32, u32),
    pub description: &'static str,
    pub default: PolicyStatus,
}

impl PolicyInfo {
    pub fn version_string(&self) -> String {
        let (major, minor, patch) = self.version;
        format!("{major}.{minor}.{patch}")
    }
}

macro_rules! policies {
    ($(($n:literal, $maj:literal, $min:literal, $pat:literal, $desc:literal)),* $(,)?) => {
        const POLICY_INFO: &[PolicyInfo] = &[
            $(PolicyInfo {
                id: PolicyId($n),
                version: ($maj, $min, $pat),
                description: $desc,
                default: PolicyStatus::Warn,
            },)*
        ];
    };
}

policies![
    (0, 2, 6, 0, "A minimum required CMake version must be specified."),
    (1, 2, 6, 0, "CMAKE_BACKWARDS_COMPATIBILITY should no longer be used."),
    (2, 2, 6, 0, "Logical target names must be globally unique."),
    (3, 2, 6, 0, "Libraries linked via full path no longer produce linker search paths."),
    (4, 2, 6, 0, "Libraries linked may not have leading or trailing whitespace."),
    (5, 2, 6, 0, "Preprocessor definition values are now escaped automatically."),
    (6, 2, 6, 0, "Installing MACOSX_BUNDLE targets requires a BUNDLE DESTINATION."),
    (7, 2, 6, 0, "list command no longer ignores empty elements."),
    (8, 2, 6, 1, "Libraries linked by full-path must have a valid library file name."),
    (9, 2, 6, 2, "FILE GLOB_RECURSE calls should not follow symlinks by default."),
    (10, 2, 6, 3, "Bad variable reference syntax is an error."),
    (11, 2, 6, 3, "Included scripts do automatic cmake_policy PUSH and POP."),
    (12, 2, 8, 0, "if() recognizes numbers and boolean constants."),
    (13, 2, 8, 0, "Duplicate binary directories are not allowed."),
    (14, 2, 8, 0, "Input directories must have CMakeLists.txt."),
    (15, 2, 8, 1, "link_directories() treats paths relative to the source dir."),
    (16, 2, 8, 3, "target_link_libraries() reports error if its only argument is not a target."),
    (17, 2, 8, 4, "Prefer files from the CMake module directory when including from there."),
    (18, 2, 8, 9, "Ignore CMAKE_SHARED_LIBRARY_<Lang>_FLAGS variable."),
    (19, 2, 8, 11, "Do not re-expand variables in include and link information."),
    (20, 2, 8, 11, "Automatically link Qt executables to qtmain target on Windows."),
    (21, 2, 8, 12, "Fatal error on relative paths in INCLUDE_DIRECTORIES target property."),
    (22, 2, 8, 12, "INTERFACE_LINK_LIBRARIES defines the link interface."),
    (23, 2, 8, 12, "Plain and keyword target_link_libraries signatures cannot be mixed."),
    (24, 3, 0, 0, "Disallow include export result."),
    (25, 3, 0, 0, "Compiler id for Apple Clang is now AppleClang."),
    (26, 3, 0, 0, "Disallow use of the LOCATION target property."),
    (27, 3, 0, 0, "Conditionally linked imported targets with missing include directories."),
    (28, 3, 0, 0, "Double colon in target name means ALIAS or IMPORTED target."),
    (29, 3, 0, 0, "The subdir_depends command should not be called."),
    (30, 3, 0, 0, "The use_mangled_mesa command should not be called."),
    (31, 3, 0, 0, "The load_command command should not be called."),
    (32, 3, 0, 0, "The output_required_files command should not be called."),
    (33, 3, 0, 0, "The export_library_dependencies command should not be called."),
    (34, 3, 0, 0, "The utility_source command should not be called."),
    (35, 3, 0, 0, "The variable_requires command should not be called."),
    (36, 3, 0, 0, "The build_name command should not be called."),
    (37, 3, 0, 0, "Target names should not be reserved and should match a validity pattern."),
    (38, 3, 0, 0, "Targets may not link directly to themselves."),
    (39, 3, 0, 0, "Utility targets may not have link dependencies."),
    (40, 3, 0, 0, "The target in the TARGET signature of add_custom_command() must exist."),
    (41, 3, 0, 0, "Error on relative include with generator expression."),
    (42, 3, 0, 0, "MACOSX_RPATH is enabled by default."),
    (43, 3, 0, 0, "Ignore COMPILE_DEFINITIONS_<Config> properties."),
    (44, 3, 0, 0, "Case sensitive <LANG>_COMPILER_ID generator expressions."),
    (45, 3, 0, 0, "Error on non-existent target in get_target_property."),
    (46, 3, 0, 0, "Error on non-existent dependency in add_dependencies."),
    (47, 3, 0, 0, "Use QCC compiler id for the qcc drivers on QNX."),
    (48, 3, 0, 0, "project() command manages VERSION variables."),
    (49, 3, 0, 0, "Do not expand variables in target source entries."),
    (50, 3, 0, 0, "Disallow add_custom_command SOURCE signatures."),
    (51, 3, 1, 0, "List TARGET_OBJECTS in SOURCES target property."),
    (52, 3, 1, 0, "Reject source and build dirs in installed INTERFACE_INCLUDE_DIRECTORIES."),
    (53, 3, 1, 0, "Simplify variable reference and escape sequence evaluation."),
    (54, 3, 1, 0, "Only interpret if() arguments as variables or keywords when unquoted."),
    (55, 3, 2, 0, "Strict checking for break() command."),
    (56, 3, 2, 0, "Honor link flags in try_compile() source-file signature."),
    (57, 3, 3, 0, "Support new IN_LIST if() operator."),
    (58, 3, 3, 0, "Ninja requires custom command byproducts to be explicit."),
    (59, 3, 3, 0, "Do not treat DEFINITIONS as a built-in directory property."),
    (60, 3, 3, 0, "Link libraries by full path even in implicit directories."),
    (61, 3, 4, 0, "CTest does not by default tell make to ignore errors (-i)."),
    (62, 3, 4, 0, "Disallow install() of export() result."),
    (63, 3, 3, 0, "Honor visibility properties for all target types."),
    (64, 3, 4, 0, "Support new TEST if() operator."),
    (65, 3, 4, 0, "Do not add flags to export symbols from executables without the ENABLE_EXPORTS target property."),
    (66, 3, 7, 0, "Honor per-config flags in try_compile() source-file signature."),
    (67, 3, 8, 0, "Honor language standard in try_compile() source-file signature."),
    (68, 3, 9, 0, "RPATH settings on macOS do not affect install_name."),
    (69, 3, 9, 0, "INTERPROCEDURAL_OPTIMIZATION is enforced when enabled."),
    (70, 3, 10, 0, "Define file(GENERATE) behavior for relative paths."),
    (71, 3, 10, 0, "Let AUTOMOC and AUTOUIC process GENERATED files."),
    (72, 3, 11, 0, "FindOpenGL prefers GLVND by default when available."),
    (73, 3, 12, 0, "Do not produce legacy _LIB_DEPENDS cache entries."),
    (74, 3, 12, 0, "find_package uses PackageName_ROOT variables."),
    (75, 3, 12, 0, "Include file check macros honor CMAKE_REQUIRED_LIBRARIES."),
    (76, 3, 13, 0, "target_sources() command converts relative paths to absolute."),
    (77, 3, 13, 0, "option() honors normal variables."),
    (78, 3, 13, 0, "UseSWIG generates standard target names."),
    (79, 3, 13, 0, "target_link_libraries allows use with targets in other directories."),
    (80, 3, 13, 0, "BundleUtilities cannot be included at configure time."),
    (81, 3, 13, 0, "Relative paths not allowed in LINK_DIRECTORIES target property."),
];

pub const CMP0000: PolicyId = PolicyId(0);
pub const CMP0002: PolicyId = PolicyId(2);
pub const CMP0007: PolicyId = PolicyId(7);
pub const CMP0009: PolicyId = PolicyId(9);
pub const CMP0010: PolicyId = PolicyId(10);
pub const CMP0011: PolicyId = PolicyId(11);
pub const CMP0012: PolicyId = PolicyId(12);
pub const CMP0023: PolicyId = PolicyId(23);
pub const CMP0029: PolicyId = PolicyId(29);
pub const CMP0035: PolicyId = PolicyId(35);
pub const CMP0036: PolicyId = PolicyId(36);
pub const CMP0037: PolicyId = PolicyId(37);
pub const CMP0038: PolicyId = PolicyId(38);
pub const CMP0039: PolicyId = PolicyId(39);
pub const CMP0045: PolicyId = PolicyId(45);
pub const CMP0048: PolicyId = PolicyId(48);
pub const CMP0053: PolicyId = PolicyId(53);
pub const CMP0054: PolicyId = PolicyId(54);
pub const CMP0055: PolicyId = PolicyId(55);
pub const CMP0057: PolicyId = PolicyId(57);
pub const CMP0064: PolicyId = PolicyId(64);
pub const CMP0076: PolicyId = PolicyId(76);
pub const CMP0077: PolicyId = PolicyId(77);

static POLICY_INFO_MAP: LazyLock<HashMap<PolicyId, &'static PolicyInfo>> =
    LazyLock::new(|| POLICY_INFO.iter().map(|p| (p.id, p)).collect());

pub fn policy_info(id: PolicyId) -> Option<&'static PolicyInfo> {
    POLICY_INFO_MAP.get(&id).copied()
}

pub fn all_policies() -> &'static [PolicyInfo] {
    POLICY_INFO
}

pub fn default_status(id: PolicyId) -> PolicyStatus {
    policy_info(id).map_or(PolicyStatus::Warn, |p| p.default)
}

/// The standard text for a policy that is still at WARN when its behavior
/// matters.
pub fn policy_warning(id: PolicyId) -> String {
    let desc = policy_info(id).map_or("", |p| p.description);
    format!(
        "Policy {id} is not set: {desc}  Run \"cmake --help-policy {id}\" for policy details.  \
         Use the cmake_policy command to set the policy and suppress this warning."
    )
}

pub fn required_policy_error(id: PolicyId) -> String {
    let version = policy_info(id).map_or_else(String::new, |p| p.version_string());
    format!(
        "Policy {id} may not be set to OLD behavior because this version of CMake no longer \
         supports it.  The policy was introduced in CMake version {version}, and use of NEW \
         behavior is now required.\n\nPlease either update your CMakeLists.txt files to \
         conform to the new behavior or use an older version of CMake that still supports \
         the old behavior."
    )
}

/// Explicit settings, as captured by a function or macro definition.
pub type PolicyMap = HashMap<PolicyId, PolicyStatus>;

#[derive(Debug, Default)]
struct PolicyStackEntry {
    map: PolicyMap,
    weak: bool,
}

/// The overlay of policy settings. Lookups walk from the innermost entry
/// outward and fall back to the compiled-in default.
#[derive(Debug)]
pub struct PolicyStack {
    entries: Vec<PolicyStackEntry>,
}

impl Default for PolicyStack {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyStack {
    pub fn new() -> Self {
        PolicyStack {
            entries: vec![PolicyStackEntry::default()],
        }
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, id: PolicyId) -> PolicyStatus {
        self.get_explicit(id).unwrap_or_else(|| default_status(id))
    }

    pub fn get_explicit(&self, id: PolicyId) -> Option<PolicyStatus> {
        self.entries.iter().rev().find_map(|e| e.map.get(&id).copied())
    }

    /// Sets `id` in every entry from the innermost one down to the nearest
    /// strong entry, so that a weak scope does not hide the setting from its
    /// enclosing strong scope when it pops.
    pub fn set(&mut self, id: PolicyId, status: PolicyStatus) {
        for entry in self.entries.iter_mut().rev() {
            entry.map.insert(id, status);
            if !entry.weak {
                break;
            }
        }
    }

    pub fn push(&mut self, weak: bool, map: PolicyMap) {
        self.entries.push(PolicyStackEntry { map, weak });
    }

    pub fn pop(&mut self) {
        if self.entries.len() > 1 {
            self.entries.pop();
        }
    }

    /// Whether the innermost entry holds no explicit settings.
    pub fn top_is_empty(&self) -> bool {
        self.entries.last().is_none_or(|e| e.map.is_empty())
    }

    /// Flattens the explicit settings visible from the innermost entry.
    pub fn record(&self) -> PolicyMap {
        let mut map = PolicyMap::new();
        for entry in &self.entries {
            map.extend(entry.map.iter().map(|(k, v)| (*k, *v)));
        }
        map
    }

    /// Applies `cmake_policy(VERSION)` semantics: every policy introduced at
    /// or before `version` becomes NEW and the rest are reset to WARN.
    pub fn set_version(&mut self, version: &str) -> Result<()> {
        let parts: Vec<&str> = version.split('.').collect();
        if parts.len() < 2
            || parts.len() > 4
            || parts
                .iter()
                .any(|p| p.is_empty() || !p.bytes().all(|c| c.is_ascii_digit()))
        {
            error!("Invalid policy version value \"{version}\".  A numeric major.minor[.patch[.tweak]] must be given.");
        }
        if version_compare(version, "2.4") == std::cmp::Ordering::Less {
            error!("Compatibility with CMake < 2.4 is not supported by CMake >= 3.0.");
        }
        if version_compare(version, crate::eval::CMAKE_VERSION) == std::cmp::Ordering::Greater {
            error!(
                "Policy VERSION \"{version}\" is greater than the running version of CMake \
                 ({}).",
                crate::eval::CMAKE_VERSION
            );
        }
        for info in POLICY_INFO {
            let introduced = info.version_string();
            if version_compare(&introduced, version) == std::cmp::Ordering::Greater {
                self.set(info.id, PolicyStatus::Warn);
            } else {
                self.set(info.id, PolicyStatus::New);
            }
        }
        Ok(())
    }
}

pub fn parse_status(s: &str) -> Option<PolicyStatus> {
    match s {
        "OLD" => Some(PolicyStatus::Old),
        "NEW" => Some(PolicyStatus::New),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(PolicyId::parse("CMP0054"), Some(CMP0054));
        assert_eq!(PolicyId::parse("CMP54"), None);
        assert_eq!(PolicyId::parse("CMP9999"), None);
        assert_eq!(CMP0007.to_string(), "CMP0007");
    }

    #[test]
    fn test_table_is_ordered() {
        for (i, p) in all_policies().iter().enumerate() {
            assert_eq!(p.id.0 as usize, i);
        }
    }

    #[test]
    fn test_version_selects_policies() {
        let mut old = PolicyStack::new();
        old.set_version("2.4").unwrap();
        assert_eq!(old.get(CMP0054), PolicyStatus::Warn);
        assert!(old.get(CMP0054).is_old_behavior());

        let mut new = PolicyStack::new();
        new.set_version("3.13").unwrap();
        assert_eq!(new.get(CMP0054), PolicyStatus::New);
        assert_eq!(new.get(CMP0007), PolicyStatus::New);

        let mut mid = PolicyStack::new();
        mid.set_version("3.1").unwrap();
        assert_eq!(mid.get(CMP0054), PolicyStatus::New);
        assert_eq!(mid.get(CMP0055), PolicyStatus::Warn);
    }

    #[test]
    fn test_bad_versions() {
        let mut s = PolicyStack::new();
        assert!(s.set_version("2.2").is_err());
        assert!(s.set_version("abc").is_err());
        assert!(s.set_version("99.0").is_err());
        assert!(s.set_version("3").is_err());
    }

    #[test]
    fn test_push_pop() {
        let mut s = PolicyStack::new();
        s.set(CMP0012, PolicyStatus::Old);
        s.push(false, PolicyMap::new());
        s.set(CMP0012, PolicyStatus::New);
        assert_eq!(s.get(CMP0012), PolicyStatus::New);
        s.pop();
        assert_eq!(s.get(CMP0012), PolicyStatus::Old);
    }

    #[test]
    fn test_weak_scope_sets_through() {
        let mut s = PolicyStack::new();
        s.push(true, PolicyMap::new());
        s.set(CMP0011, PolicyStatus::New);
        s.pop();
        assert_eq!(s.get(CMP0011), PolicyStatus::New);
    }

    #[test]
    fn test_record() {
        let mut s = PolicyStack::new();
        s.set(CMP0057, PolicyStatus::New);
        s.push(false, PolicyMap::new());
        s.set(CMP0064, PolicyStatus::Old);
        let map = s.record();
        assert_eq!(map.get(&CMP0057), Some(&PolicyStatus::New));
        assert_eq!(map.get(&CMP0064), Some(&PolicyStatus::Old));
    }
}
