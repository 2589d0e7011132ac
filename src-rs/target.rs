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


//! The build model a project run leaves behind: targets, tests and source
//! file properties, plus the project-mode commands that populate it.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::cache::CacheEntryType;
use crate::eval::{DirState, Evaluator, ExecutionStatus};
use crate::expand::expand_list_argument;
use crate::message::MessageType;
use crate::policy::{
    CMP0002, CMP0023, CMP0037, CMP0038, CMP0039, CMP0045, CMP0048, CMP0076, PolicyId, PolicyStatus,
    policy_warning,
};
use crate::property::{AppendMode, PropertyDefinition, PropertyMap, PropertyScope, update_property};
use crate::stmt::{ExpandedArgument, argument_values};
use crate::strutil::{collapse_full_path, is_full_path};
use crate::{error, log};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    Executable,
    StaticLibrary,
    SharedLibrary,
    ModuleLibrary,
    ObjectLibrary,
    InterfaceLibrary,
    UnknownLibrary,
    Utility,
}

impl TargetType {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetType::Executable => "EXECUTABLE",
            TargetType::StaticLibrary => "STATIC_LIBRARY",
            TargetType::SharedLibrary => "SHARED_LIBRARY",
            TargetType::ModuleLibrary => "MODULE_LIBRARY",
            TargetType::ObjectLibrary => "OBJECT_LIBRARY",
            TargetType::InterfaceLibrary => "INTERFACE_LIBRARY",
            TargetType::UnknownLibrary => "UNKNOWN_LIBRARY",
            TargetType::Utility => "UTILITY",
        }
    }

    fn description(self) -> &'static str {
        match self {
            TargetType::Executable => "an executable ",
            TargetType::StaticLibrary => "a static library ",
            TargetType::SharedLibrary => "a shared library ",
            TargetType::ModuleLibrary => "a module library ",
            TargetType::ObjectLibrary => "an object library ",
            TargetType::InterfaceLibrary => "an interface library ",
            TargetType::Utility => "a custom target ",
            TargetType::UnknownLibrary => "",
        }
    }

    pub fn is_library(self) -> bool {
        matches!(
            self,
            TargetType::StaticLibrary
                | TargetType::SharedLibrary
                | TargetType::ModuleLibrary
                | TargetType::ObjectLibrary
                | TargetType::InterfaceLibrary
                | TargetType::UnknownLibrary
        )
    }

    fn is_compilable(self) -> bool {
        !matches!(self, TargetType::UnknownLibrary | TargetType::Utility)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkSignature {
    Plain,
    Keyword,
}

/// What `add_custom_target` records besides the target itself.
#[derive(Debug, Clone, Default)]
pub struct CustomCommand {
    pub lines: Vec<Vec<String>>,
    pub depends: Vec<String>,
    pub byproducts: Vec<String>,
    pub working_directory: String,
    pub comment: Option<String>,
    pub verbatim: bool,
    pub uses_terminal: bool,
}

#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub ty: TargetType,
    pub imported: bool,
    pub source_dir: String,
    pub binary_dir: String,
    pub sources: Vec<String>,
    pub link_libraries: Vec<String>,
    pub include_directories: Vec<String>,
    pub compile_definitions: Vec<String>,
    pub compile_options: Vec<String>,
    /// Target-level dependencies from `add_dependencies`, sorted.
    pub dependencies: Vec<String>,
    pub custom: Option<CustomCommand>,
    pub properties: PropertyMap,
    link_signature: Option<LinkSignature>,
}

const INTERFACE_ALLOWED_PROPERTIES: &[&str] = &[
    "BINARY_DIR",
    "COMPATIBLE_INTERFACE_BOOL",
    "COMPATIBLE_INTERFACE_NUMBER_MAX",
    "COMPATIBLE_INTERFACE_NUMBER_MIN",
    "COMPATIBLE_INTERFACE_STRING",
    "EXPORT_NAME",
    "IMPORTED",
    "IMPORTED_GLOBAL",
    "MANUALLY_ADDED_DEPENDENCIES",
    "NAME",
    "NO_SYSTEM_FROM_IMPORTED",
    "SOURCE_DIR",
    "TYPE",
];

fn whitelist_error(prop: &str) -> String {
    format!(
        "INTERFACE_LIBRARY targets may only have whitelisted properties.  The property \"{prop}\" is not allowed."
    )
}

impl Target {
    fn new(name: &str, ty: TargetType, imported: bool, dir: Option<&DirState>) -> Self {
        let mut target = Target {
            name: name.to_string(),
            ty,
            imported,
            source_dir: dir.map(|d| d.source_dir.clone()).unwrap_or_default(),
            binary_dir: dir.map(|d| d.binary_dir.clone()).unwrap_or_default(),
            sources: Vec::new(),
            link_libraries: Vec::new(),
            include_directories: Vec::new(),
            compile_definitions: Vec::new(),
            compile_options: Vec::new(),
            dependencies: Vec::new(),
            custom: None,
            properties: PropertyMap::new(),
            link_signature: None,
        };
        if let Some(dir) = dir.filter(|_| !imported && ty != TargetType::InterfaceLibrary) {
            let inherited = |prop: &str| dir.properties.get(prop).filter(|v| !v.is_empty()).cloned();
            target.include_directories.extend(inherited("INCLUDE_DIRECTORIES"));
            target.compile_options.extend(inherited("COMPILE_OPTIONS"));
        }
        target
    }

    fn entries(&self, prop: &str) -> Option<&Vec<String>> {
        match prop {
            "SOURCES" => Some(&self.sources),
            "LINK_LIBRARIES" => Some(&self.link_libraries),
            "INCLUDE_DIRECTORIES" => Some(&self.include_directories),
            "COMPILE_DEFINITIONS" => Some(&self.compile_definitions),
            "COMPILE_OPTIONS" => Some(&self.compile_options),
            _ => None,
        }
    }

    fn entries_mut(&mut self, prop: &str) -> Option<&mut Vec<String>> {
        match prop {
            "SOURCES" => Some(&mut self.sources),
            "LINK_LIBRARIES" => Some(&mut self.link_libraries),
            "INCLUDE_DIRECTORIES" => Some(&mut self.include_directories),
            "COMPILE_DEFINITIONS" => Some(&mut self.compile_definitions),
            "COMPILE_OPTIONS" => Some(&mut self.compile_options),
            _ => None,
        }
    }

    /// Interface libraries only carry a fixed set of properties.
    pub fn allows_property(&self, prop: &str) -> bool {
        if self.ty != TargetType::InterfaceLibrary {
            return true;
        }
        ["INTERFACE_", "_", "MAP_IMPORTED_CONFIG_", "IMPORTED_LIBNAME"].iter().any(|p| prop.starts_with(p))
            || prop.starts_with(|c: char| c.is_ascii_lowercase())
            || INTERFACE_ALLOWED_PROPERTIES.contains(&prop)
    }

    pub fn get_property(&self, prop: &str) -> Option<String> {
        match prop {
            "NAME" => return Some(self.name.clone()),
            "TYPE" => return Some(self.ty.as_str().to_string()),
            "IMPORTED" => return Some(if self.imported { "TRUE" } else { "FALSE" }.to_string()),
            "SOURCE_DIR" => return Some(self.source_dir.clone()),
            "BINARY_DIR" => return Some(self.binary_dir.clone()),
            "MANUALLY_ADDED_DEPENDENCIES" => {
                return (!self.dependencies.is_empty()).then(|| self.dependencies.join(";"));
            }
            _ => {}
        }
        match self.entries(prop) {
            Some(entries) => (!entries.is_empty()).then(|| entries.join(";")),
            None => self.properties.get(prop).cloned(),
        }
    }

    /// Applies a property update. The error text is reported as a fatal
    /// error by the caller.
    pub fn set_property(&mut self, prop: &str, value: Option<&str>, mode: AppendMode) -> Result<(), String> {
        if !self.allows_property(prop) {
            return Err(whitelist_error(prop));
        }
        if matches!(prop, "NAME" | "TYPE" | "IMPORTED" | "MANUALLY_ADDED_DEPENDENCIES" | "SOURCE_DIR" | "BINARY_DIR") {
            return Err(format!("{prop} property is read-only\n"));
        }
        if prop == "SOURCES" && self.imported {
            return Err(format!("SOURCES property can't be set on imported targets (\"{}\")\n", self.name));
        }
        match self.entries_mut(prop) {
            Some(entries) => {
                if mode == AppendMode::Set {
                    entries.clear();
                }
                if let Some(v) = value.filter(|v| mode == AppendMode::Set || !v.is_empty()) {
                    entries.push(v.to_string());
                }
            }
            None => update_property(&mut self.properties, prop, value, mode),
        }
        Ok(())
    }

    fn add_dependency(&mut self, name: &str) {
        if let Err(pos) = self.dependencies.binary_search_by(|d| d.as_str().cmp(name)) {
            self.dependencies.insert(pos, name.to_string());
        }
    }

    /// Where the built executable lands, for test commands that name it.
    pub fn executable_path(&self, suffix: &str) -> Option<String> {
        if self.ty != TargetType::Executable {
            return None;
        }
        if self.imported {
            return self.properties.get("IMPORTED_LOCATION").cloned();
        }
        let dir = self.properties.get("RUNTIME_OUTPUT_DIRECTORY").unwrap_or(&self.binary_dir);
        let name = self.properties.get("OUTPUT_NAME").unwrap_or(&self.name);
        Some(format!("{dir}/{name}{suffix}"))
    }
}

#[derive(Debug, Clone)]
pub struct Test {
    pub name: String,
    /// Source directory that declared the test.
    pub dir: String,
    pub command: Vec<String>,
    pub configurations: Vec<String>,
    /// `command` with an executable target name replaced by its output
    /// path, filled in once the project has been read.
    pub resolved_command: Option<Vec<String>>,
    pub properties: PropertyMap,
    old_style: bool,
}

impl Test {
    fn new(name: &str, dir: &str, command: Vec<String>, old_style: bool) -> Self {
        Test {
            name: name.to_string(),
            dir: dir.to_string(),
            command,
            configurations: Vec::new(),
            resolved_command: None,
            properties: PropertyMap::new(),
            old_style,
        }
    }
}

#[derive(Debug, Default)]
pub struct BuildState {
    /// In creation order.
    targets: Vec<Target>,
    target_index: HashMap<String, usize>,
    aliases: BTreeMap<String, String>,
    tests: Vec<Test>,
    sources: BTreeMap<String, PropertyMap>,
    definitions: HashMap<(PropertyScope, String), PropertyDefinition>,
    finished: Vec<DirState>,
}

impl BuildState {
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    pub fn tests(&self) -> impl Iterator<Item = &Test> {
        self.tests.iter()
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map_or(name, String::as_str)
    }

    /// Looks up a target by name or alias.
    pub fn find_target(&self, name: &str) -> Option<&Target> {
        let index = *self.target_index.get(self.resolve(name))?;
        self.targets.get(index)
    }

    pub fn find_target_mut(&mut self, name: &str) -> Option<&mut Target> {
        let index = *self.target_index.get(self.resolve(name))?;
        self.targets.get_mut(index)
    }

    pub fn alias_target_property(&self, name: &str, prop: &str) -> Option<String> {
        if prop != "ALIASED_TARGET" {
            return None;
        }
        self.aliases.get(name).cloned()
    }

    fn add_target(&mut self, target: Target) -> &mut Target {
        log!("add target {} ({})", target.name, target.ty.as_str());
        let index = match self.target_index.get(&target.name) {
            Some(&i) => {
                self.targets[i] = target;
                i
            }
            None => {
                self.target_index.insert(target.name.clone(), self.targets.len());
                self.targets.push(target);
                self.targets.len() - 1
            }
        };
        &mut self.targets[index]
    }

    fn add_alias(&mut self, alias: &str, target: &str) {
        log!("add alias {alias} -> {target}");
        self.aliases.insert(alias.to_string(), target.to_string());
    }

    /// Non-imported targets created in `dir`, in creation order.
    pub fn directory_targets(&self, dir: &str) -> Vec<String> {
        self.targets.iter().filter(|t| !t.imported && t.source_dir == dir).map(|t| t.name.clone()).collect()
    }

    pub fn has_test_in(&self, dir: &str, name: &str) -> bool {
        self.find_test(dir, name).is_some()
    }

    pub fn find_test(&self, dir: &str, name: &str) -> Option<&Test> {
        self.tests.iter().find(|t| t.dir == dir && t.name == name)
    }

    pub fn find_test_mut(&mut self, dir: &str, name: &str) -> Option<&mut Test> {
        self.tests.iter_mut().find(|t| t.dir == dir && t.name == name)
    }

    pub fn directory_tests(&self, dir: &str) -> Vec<String> {
        self.tests.iter().filter(|t| t.dir == dir).map(|t| t.name.clone()).collect()
    }

    /// Properties of a source file, created on first use.
    pub fn source_mut(&mut self, path: &str) -> &mut PropertyMap {
        self.sources.entry(path.to_string()).or_default()
    }

    pub fn source_property(&self, path: &str, prop: &str) -> Option<String> {
        self.sources.get(path)?.get(prop).cloned()
    }

    /// Keeps a processed subdirectory around for property queries.
    pub fn finish_directory(&mut self, dir: DirState) {
        self.finished.push(dir);
    }

    pub fn finished_directories(&self) -> impl Iterator<Item = &DirState> {
        self.finished.iter()
    }

    pub fn finished_directories_mut(&mut self) -> impl Iterator<Item = &mut DirState> {
        self.finished.iter_mut()
    }

    /// The first definition of a property wins.
    pub fn define_property(&mut self, scope: PropertyScope, name: &str, def: PropertyDefinition) {
        self.definitions.entry((scope, name.to_string())).or_insert(def);
    }

    pub fn property_definition(&self, scope: PropertyScope, name: &str) -> Option<&PropertyDefinition> {
        self.definitions.get(&(scope, name.to_string()))
    }

    pub fn is_inherited(&self, scope: PropertyScope, name: &str) -> bool {
        self.property_definition(scope, name).is_some_and(|d| d.inherited)
    }

    fn resolve_test_commands(&mut self, suffix: &str) {
        for i in 0..self.tests.len() {
            let test = &self.tests[i];
            let mut command = test.command.clone();
            if !test.old_style {
                if let Some(first) = command.first_mut() {
                    if let Some(path) = self.find_target(first).and_then(|t| t.executable_path(suffix)) {
                        *first = path;
                    }
                }
            }
            self.tests[i].resolved_command = Some(command);
        }
    }
}

/// `set_property(TARGET)` and `set_target_properties()` land here.
pub fn apply_target_property(
    ev: &mut Evaluator,
    name: &str,
    prop: &str,
    value: Option<&str>,
    mode: AppendMode,
) -> Result<()> {
    let Some(target) = ev.build.find_target_mut(name) else {
        error!("Can not find target to add properties to: {name}");
    };
    if let Err(text) = target.set_property(prop, value, mode) {
        ev.issue_message(MessageType::FatalError, &text);
    }
    Ok(())
}

/// Reports `text` the way the current setting of `id` asks for. Returns
/// true once the NEW behavior has turned it into a fatal error.
fn policy_diagnostic(ev: &mut Evaluator, id: PolicyId, text: &str) -> bool {
    match ev.policy_status(id) {
        PolicyStatus::Old => false,
        PolicyStatus::Warn => {
            ev.issue_message(MessageType::AuthorWarning, &format!("{}\n{text}", policy_warning(id)));
            false
        }
        _ => {
            ev.issue_message(MessageType::FatalError, text);
            true
        }
    }
}

static VALID_TARGET_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.:+-]+$").unwrap());

const RESERVED_TARGET_NAMES: &[&str] = &[
    "all",
    "ALL_BUILD",
    "help",
    "install",
    "INSTALL",
    "preinstall",
    "clean",
    "edit_cache",
    "rebuild_cache",
    "test",
    "RUN_TESTS",
    "package",
    "PACKAGE",
    "package_source",
    "ZERO_CHECK",
];

fn is_valid_target_name(name: &str) -> bool {
    VALID_TARGET_NAME.is_match(name)
}

/// Returns false when the name is rejected outright.
fn check_target_name(ev: &mut Evaluator, name: &str, allow_colon: bool) -> bool {
    let ok = is_valid_target_name(name)
        && !RESERVED_TARGET_NAMES.contains(&name)
        && (allow_colon || !name.contains(':'));
    if ok {
        return true;
    }
    let text = format!(
        "The target name \"{name}\" is reserved or not valid for certain CMake features, such as generator \
         expressions, and may result in undefined behavior."
    );
    !policy_diagnostic(ev, CMP0037, &text)
}

fn enforce_unique_name(ev: &mut Evaluator, name: &str) -> Result<()> {
    if ev.build.is_alias(name) {
        error!("cannot create target \"{name}\" because an alias with the same name already exists.");
    }
    let Some(existing) = ev.build.find_target(name) else {
        return Ok(());
    };
    if existing.imported {
        error!("cannot create target \"{name}\" because an imported target with the same name already exists.");
    }
    let description = existing.ty.description();
    let dir = existing.source_dir.clone();
    match ev.policy_status(CMP0002) {
        PolicyStatus::Old => return Ok(()),
        PolicyStatus::Warn => {
            ev.issue_message(MessageType::AuthorWarning, &policy_warning(CMP0002));
            return Ok(());
        }
        _ => {}
    }
    error!(
        "cannot create target \"{name}\" because another target with the same name already exists.  The existing \
         target is {description}created in source directory \"{dir}\".  See documentation for policy CMP0002 for \
         more details."
    );
}

fn create_target<'a>(ev: &'a mut Evaluator, name: &str, ty: TargetType, imported: bool) -> &'a mut Target {
    let target = Target::new(name, ty, imported, ev.dirs.last());
    ev.build.add_target(target)
}

fn create_alias(
    ev: &mut Evaluator,
    name: &str,
    aliased: &str,
    accepts: fn(TargetType) -> bool,
    kind: &str,
) -> Result<()> {
    if ev.build.is_alias(aliased) {
        error!("cannot create ALIAS target \"{name}\" because target \"{aliased}\" is itself an ALIAS.");
    }
    let Some(target) = ev.build.find_target(aliased) else {
        error!("cannot create ALIAS target \"{name}\" because target \"{aliased}\" does not exist.");
    };
    if !accepts(target.ty) {
        error!("cannot create ALIAS target \"{name}\" because target \"{aliased}\" is not {kind}.");
    }
    if target.imported {
        error!("cannot create ALIAS target \"{name}\" because target \"{aliased}\" is IMPORTED.");
    }
    ev.build.add_alias(name, aliased);
    Ok(())
}

fn mark(target: &mut Target, prop: &str, on: bool) {
    if on {
        target.properties.insert(prop.to_string(), "TRUE".to_string());
    }
}

pub fn add_executable_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    let Some(name) = args.first() else {
        error!("called with incorrect number of arguments");
    };
    let (mut win32, mut bundle, mut exclude, mut imported, mut global) = (false, false, false, false, false);
    let mut i = 1;
    while let Some(arg) = args.get(i) {
        match arg.as_str() {
            "WIN32" => win32 = true,
            "MACOSX_BUNDLE" => bundle = true,
            "EXCLUDE_FROM_ALL" => exclude = true,
            "IMPORTED" => imported = true,
            "GLOBAL" if imported => global = true,
            _ => break,
        }
        i += 1;
    }
    let is_alias = args.get(i).is_some_and(|a| a == "ALIAS");
    if !check_target_name(ev, name, imported || is_alias) {
        return Ok(());
    }
    if imported {
        if win32 {
            error!("may not be given WIN32 for an IMPORTED target.");
        }
        if bundle {
            error!("may not be given MACOSX_BUNDLE for an IMPORTED target.");
        }
        if exclude {
            error!("may not be given EXCLUDE_FROM_ALL for an IMPORTED target.");
        }
    }
    if is_alias {
        if !is_valid_target_name(name) {
            error!("Invalid name for ALIAS: {name}");
        }
        if exclude {
            error!("EXCLUDE_FROM_ALL with ALIAS makes no sense.");
        }
        if imported {
            error!("IMPORTED with ALIAS is not allowed.");
        }
        if args.len() != 3 {
            error!("ALIAS requires exactly one target argument.");
        }
        return create_alias(ev, name, &args[2], |ty| ty == TargetType::Executable, "an executable");
    }
    if imported {
        if ev.build.find_target(name).is_some() {
            error!(
                "cannot create imported target \"{name}\" because another target with the same name already exists."
            );
        }
        let target = create_target(ev, name, TargetType::Executable, true);
        mark(target, "IMPORTED_GLOBAL", global);
        return Ok(());
    }
    enforce_unique_name(ev, name)?;
    let target = create_target(ev, name, TargetType::Executable, false);
    target.sources.extend(args[i..].iter().cloned());
    mark(target, "WIN32_EXECUTABLE", win32);
    mark(target, "MACOSX_BUNDLE", bundle);
    mark(target, "EXCLUDE_FROM_ALL", exclude);
    Ok(())
}

pub fn add_library_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    let Some(name) = args.first() else {
        error!("called with incorrect number of arguments");
    };
    let mut ty = if ev.is_on("BUILD_SHARED_LIBS") { TargetType::SharedLibrary } else { TargetType::StaticLibrary };
    let (mut explicit, mut is_alias, mut imported, mut global, mut exclude) = (false, false, false, false, false);
    let mut i = 1;
    while let Some(arg) = args.get(i) {
        let interface = ty == TargetType::InterfaceLibrary;
        match arg.as_str() {
            kw @ ("STATIC" | "SHARED" | "MODULE" | "OBJECT" | "UNKNOWN") => {
                if interface {
                    error!("INTERFACE library specified with conflicting {kw} type.");
                }
                ty = match kw {
                    "STATIC" => TargetType::StaticLibrary,
                    "SHARED" => TargetType::SharedLibrary,
                    "MODULE" => TargetType::ModuleLibrary,
                    "OBJECT" => TargetType::ObjectLibrary,
                    _ => TargetType::UnknownLibrary,
                };
                explicit = true;
            }
            "ALIAS" => {
                if interface {
                    error!("INTERFACE library specified with conflicting ALIAS type.");
                }
                is_alias = true;
            }
            "INTERFACE" => {
                if explicit {
                    error!("INTERFACE library specified with conflicting/multiple types.");
                }
                if is_alias {
                    error!("INTERFACE library specified with conflicting ALIAS type.");
                }
                if exclude {
                    error!("INTERFACE library may not be used with EXCLUDE_FROM_ALL.");
                }
                ty = TargetType::InterfaceLibrary;
                explicit = true;
            }
            "EXCLUDE_FROM_ALL" => {
                if interface {
                    error!("INTERFACE library may not be used with EXCLUDE_FROM_ALL.");
                }
                exclude = true;
            }
            "IMPORTED" => imported = true,
            "GLOBAL" if imported => global = true,
            "GLOBAL" if interface => error!("GLOBAL option may only be used with IMPORTED libraries."),
            _ => break,
        }
        i += 1;
    }
    let sources = &args[i..];
    if ty == TargetType::InterfaceLibrary {
        if !sources.is_empty() {
            error!("INTERFACE library requires no source arguments.");
        }
        if global && !imported {
            error!("INTERFACE library specified as GLOBAL, but not as IMPORTED.");
        }
    }
    if !check_target_name(ev, name, imported || is_alias) {
        return Ok(());
    }
    if is_alias {
        if !is_valid_target_name(name) {
            error!("Invalid name for ALIAS: {name}");
        }
        if exclude {
            error!("EXCLUDE_FROM_ALL with ALIAS makes no sense.");
        }
        if imported {
            error!("IMPORTED with ALIAS is not allowed.");
        }
        if args.len() != 3 {
            error!("ALIAS requires exactly one target argument.");
        }
        return create_alias(ev, name, &args[2], TargetType::is_library, "a library");
    }
    if imported {
        if exclude {
            error!("excludeFromAll with IMPORTED target makes no sense.");
        }
        if !explicit {
            error!("called with IMPORTED argument but no library type.");
        }
        if ty == TargetType::InterfaceLibrary && !is_valid_target_name(name) {
            error!("Invalid name for IMPORTED INTERFACE library target: {name}");
        }
        if ev.build.find_target(name).is_some() {
            error!(
                "cannot create imported target \"{name}\" because another target with the same name already exists."
            );
        }
        let target = create_target(ev, name, ty, true);
        mark(target, "IMPORTED_GLOBAL", global);
        return Ok(());
    }
    if ty == TargetType::UnknownLibrary {
        ev.issue_message(MessageType::FatalError, "The UNKNOWN library type may be used only for IMPORTED libraries.");
        return Ok(());
    }
    enforce_unique_name(ev, name)?;
    if ty == TargetType::InterfaceLibrary && (!is_valid_target_name(name) || name.contains("::")) {
        error!("Invalid name for INTERFACE library target: {name}");
    }
    let target = create_target(ev, name, ty, false);
    target.sources.extend(sources.iter().cloned());
    mark(target, "EXCLUDE_FROM_ALL", exclude);
    Ok(())
}

pub fn add_custom_target_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    #[derive(PartialEq)]
    enum Doing {
        Command,
        Depends,
        Byproducts,
        WorkingDirectory,
        Comment,
        Sources,
        Nothing,
    }

    let args = argument_values(args);
    let Some(name) = args.first() else {
        error!("called with incorrect number of arguments");
    };
    if name.contains(['/', '\\']) {
        error!(
            "called with invalid target name \"{name}\".  Target names may not contain a slash.  Use \
             ADD_CUSTOM_COMMAND to generate files."
        );
    }
    let mut custom = CustomCommand::default();
    let mut sources = Vec::new();
    let mut line = Vec::new();
    let mut all = false;
    let mut start = 1;
    if args.get(1).is_some_and(|a| a == "ALL") {
        all = true;
        start = 2;
    }
    let binary_dir = ev.current_binary_dir();
    let mut doing = Doing::Command;
    for arg in &args[start..] {
        match arg.as_str() {
            "DEPENDS" => doing = Doing::Depends,
            "BYPRODUCTS" => doing = Doing::Byproducts,
            "WORKING_DIRECTORY" => doing = Doing::WorkingDirectory,
            "COMMENT" => doing = Doing::Comment,
            "SOURCES" => doing = Doing::Sources,
            "VERBATIM" => {
                custom.verbatim = true;
                doing = Doing::Nothing;
            }
            "USES_TERMINAL" => {
                custom.uses_terminal = true;
                doing = Doing::Nothing;
            }
            "COMMAND_EXPAND_LISTS" => doing = Doing::Nothing,
            "COMMAND" => {
                doing = Doing::Command;
                if !line.is_empty() {
                    custom.lines.push(std::mem::take(&mut line));
                }
            }
            _ => match doing {
                Doing::Command => line.push(arg.clone()),
                Doing::Depends => custom.depends.push(arg.replace('\\', "/")),
                Doing::Byproducts => custom.byproducts.push(collapse_full_path(arg, &binary_dir)),
                Doing::WorkingDirectory => custom.working_directory = arg.clone(),
                Doing::Comment => custom.comment = Some(arg.clone()),
                Doing::Sources => sources.push(arg.clone()),
                Doing::Nothing => error!("Wrong syntax. Unknown type of argument."),
            },
        }
    }
    if let Some(c) = name.chars().find(|c| matches!(c, '#' | '<' | '>')) {
        error!("called with target name containing a \"{c}\".  This character is not allowed.");
    }
    if !check_target_name(ev, name, false) {
        return Ok(());
    }
    if !line.is_empty() {
        custom.lines.push(line);
    }
    enforce_unique_name(ev, name)?;
    if !custom.working_directory.is_empty() {
        custom.working_directory = collapse_full_path(&custom.working_directory, &binary_dir);
    }
    if custom.lines.is_empty() {
        if !custom.byproducts.is_empty() {
            ev.issue_message(MessageType::FatalError, "BYPRODUCTS may not be specified without any COMMAND");
            return Ok(());
        }
        if custom.uses_terminal {
            ev.issue_message(MessageType::FatalError, "USES_TERMINAL may not be specified without any COMMAND");
            return Ok(());
        }
    }
    let target = create_target(ev, name, TargetType::Utility, false);
    target.sources = sources;
    target.custom = Some(custom);
    mark(target, "EXCLUDE_FROM_ALL", !all);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkScope {
    Plain,
    PlainPrivate,
    PlainPublic,
    PlainInterface,
    Private,
    Public,
    Interface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkConfig {
    General,
    Debug,
    Optimized,
}

impl Display for LinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LinkConfig::General => "general",
            LinkConfig::Debug => "debug",
            LinkConfig::Optimized => "optimized",
        })
    }
}

pub fn target_link_libraries_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    let args = argument_values(args);
    let Some(name) = args.first() else {
        error!("called with incorrect number of arguments");
    };
    if ev.build.is_alias(name) {
        error!("can not be used on an ALIAS target.");
    }
    let ty = match ev.build.find_target(name) {
        Some(target) if !target.imported => target.ty,
        _ => {
            let text = format!("Cannot specify link libraries for target \"{name}\" which is not built by this project.");
            ev.issue_message(MessageType::FatalError, &text);
            return Ok(());
        }
    };
    if ty == TargetType::Utility {
        let text = format!("Utility target \"{name}\" must not be used as the target of a target_link_libraries call.");
        if policy_diagnostic(ev, CMP0039, &text) {
            return Ok(());
        }
    }

    let mut scope = LinkScope::Plain;
    let mut config: Option<LinkConfig> = None;
    for (i, arg) in args.iter().enumerate().skip(1) {
        let leading = i == 1;
        let after_keyword = leading || matches!(scope, LinkScope::Private | LinkScope::Public | LinkScope::Interface);
        let after_plain = leading || matches!(scope, LinkScope::PlainPrivate | LinkScope::PlainPublic);
        let text = match arg.as_str() {
            "LINK_INTERFACE_LIBRARIES" if !leading => Some(
                "The LINK_INTERFACE_LIBRARIES option must appear as the second argument, just after the target name.",
            ),
            "INTERFACE" | "PUBLIC" | "PRIVATE" if !after_keyword => Some(
                "The INTERFACE, PUBLIC or PRIVATE option must appear as the second argument, just after the target \
                 name.",
            ),
            "LINK_PUBLIC" | "LINK_PRIVATE" if !after_plain => Some(
                "The LINK_PUBLIC or LINK_PRIVATE option must appear as the second argument, just after the target \
                 name.",
            ),
            _ => None,
        };
        if let Some(text) = text {
            ev.issue_message(MessageType::FatalError, text);
            return Ok(());
        }
        let next_config = match arg.as_str() {
            "LINK_INTERFACE_LIBRARIES" => {
                scope = LinkScope::PlainInterface;
                continue;
            }
            "INTERFACE" => {
                scope = LinkScope::Interface;
                continue;
            }
            "PUBLIC" => {
                scope = LinkScope::Public;
                continue;
            }
            "PRIVATE" => {
                scope = LinkScope::Private;
                continue;
            }
            "LINK_PUBLIC" => {
                scope = LinkScope::PlainPublic;
                continue;
            }
            "LINK_PRIVATE" => {
                scope = LinkScope::PlainPrivate;
                continue;
            }
            "debug" => LinkConfig::Debug,
            "optimized" => LinkConfig::Optimized,
            "general" => LinkConfig::General,
            _ => {
                let link_config = config.take().unwrap_or(LinkConfig::General);
                if !link_library(ev, name, ty, arg, scope, link_config) {
                    return Ok(());
                }
                continue;
            }
        };
        if let Some(previous) = config {
            let text = format!(
                "Link library type specifier \"{previous}\" is followed by specifier \"{next_config}\" instead of a \
                 library name.  The first specifier will be ignored."
            );
            ev.issue_message(MessageType::AuthorWarning, &text);
        }
        config = Some(next_config);
    }
    if let Some(config) = config {
        let text = format!("The \"{config}\" argument must be followed by a library.");
        ev.issue_message(MessageType::FatalError, &text);
    }
    Ok(())
}

/// Returns false when processing of the remaining items must stop.
fn link_library(ev: &mut Evaluator, name: &str, ty: TargetType, lib: &str, scope: LinkScope, config: LinkConfig) -> bool {
    if ty == TargetType::InterfaceLibrary && scope != LinkScope::Interface {
        ev.issue_message(
            MessageType::FatalError,
            "INTERFACE library can only be used with the INTERFACE keyword of target_link_libraries",
        );
        return false;
    }
    let signature = match scope {
        LinkScope::Plain | LinkScope::PlainPrivate | LinkScope::PlainPublic | LinkScope::PlainInterface => {
            LinkSignature::Plain
        }
        _ => LinkSignature::Keyword,
    };
    let previous = ev.build.find_target(name).and_then(|t| t.link_signature);
    if previous.is_some_and(|p| p != signature) {
        let existing = if signature == LinkSignature::Keyword { "plain" } else { "keyword" };
        let diagnostic = match ev.policy_status(CMP0023) {
            PolicyStatus::Old => None,
            PolicyStatus::Warn => Some((format!("{}\n", policy_warning(CMP0023)), "should", MessageType::AuthorWarning)),
            _ => Some((String::new(), "must", MessageType::FatalError)),
        };
        if let Some((mut text, modal, t)) = diagnostic {
            text.push_str(&format!(
                "The {existing} signature for target_link_libraries has already been used with the target \
                 \"{name}\".  All uses of target_link_libraries with a target {modal} be either all-keyword or \
                 all-plain.\n"
            ));
            ev.issue_message(t, &text);
            if t == MessageType::FatalError {
                return false;
            }
        }
    }
    if lib == name && policy_diagnostic(ev, CMP0038, &format!("Target \"{name}\" links to itself.")) {
        return false;
    }

    let item = match config {
        LinkConfig::General => lib.to_string(),
        LinkConfig::Debug => format!("$<$<CONFIG:DEBUG>:{lib}>"),
        LinkConfig::Optimized => format!("$<$<NOT:$<CONFIG:DEBUG>>:{lib}>"),
    };
    let Some(target) = ev.build.find_target_mut(name) else {
        return false;
    };
    target.link_signature.get_or_insert(signature);
    let interface_only = matches!(scope, LinkScope::Interface | LinkScope::PlainInterface);
    let private = matches!(scope, LinkScope::Private | LinkScope::PlainPrivate);
    if !interface_only {
        target.link_libraries.push(item.clone());
    }
    let interface_item = if !private {
        Some(item)
    } else if ty == TargetType::StaticLibrary {
        Some(format!("$<LINK_ONLY:{item}>"))
    } else {
        None
    };
    if let Some(item) = interface_item {
        update_property(&mut target.properties, "INTERFACE_LINK_LIBRARIES", Some(&item), AppendMode::Append);
    }
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Content {
    IncludeDirectories,
    CompileDefinitions,
    CompileOptions,
    Sources,
}

impl Content {
    fn property(self) -> &'static str {
        match self {
            Content::IncludeDirectories => "INCLUDE_DIRECTORIES",
            Content::CompileDefinitions => "COMPILE_DEFINITIONS",
            Content::CompileOptions => "COMPILE_OPTIONS",
            Content::Sources => "SOURCES",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Content::IncludeDirectories => "include directories",
            Content::CompileDefinitions => "compile definitions",
            Content::CompileOptions => "compile options",
            Content::Sources => "sources",
        }
    }
}

fn is_scope_keyword(s: &str) -> bool {
    matches!(s, "PUBLIC" | "PRIVATE" | "INTERFACE")
}

fn prepend_or_append(list: &mut Vec<String>, entry: String, before: bool) {
    if before {
        list.insert(0, entry);
    } else {
        list.push(entry);
    }
}

fn prepend_or_append_property(map: &mut PropertyMap, prop: &str, entry: &str, before: bool) {
    if before {
        if let Some(v) = map.get_mut(prop).filter(|v| !v.is_empty()) {
            *v = format!("{entry};{v}");
            return;
        }
    }
    update_property(map, prop, Some(entry), AppendMode::Append);
}

/// Turns the items of one scope section into a single property entry.
fn content_entry(
    ev: &mut Evaluator,
    content: Content,
    items: &[String],
    target: &Target,
    interface: bool,
) -> String {
    let base = ev.current_source_dir();
    match content {
        Content::IncludeDirectories => items
            .iter()
            .map(|d| {
                if d.is_empty() || d.starts_with("$<") || is_full_path(d) {
                    d.clone()
                } else {
                    format!("{base}/{d}")
                }
            })
            .collect::<Vec<_>>()
            .join(";"),
        Content::CompileDefinitions => {
            items.iter().map(|d| d.strip_prefix("-D").unwrap_or(d)).collect::<Vec<_>>().join(";")
        }
        Content::CompileOptions => items.join(";"),
        Content::Sources => {
            let same_dir = base == target.source_dir;
            let mut changed = false;
            let absolute: Vec<String> = items
                .iter()
                .map(|s| {
                    if is_full_path(s) || s.starts_with("$<") || (!interface && same_dir) {
                        s.clone()
                    } else {
                        changed = true;
                        format!("{base}/{s}")
                    }
                })
                .collect();
            if !changed {
                return items.join(";");
            }
            match ev.policy_status(CMP0076) {
                PolicyStatus::Old => items.join(";"),
                PolicyStatus::Warn => {
                    let detail = if interface {
                        format!("An interface source of target \"{}\" has a relative path.", target.name)
                    } else {
                        format!(
                            "A private source from a directory other than that of target \"{}\" has a relative path.",
                            target.name
                        )
                    };
                    ev.issue_message(MessageType::AuthorWarning, &format!("{}\n{detail}", policy_warning(CMP0076)));
                    items.join(";")
                }
                _ => absolute.join(";"),
            }
        }
    }
}

fn target_content_command(ev: &mut Evaluator, args: &[ExpandedArgument], content: Content) -> Result<()> {
    let args = argument_values(args);
    if args.len() < 2 {
        error!("called with incorrect number of arguments");
    }
    let name = &args[0];
    if ev.build.is_alias(name) {
        error!("can not be used on an ALIAS target.");
    }
    let Some(target) = ev.build.find_target(name).cloned() else {
        let text = format!("Cannot specify {} for target \"{name}\" which is not built by this project.", content.description());
        ev.issue_message(MessageType::FatalError, &text);
        return Ok(());
    };
    if !target.ty.is_compilable() {
        error!("called with non-compilable target type");
    }

    let mut index = 1;
    let mut system = false;
    let mut before = false;
    if content == Content::IncludeDirectories && args[index] == "SYSTEM" {
        if args.len() < 3 {
            error!("called with invalid arguments");
        }
        system = true;
        index += 1;
    }
    let accepts_before = matches!(content, Content::IncludeDirectories | Content::CompileOptions);
    if accepts_before && args.get(index).is_some_and(|a| a == "BEFORE") {
        if args.len() < 3 {
            error!("called with invalid arguments");
        }
        before = true;
        index += 1;
    }

    while index < args.len() {
        let scope = args[index].as_str();
        if !is_scope_keyword(scope) {
            error!("called with invalid arguments");
        }
        if target.imported {
            let text = format!("Cannot specify {} for imported target \"{name}\".", content.description());
            ev.issue_message(MessageType::FatalError, &text);
            return Ok(());
        }
        if target.ty == TargetType::InterfaceLibrary && scope != "INTERFACE" {
            error!("may only set INTERFACE properties on INTERFACE targets");
        }
        index += 1;
        let start = index;
        while index < args.len() && !is_scope_keyword(&args[index]) {
            index += 1;
        }
        let items = &args[start..index];
        if items.is_empty() {
            continue;
        }
        if scope != "INTERFACE" {
            let entry = content_entry(ev, content, items, &target, false);
            if let Some(list) = ev.build.find_target_mut(name).and_then(|t| t.entries_mut(content.property())) {
                prepend_or_append(list, entry, before);
            }
        }
        if scope != "PRIVATE" {
            let entry = content_entry(ev, content, items, &target, true);
            if let Some(t) = ev.build.find_target_mut(name) {
                let prop = format!("INTERFACE_{}", content.property());
                prepend_or_append_property(&mut t.properties, &prop, &entry, before);
                if system {
                    prepend_or_append_property(&mut t.properties, "INTERFACE_SYSTEM_INCLUDE_DIRECTORIES", &entry, before);
                }
            }
        }
    }
    Ok(())
}

pub fn target_include_directories_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    target_content_command(ev, args, Content::IncludeDirectories)
}

pub fn target_compile_definitions_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    target_content_command(ev, args, Content::CompileDefinitions)
}

pub fn target_compile_options_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    target_content_command(ev, args, Content::CompileOptions)
}

pub fn target_sources_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    target_content_command(ev, args, Content::Sources)
}

/// Splits `<names>... PROPERTIES <key> <value>...`.
fn split_properties(args: &[String]) -> Result<(&[String], &[String])> {
    let Some(pos) = args.iter().position(|a| a == "PROPERTIES") else {
        error!("called with illegal arguments, maybe missing a PROPERTIES specifier?");
    };
    let pairs = &args[pos + 1..];
    if pairs.len() % 2 != 0 {
        error!("called with incorrect number of arguments.");
    }
    if pairs.is_empty() {
        error!("called with illegal arguments, maybe missing a PROPERTIES specifier?");
    }
    Ok((&args[..pos], pairs))
}

pub fn set_target_properties_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    let args = argument_values(args);
    if args.len() < 2 {
        error!("called with incorrect number of arguments");
    }
    let (names, pairs) = split_properties(&args)?;
    for name in names {
        if ev.build.is_alias(name) {
            error!("can not be used on an ALIAS target.");
        }
        for pair in pairs.chunks(2) {
            apply_target_property(ev, name, &pair[0], Some(&pair[1]), AppendMode::Set)?;
        }
    }
    Ok(())
}

pub fn get_target_property_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    let args = argument_values(args);
    if args.len() != 3 {
        error!("called with incorrect number of arguments");
    }
    let (var, name, prop) = (&args[0], &args[1], &args[2]);
    let allowed = ev.build.find_target(name).map(|t| t.allows_property(prop));
    let value = match allowed {
        Some(_) if prop == "ALIASED_TARGET" => ev.build.alias_target_property(name, prop),
        Some(_) if prop.is_empty() => None,
        Some(false) => {
            ev.issue_message(MessageType::FatalError, &whitelist_error(prop));
            return Ok(());
        }
        Some(true) => crate::property::target_property_value(ev, name, prop),
        None => {
            let text = format!("get_target_property() called with non-existent target \"{name}\".");
            if policy_diagnostic(ev, CMP0045, &text) {
                return Ok(());
            }
            None
        }
    };
    match value {
        Some(v) => ev.add_definition(var, &v),
        None => ev.add_definition(var, &format!("{var}-NOTFOUND")),
    }
    Ok(())
}

pub fn add_test_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    if args.first().is_some_and(|a| a == "NAME") {
        return add_named_test(ev, &args);
    }
    if args.len() < 2 {
        error!("called with incorrect number of arguments");
    }
    let dir = ev.current_source_dir();
    let command = args[1..].to_vec();
    match ev.build.find_test_mut(&dir, &args[0]) {
        Some(test) if !test.old_style => {
            error!(" given test name \"{}\" which already exists in this directory.", args[0]);
        }
        Some(test) => test.command = command,
        None => ev.build.tests.push(Test::new(&args[0], &dir, command, true)),
    }
    Ok(())
}

fn add_named_test(ev: &mut Evaluator, args: &[String]) -> Result<()> {
    #[derive(PartialEq)]
    enum Doing {
        Name,
        Command,
        Configurations,
        WorkingDirectory,
        Nothing,
    }

    let mut name = String::new();
    let mut command = Vec::new();
    let mut configurations = Vec::new();
    let mut working_directory = String::new();
    let mut doing = Doing::Name;
    for arg in &args[1..] {
        match arg.as_str() {
            "COMMAND" => {
                if !command.is_empty() {
                    error!(" may be given at most one COMMAND.");
                }
                doing = Doing::Command;
            }
            "CONFIGURATIONS" => {
                if !configurations.is_empty() {
                    error!(" may be given at most one set of CONFIGURATIONS.");
                }
                doing = Doing::Configurations;
            }
            "WORKING_DIRECTORY" => {
                if !working_directory.is_empty() {
                    error!(" may be given at most one WORKING_DIRECTORY.");
                }
                doing = Doing::WorkingDirectory;
            }
            _ => match doing {
                Doing::Name => {
                    name = arg.clone();
                    doing = Doing::Nothing;
                }
                Doing::Command => command.push(arg.clone()),
                Doing::Configurations => configurations.push(arg.clone()),
                Doing::WorkingDirectory => {
                    working_directory = arg.clone();
                    doing = Doing::Nothing;
                }
                Doing::Nothing => error!(" given unknown argument:\n  {arg}\n"),
            },
        }
    }
    if name.is_empty() {
        error!(" must be given non-empty NAME.");
    }
    if command.is_empty() {
        error!(" must be given non-empty COMMAND.");
    }
    let dir = ev.current_source_dir();
    if ev.build.has_test_in(&dir, &name) {
        error!(" given test NAME \"{name}\" which already exists in this directory.");
    }
    let mut test = Test::new(&name, &dir, command, false);
    test.configurations = configurations;
    if !working_directory.is_empty() {
        test.properties.insert("WORKING_DIRECTORY".to_string(), working_directory);
    }
    log!("add test {name}");
    ev.build.tests.push(test);
    Ok(())
}

pub fn enable_testing_command(ev: &mut Evaluator, _: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    ev.add_definition("CMAKE_TESTING_ENABLED", "1");
    Ok(())
}

/// Test commands may name executables defined after the test.
pub fn enable_testing_final_pass(ev: &mut Evaluator, _: &[String]) -> Result<()> {
    let suffix = ev.get_safe_definition("CMAKE_EXECUTABLE_SUFFIX");
    ev.build.resolve_test_commands(&suffix);
    Ok(())
}

pub fn set_tests_properties_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    let args = argument_values(args);
    if args.is_empty() {
        error!("called with incorrect number of arguments");
    }
    let (names, pairs) = split_properties(&args)?;
    let dir = ev.current_source_dir();
    for name in names {
        let Some(test) = ev.build.find_test_mut(&dir, name) else {
            error!("Can not find test to add properties to: {name}");
        };
        for pair in pairs.chunks(2) {
            update_property(&mut test.properties, &pair[0], Some(&pair[1]), AppendMode::Set);
        }
    }
    Ok(())
}

pub fn get_test_property_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    let args = argument_values(args);
    if args.len() < 3 {
        error!("called with incorrect number of arguments");
    }
    let (name, prop, var) = (&args[0], &args[1], &args[2]);
    let dir = ev.current_source_dir();
    let value = ev
        .build
        .find_test(&dir, name)
        .filter(|_| !prop.is_empty())
        .and_then(|t| t.properties.get(prop).cloned());
    ev.add_definition(var, value.as_deref().unwrap_or("NOTFOUND"));
    Ok(())
}

pub fn include_directories_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    let args = argument_values(args);
    let mut before = ev.is_on("CMAKE_INCLUDE_DIRECTORIES_BEFORE");
    let base = ev.current_source_dir();
    let mut includes = Vec::new();
    for arg in &args {
        match arg.as_str() {
            "SYSTEM" => continue,
            "AFTER" => before = false,
            "BEFORE" => before = true,
            _ => {
                for dir in expand_list_argument(arg, false) {
                    if dir.starts_with("$<") || is_full_path(&dir) {
                        includes.push(dir.replace('\\', "/"));
                    } else {
                        includes.push(format!("{base}/{}", dir.replace('\\', "/")));
                    }
                }
            }
        }
    }
    if includes.is_empty() {
        return Ok(());
    }
    if before {
        includes.reverse();
    }
    let entry = includes.join(";");
    if let Some(dir) = ev.dirs.last_mut() {
        prepend_or_append_property(&mut dir.properties, "INCLUDE_DIRECTORIES", &entry, before);
    }
    for target in ev.build.targets.iter_mut().filter(|t| t.source_dir == base && !t.imported) {
        if target.ty != TargetType::InterfaceLibrary {
            prepend_or_append(&mut target.include_directories, entry.clone(), before);
        }
    }
    Ok(())
}

pub fn add_compile_options_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    let args = argument_values(args);
    if let Some(dir) = ev.dirs.last_mut() {
        for option in &args {
            update_property(&mut dir.properties, "COMPILE_OPTIONS", Some(option), AppendMode::Append);
        }
    }
    Ok(())
}

static DEFINE_FLAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^[-/]D[A-Za-z_][A-Za-z0-9_]*(=.*)?$").unwrap());

pub fn add_definitions_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    let args = argument_values(args);
    let Some(dir) = ev.dirs.last_mut() else {
        return Ok(());
    };
    for flag in &args {
        let spaced = format!(" {flag}");
        update_property(&mut dir.properties, "DEFINITIONS", Some(&spaced), AppendMode::AppendString);
        if DEFINE_FLAG.is_match(flag) {
            update_property(&mut dir.properties, "COMPILE_DEFINITIONS", Some(&flag[2..]), AppendMode::Append);
        }
    }
    Ok(())
}

pub fn add_dependencies_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    let args = argument_values(args);
    if args.len() < 2 {
        error!("called with incorrect number of arguments");
    }
    let name = &args[0];
    if ev.build.is_alias(name) {
        let text = format!("Cannot add target-level dependencies to alias target \"{name}\".\n");
        ev.issue_message(MessageType::FatalError, &text);
        return Ok(());
    }
    match ev.build.find_target_mut(name) {
        Some(target) => {
            for dep in &args[1..] {
                target.add_dependency(dep);
            }
        }
        None => {
            let text = format!(
                "Cannot add target-level dependencies to non-existent target \"{name}\".\nThe add_dependencies works \
                 for top-level logical targets created by the add_executable, add_library, or add_custom_target \
                 commands.  If you want to add file-level dependencies see the DEPENDS option of the \
                 add_custom_target and add_custom_command commands."
            );
            ev.issue_message(MessageType::FatalError, &text);
        }
    }
    Ok(())
}

static PROJECT_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+(\.[0-9]+(\.[0-9]+(\.[0-9]+)?)?)?)?$").unwrap());

const VERSION_COMPONENTS: [&str; 4] = ["MAJOR", "MINOR", "PATCH", "TWEAK"];

pub fn project_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    let Some(name) = args.first() else {
        error!("PROJECT called with incorrect number of arguments");
    };
    let source_dir = ev.current_source_dir();
    let binary_dir = ev.current_binary_dir();
    const COMPUTED: &str = "Value Computed by CMake";
    ev.add_cache_definition(&format!("{name}_BINARY_DIR"), &binary_dir, COMPUTED, CacheEntryType::Static, false);
    ev.add_cache_definition(&format!("{name}_SOURCE_DIR"), &source_dir, COMPUTED, CacheEntryType::Static, false);
    ev.add_definition("PROJECT_BINARY_DIR", &binary_dir);
    ev.add_definition("PROJECT_SOURCE_DIR", &source_dir);
    ev.add_definition("PROJECT_NAME", name);
    let top_level = ev.dirs.len() <= 1;
    if top_level || !ev.is_definition_set("CMAKE_PROJECT_NAME") {
        ev.add_definition("CMAKE_PROJECT_NAME", name);
        ev.add_cache_definition("CMAKE_PROJECT_NAME", name, COMPUTED, CacheEntryType::Static, false);
    }

    let mut version = "";
    let mut description = "";
    let (mut have_version, mut have_description, mut have_languages) = (false, false, false);
    let mut languages = Vec::new();
    #[derive(Clone, Copy, PartialEq)]
    enum Doing {
        Languages,
        Version,
        Description,
    }
    let mut doing = Doing::Languages;
    for arg in &args[1..] {
        let repeated = match arg.as_str() {
            "LANGUAGES" => std::mem::replace(&mut have_languages, true),
            "VERSION" => std::mem::replace(&mut have_version, true),
            "DESCRIPTION" => std::mem::replace(&mut have_description, true),
            _ => false,
        };
        if repeated {
            let text = format!("{arg} may be specified at most once.");
            ev.issue_message(MessageType::FatalError, &text);
            return Ok(());
        }
        match (arg.as_str(), doing) {
            ("LANGUAGES", _) => doing = Doing::Languages,
            ("VERSION", _) => doing = Doing::Version,
            ("DESCRIPTION", _) => doing = Doing::Description,
            (_, Doing::Version) => {
                version = arg.as_str();
                doing = Doing::Languages;
            }
            (_, Doing::Description) => {
                description = arg.as_str();
                doing = Doing::Languages;
            }
            (_, Doing::Languages) => languages.push(arg.clone()),
        }
    }
    if have_version && !have_languages && !languages.is_empty() {
        ev.issue_message(MessageType::FatalError, "project with VERSION must use LANGUAGES before language names.");
        return Ok(());
    }
    if have_languages && languages.is_empty() {
        languages.push("NONE".to_string());
    }

    let cmp0048 = ev.policy_status(CMP0048);
    let mut version_vars = vec!["PROJECT_VERSION".to_string(), format!("{name}_VERSION")];
    for component in VERSION_COMPONENTS {
        version_vars.push(format!("PROJECT_VERSION_{component}"));
        version_vars.push(format!("{name}_VERSION_{component}"));
    }
    if have_version {
        if cmp0048.is_old_behavior() {
            ev.issue_message(MessageType::FatalError, "VERSION not allowed unless CMP0048 is set to NEW");
            return Ok(());
        }
        if !PROJECT_VERSION.is_match(version) {
            ev.issue_message(MessageType::FatalError, &format!("VERSION \"{version}\" format invalid."));
            return Ok(());
        }
        let parts: Vec<String> = version
            .split('.')
            .filter(|p| !p.is_empty())
            .map(|p| p.parse::<u64>().map_or_else(|_| p.to_string(), |n| n.to_string()))
            .collect();
        let full = parts.join(".");
        ev.add_definition("PROJECT_VERSION", &full);
        ev.add_definition(&format!("{name}_VERSION"), &full);
        for (i, component) in VERSION_COMPONENTS.iter().enumerate() {
            let value = parts.get(i).map_or("", String::as_str);
            ev.add_definition(&format!("PROJECT_VERSION_{component}"), value);
            ev.add_definition(&format!("{name}_VERSION_{component}"), value);
        }
    } else if cmp0048 != PolicyStatus::Old {
        let set: Vec<&String> =
            version_vars.iter().filter(|v| ev.get_definition(v).is_some_and(|d| !d.is_empty())).collect();
        if cmp0048 == PolicyStatus::Warn {
            if !set.is_empty() {
                let list: String = set.iter().map(|v| format!("\n  {v}")).collect();
                let text =
                    format!("{}\nThe following variable(s) would be set to empty:{list}", policy_warning(CMP0048));
                ev.issue_message(MessageType::AuthorWarning, &text);
            }
        } else {
            for var in set.into_iter().cloned().collect::<Vec<_>>() {
                ev.add_definition(&var, "");
            }
        }
    }

    if have_description {
        ev.add_definition("PROJECT_DESCRIPTION", description);
        ev.add_definition(&format!("{name}_DESCRIPTION"), description);
        if top_level || !ev.is_definition_set("CMAKE_PROJECT_DESCRIPTION") {
            ev.add_definition("CMAKE_PROJECT_DESCRIPTION", description);
        }
    }

    if languages.is_empty() {
        languages = vec!["C".to_string(), "CXX".to_string()];
    }
    for lang in languages.iter().filter(|l| *l != "NONE") {
        let enabled = ev.global_properties.get("ENABLED_LANGUAGES");
        if !enabled.is_some_and(|e| e.split(';').any(|l| l == lang)) {
            update_property(&mut ev.global_properties, "ENABLED_LANGUAGES", Some(lang), AppendMode::Append);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::testutil::{output, run_project};

    const PRELUDE: &str = "cmake_minimum_required(VERSION 3.13)\n";

    fn project(text: &str) -> Evaluator {
        run_project(&format!("{PRELUDE}{text}"))
    }

    fn fatal_errors(ev: &Evaluator) -> Vec<&str> {
        ev.messenger.texts(MessageType::FatalError)
    }

    #[test]
    fn test_targets_and_properties() {
        let ev = project(
            "add_executable(app main.c util.c)\nadd_library(lib STATIC a.c)\n\
             get_target_property(t app TYPE)\nget_target_property(s app SOURCES)\n\
             get_target_property(l lib TYPE)\nget_target_property(m lib MISSING)\n\
             message(\"${t} ${s} ${l} ${m}\")\n\
             get_property(all DIRECTORY PROPERTY BUILDSYSTEM_TARGETS)\nmessage(\"${all}\")\n",
        );
        assert!(fatal_errors(&ev).is_empty());
        assert_eq!(output(&ev), vec!["EXECUTABLE main.c;util.c STATIC_LIBRARY m-NOTFOUND", "app;lib"]);
    }

    #[test]
    fn test_build_shared_libs_default() {
        let ev = project("set(BUILD_SHARED_LIBS ON)\nadd_library(lib a.c)\nget_target_property(t lib TYPE)\nmessage(${t})\n");
        assert_eq!(output(&ev), vec!["SHARED_LIBRARY"]);
    }

    #[test]
    fn test_duplicate_target() {
        let ev = project("add_executable(app main.c)\nadd_library(app a.c)\n");
        let base = ev.current_source_dir();
        assert_eq!(
            fatal_errors(&ev),
            vec![format!(
                "add_library cannot create target \"app\" because another target with the same name already \
                 exists.  The existing target is an executable created in source directory \"{base}\".  See \
                 documentation for policy CMP0002 for more details."
            )]
        );
    }

    #[test]
    fn test_alias_targets() {
        let ev = project(
            "add_library(foo STATIC a.c)\nadd_library(ns::foo ALIAS foo)\n\
             get_target_property(a ns::foo ALIASED_TARGET)\nget_target_property(b foo ALIASED_TARGET)\n\
             get_target_property(t ns::foo TYPE)\nmessage(\"${a} ${b} ${t}\")\n\
             if(TARGET ns::foo)\nmessage(found)\nendif()\n",
        );
        assert_eq!(output(&ev), vec!["foo b-NOTFOUND STATIC_LIBRARY", "found"]);

        let ev = project("add_library(ns::bar ALIAS bar)\n");
        assert_eq!(
            fatal_errors(&ev),
            vec!["add_library cannot create ALIAS target \"ns::bar\" because target \"bar\" does not exist."]
        );

        let ev = project("add_executable(app main.c)\nadd_library(l ALIAS app)\n");
        assert_eq!(
            fatal_errors(&ev),
            vec!["add_library cannot create ALIAS target \"l\" because target \"app\" is not a library."]
        );
    }

    #[test]
    fn test_interface_library_rules() {
        let ev = project("add_library(iface INTERFACE a.c)\n");
        assert_eq!(fatal_errors(&ev), vec!["add_library INTERFACE library requires no source arguments."]);

        let ev = project("add_library(iface INTERFACE)\nset_target_properties(iface PROPERTIES FOO bar)\n");
        assert_eq!(
            fatal_errors(&ev),
            vec![
                "INTERFACE_LIBRARY targets may only have whitelisted properties.  The property \"FOO\" is not \
                 allowed."
            ]
        );

        let ev = project(
            "add_library(iface INTERFACE)\nset_target_properties(iface PROPERTIES INTERFACE_X 1 custom 2)\n\
             target_link_libraries(iface INTERFACE m)\nget_target_property(l iface INTERFACE_LINK_LIBRARIES)\n\
             message(${l})\n",
        );
        assert!(fatal_errors(&ev).is_empty());
        assert_eq!(output(&ev), vec!["m"]);
    }

    #[test]
    fn test_reserved_target_name() {
        let ev = project("add_custom_target(test)\n");
        assert_eq!(
            fatal_errors(&ev),
            vec![
                "The target name \"test\" is reserved or not valid for certain CMake features, such as generator \
                 expressions, and may result in undefined behavior."
            ]
        );
    }

    #[test]
    fn test_link_libraries() {
        let ev = project(
            "add_library(lib STATIC a.c)\nadd_executable(app main.c)\n\
             target_link_libraries(lib PRIVATE z PUBLIC m)\n\
             target_link_libraries(app PRIVATE lib debug d optimized o)\n\
             get_target_property(ll lib LINK_LIBRARIES)\nget_target_property(il lib INTERFACE_LINK_LIBRARIES)\n\
             get_target_property(al app LINK_LIBRARIES)\nget_target_property(ai app INTERFACE_LINK_LIBRARIES)\n\
             message(\"${ll}|${il}|${al}|${ai}\")\n",
        );
        assert!(fatal_errors(&ev).is_empty());
        assert_eq!(
            output(&ev),
            vec!["z;m|$<LINK_ONLY:z>;m|lib;$<$<CONFIG:DEBUG>:d>;$<$<NOT:$<CONFIG:DEBUG>>:o>|ai-NOTFOUND"]
        );
    }

    #[test]
    fn test_link_libraries_errors() {
        let ev = project("add_executable(app main.c)\ntarget_link_libraries(app m)\ntarget_link_libraries(app PRIVATE z)\n");
        assert_eq!(
            fatal_errors(&ev),
            vec![
                "The plain signature for target_link_libraries has already been used with the target \"app\".  \
                 All uses of target_link_libraries with a target must be either all-keyword or all-plain.\n"
            ]
        );

        let ev = project("target_link_libraries(nope m)\n");
        assert_eq!(
            fatal_errors(&ev),
            vec!["Cannot specify link libraries for target \"nope\" which is not built by this project."]
        );

        let ev = project("add_executable(app main.c)\ntarget_link_libraries(app m PRIVATE z)\n");
        assert_eq!(
            fatal_errors(&ev),
            vec![
                "The INTERFACE, PUBLIC or PRIVATE option must appear as the second argument, just after the \
                 target name."
            ]
        );

        let ev = project("add_executable(app main.c)\ntarget_link_libraries(app m debug)\n");
        assert_eq!(fatal_errors(&ev), vec!["The \"debug\" argument must be followed by a library."]);
    }

    #[test]
    fn test_target_usage_requirements() {
        let ev = project(
            "add_library(lib STATIC a.c)\n\
             target_include_directories(lib PUBLIC inc PRIVATE /abs)\n\
             target_compile_definitions(lib PRIVATE -DFOO BAR=1 INTERFACE USE_LIB)\n\
             target_compile_options(lib PRIVATE -Wall)\ntarget_compile_options(lib BEFORE PRIVATE -O2)\n\
             target_sources(lib PRIVATE b.c)\n\
             get_target_property(i lib INCLUDE_DIRECTORIES)\nget_target_property(ii lib INTERFACE_INCLUDE_DIRECTORIES)\n\
             get_target_property(d lib COMPILE_DEFINITIONS)\nget_target_property(id lib INTERFACE_COMPILE_DEFINITIONS)\n\
             get_target_property(o lib COMPILE_OPTIONS)\nget_target_property(s lib SOURCES)\n\
             message(\"${i}|${ii}|${d}|${id}|${o}|${s}\")\n",
        );
        assert!(fatal_errors(&ev).is_empty());
        let base = ev.current_source_dir();
        assert_eq!(
            output(&ev),
            vec![format!("{base}/inc;/abs|{base}/inc|FOO;BAR=1|USE_LIB|-O2;-Wall|a.c;b.c")]
        );
    }

    #[test]
    fn test_target_usage_requirement_errors() {
        let ev = project("target_include_directories(nope PRIVATE inc)\n");
        assert_eq!(
            fatal_errors(&ev),
            vec!["Cannot specify include directories for target \"nope\" which is not built by this project."]
        );

        let ev = project("add_library(lib STATIC a.c)\ntarget_compile_options(lib -Wall)\n");
        assert_eq!(fatal_errors(&ev), vec!["target_compile_options called with invalid arguments"]);

        let ev = project("add_library(iface INTERFACE)\ntarget_compile_definitions(iface PUBLIC X)\n");
        assert_eq!(
            fatal_errors(&ev),
            vec!["target_compile_definitions may only set INTERFACE properties on INTERFACE targets"]
        );
    }

    #[test]
    fn test_get_target_property_missing_target() {
        let ev = project("get_target_property(v nope TYPE)\n");
        assert_eq!(
            fatal_errors(&ev),
            vec!["get_target_property() called with non-existent target \"nope\"."]
        );

        let ev = project("cmake_policy(SET CMP0045 OLD)\nget_target_property(v nope TYPE)\nmessage(${v})\n");
        assert_eq!(output(&ev), vec!["v-NOTFOUND"]);
    }

    #[test]
    fn test_read_only_properties() {
        let ev = project("add_executable(app main.c)\nset_target_properties(app PROPERTIES NAME other)\n");
        assert_eq!(fatal_errors(&ev), vec!["NAME property is read-only\n"]);

        let ev = project("set_target_properties(nope PROPERTIES A b)\n");
        assert_eq!(fatal_errors(&ev), vec!["set_target_properties Can not find target to add properties to: nope"]);
    }

    #[test]
    fn test_tests_and_resolution() {
        let ev = project(
            "enable_testing()\nadd_test(NAME t1 COMMAND app --flag WORKING_DIRECTORY /tmp)\n\
             add_test(t2 app)\nadd_executable(app main.c)\n\
             set_tests_properties(t1 PROPERTIES TIMEOUT 5)\nget_test_property(t1 TIMEOUT to)\n\
             get_test_property(t1 WORKING_DIRECTORY wd)\nget_test_property(t2 TIMEOUT none)\n\
             message(\"${to} ${wd} ${none} ${CMAKE_TESTING_ENABLED}\")\n\
             if(TEST t1)\nmessage(has)\nendif()\n",
        );
        assert!(fatal_errors(&ev).is_empty());
        assert_eq!(output(&ev), vec!["5 /tmp NOTFOUND 1", "has"]);
        let base = ev.current_source_dir();
        let binary = ev.current_binary_dir();
        assert_eq!(ev.build.directory_tests(&base), vec!["t1", "t2"]);
        let resolved: Vec<_> = ev.build.tests().map(|t| t.resolved_command.clone().unwrap_or_default()).collect();
        assert_eq!(resolved, vec![vec![format!("{binary}/app"), "--flag".to_string()], vec!["app".to_string()]]);
    }

    #[test]
    fn test_test_errors() {
        let ev = project("add_test(NAME t COMMAND a)\nadd_test(NAME t COMMAND b)\n");
        assert_eq!(
            fatal_errors(&ev),
            vec!["add_test  given test NAME \"t\" which already exists in this directory."]
        );

        let ev = project("add_test(NAME t)\n");
        assert_eq!(fatal_errors(&ev), vec!["add_test  must be given non-empty COMMAND."]);

        let ev = project("set_tests_properties(t PROPERTIES A b)\n");
        assert_eq!(fatal_errors(&ev), vec!["set_tests_properties Can not find test to add properties to: t"]);
    }

    #[test]
    fn test_project_command() {
        let ev = project(
            "project(Demo VERSION 1.02.3 DESCRIPTION \"A demo\" LANGUAGES C)\n\
             message(\"${PROJECT_NAME} ${CMAKE_PROJECT_NAME} ${PROJECT_VERSION} ${Demo_VERSION_MINOR}\")\n\
             message(\"[${PROJECT_VERSION_TWEAK}] ${PROJECT_DESCRIPTION}\")\n\
             get_property(langs GLOBAL PROPERTY ENABLED_LANGUAGES)\nmessage(${langs})\n",
        );
        assert!(fatal_errors(&ev).is_empty());
        assert_eq!(output(&ev), vec!["Demo Demo 1.2.3 2", "[] A demo", "C"]);
        assert_eq!(ev.cache.value("Demo_SOURCE_DIR"), Some(ev.current_source_dir().as_str()));
    }

    #[test]
    fn test_project_errors() {
        let ev = project("project(Demo VERSION 1.x)\n");
        assert_eq!(fatal_errors(&ev), vec!["VERSION \"1.x\" format invalid."]);

        let ev = run_project("project(Demo VERSION 1.0)\n");
        assert_eq!(fatal_errors(&ev), vec!["VERSION not allowed unless CMP0048 is set to NEW"]);

        let ev = project("project(Demo VERSION 1.0 CXX)\n");
        assert_eq!(fatal_errors(&ev), vec!["project with VERSION must use LANGUAGES before language names."]);
    }

    #[test]
    fn test_directory_build_settings() {
        let ev = project(
            "add_executable(early main.c)\ninclude_directories(a)\ninclude_directories(BEFORE b)\n\
             add_compile_options(-g)\nadd_definitions(-DONE -Wextra)\nadd_executable(late main.c)\n\
             get_target_property(e early INCLUDE_DIRECTORIES)\nget_target_property(l late INCLUDE_DIRECTORIES)\n\
             get_target_property(o late COMPILE_OPTIONS)\nget_directory_property(d COMPILE_DEFINITIONS)\n\
             get_directory_property(f DEFINITIONS)\nmessage(\"${e}|${l}|${o}|${d}|${f}\")\n",
        );
        assert!(fatal_errors(&ev).is_empty());
        let base = ev.current_source_dir();
        assert_eq!(
            output(&ev),
            vec![format!("{base}/b;{base}/a|{base}/b;{base}/a|-g|ONE| -DONE -Wextra")]
        );
    }

    #[test]
    fn test_dependencies_and_custom_targets() {
        let ev = project(
            "add_custom_target(gen COMMAND echo hi COMMAND echo bye DEPENDS in.txt)\n\
             add_custom_target(always ALL)\nadd_executable(app main.c)\nadd_dependencies(app gen always gen)\n\
             get_target_property(d app MANUALLY_ADDED_DEPENDENCIES)\nget_target_property(x gen EXCLUDE_FROM_ALL)\n\
             get_target_property(y always EXCLUDE_FROM_ALL)\nget_target_property(t gen TYPE)\n\
             message(\"${d} ${x} ${y} ${t}\")\n",
        );
        assert!(fatal_errors(&ev).is_empty());
        assert_eq!(output(&ev), vec!["always;gen TRUE y-NOTFOUND UTILITY"]);
        let custom = ev.build.find_target("gen").and_then(|t| t.custom.clone()).unwrap_or_default();
        assert_eq!(custom.lines, vec![vec!["echo", "hi"], vec!["echo", "bye"]]);
        assert_eq!(custom.depends, vec!["in.txt"]);

        let ev = project("add_dependencies(nope gen)\n");
        assert!(fatal_errors(&ev)[0].starts_with("Cannot add target-level dependencies to non-existent target \"nope\"."));
    }
}
