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

//! Properties on the global, directory, target, source, test and cache
//! scopes, and the commands that read and write them.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::cache::CacheEntryType;
use crate::error;
use crate::eval::{DirState, Evaluator, ExecutionStatus};
use crate::stmt::{ExpandedArgument, argument_values};
use crate::strutil::{collapse_full_path, is_off, is_on};

pub type PropertyMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyScope {
    Global,
    Directory,
    Target,
    Source,
    Test,
    Variable,
    Cache,
}

impl PropertyScope {
    pub fn parse(s: &str) -> Option<PropertyScope> {
        Some(match s {
            "GLOBAL" => PropertyScope::Global,
            "DIRECTORY" => PropertyScope::Directory,
            "TARGET" => PropertyScope::Target,
            "SOURCE" => PropertyScope::Source,
            "TEST" => PropertyScope::Test,
            "VARIABLE" => PropertyScope::Variable,
            "CACHE" => PropertyScope::Cache,
            _ => return None,
        })
    }
}

/// Documentation registered with `define_property()`.
#[derive(Debug, Clone, Default)]
pub struct PropertyDefinition {
    pub brief: String,
    pub full: String,
    /// Unset values are looked up in the enclosing scope.
    pub inherited: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendMode {
    Set,
    Append,
    AppendString,
}

/// Applies one `set_property()` style update. A `None` value with
/// [`AppendMode::Set`] removes the property.
pub fn update_property(map: &mut PropertyMap, name: &str, value: Option<&str>, mode: AppendMode) {
    match (mode, value) {
        (AppendMode::Set, Some(v)) => {
            map.insert(name.to_string(), v.to_string());
        }
        (AppendMode::Set, None) => {
            map.remove(name);
        }
        (_, None) => {}
        (_, Some("")) => {}
        (mode, Some(v)) => {
            let entry = map.entry(name.to_string()).or_default();
            if !entry.is_empty() && mode == AppendMode::Append {
                entry.push(';');
            }
            entry.push_str(v);
        }
    }
}

pub(crate) fn find_directory<'a>(ev: &'a Evaluator, dir: Option<&str>) -> Option<&'a DirState> {
    let Some(dir) = dir else {
        return ev.dirs.last();
    };
    let full = collapse_full_path(dir, &ev.current_source_dir());
    ev.dirs
        .iter()
        .rev()
        .chain(ev.build.finished_directories())
        .find(|d| d.source_dir == full || d.binary_dir == full)
}

fn find_directory_mut<'a>(ev: &'a mut Evaluator, dir: Option<&str>) -> Option<&'a mut DirState> {
    let Some(dir) = dir else {
        return ev.dirs.last_mut();
    };
    let full = collapse_full_path(dir, &ev.current_source_dir());
    let found = |d: &&mut DirState| d.source_dir == full || d.binary_dir == full;
    if let Some(d) = ev.dirs.iter_mut().rev().find(found) {
        return Some(d);
    }
    ev.build.finished_directories_mut().find(found)
}

const DIRECTORY_NOT_FOUND: &str = "DIRECTORY scope provided but requested directory was not found. This \
                                   could be because the directory argument was invalid or, it is valid \
                                   but has not been processed yet.";

/// A directory property, including the ones computed from interpreter
/// state.
pub fn directory_property(ev: &Evaluator, dir: &DirState, name: &str) -> Option<String> {
    let is_current = ev.dirs.last().is_some_and(|d| d.source_dir == dir.source_dir);
    match name {
        "SOURCE_DIR" => return Some(dir.source_dir.clone()),
        "BINARY_DIR" => return Some(dir.binary_dir.clone()),
        "PARENT_DIRECTORY" => return Some(dir.parent_dir.clone()),
        "VARIABLES" if is_current => {
            let mut names = ev.vars.names();
            names.extend(ev.cache.keys().cloned());
            names.sort();
            names.dedup();
            return Some(names.join(";"));
        }
        "CACHE_VARIABLES" => return Some(ev.cache.keys().cloned().collect::<Vec<_>>().join(";")),
        "MACROS" => return Some(ev.commands.macro_names().join(";")),
        "BUILDSYSTEM_TARGETS" => return Some(ev.build.directory_targets(&dir.source_dir).join(";")),
        "TESTS" => return Some(ev.build.directory_tests(&dir.source_dir).join(";")),
        "LISTFILE_STACK" if is_current => return Some(ev.backtrace().file_stack().join(";")),
        _ => {}
    }
    if let Some(v) = dir.properties.get(name) {
        return Some(v.clone());
    }
    if ev.build.is_inherited(PropertyScope::Directory, name) {
        return match find_directory(ev, Some(&dir.parent_dir)).filter(|_| !dir.parent_dir.is_empty()) {
            Some(parent) => directory_property(ev, parent, name),
            None => ev.global_properties.get(name).cloned(),
        };
    }
    None
}

pub fn define_property_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    if args.is_empty() {
        error!("called with incorrect number of arguments");
    }
    let scope = match args[0].as_str() {
        "CACHED_VARIABLE" => PropertyScope::Cache,
        other => match PropertyScope::parse(other) {
            Some(scope) => scope,
            None => error!(
                "given invalid scope {other}.  Valid scopes are GLOBAL, DIRECTORY, TARGET, SOURCE, \
                 TEST, VARIABLE, CACHED_VARIABLE."
            ),
        },
    };

    #[derive(PartialEq)]
    enum Doing {
        None,
        Property,
        Brief,
        Full,
    }
    let mut doing = Doing::None;
    let mut name = String::new();
    let mut def = PropertyDefinition::default();
    let mut brief_given = false;
    let mut full_given = false;
    for arg in &args[1..] {
        match arg.as_str() {
            "PROPERTY" => doing = Doing::Property,
            "BRIEF_DOCS" => {
                doing = Doing::Brief;
                brief_given = true;
            }
            "FULL_DOCS" => {
                doing = Doing::Full;
                full_given = true;
            }
            "INHERITED" => {
                doing = Doing::None;
                def.inherited = true;
            }
            _ => match doing {
                Doing::Property => {
                    name = arg.clone();
                    doing = Doing::None;
                }
                Doing::Brief => def.brief.push_str(arg),
                Doing::Full => def.full.push_str(arg),
                Doing::None => error!("given invalid argument \"{arg}\"."),
            },
        }
    }
    if name.is_empty() {
        error!("not given a PROPERTY <name> argument.");
    }
    if !brief_given {
        error!("not given a BRIEF_DOCS <brief-doc> argument.");
    }
    if !full_given {
        error!("not given a FULL_DOCS <full-doc> argument.");
    }
    ev.build.define_property(scope, &name, def);
    Ok(())
}

#[derive(Debug)]
struct SetPropertyRequest {
    scope: PropertyScope,
    names: Vec<String>,
    property: String,
    value: Option<String>,
    mode: AppendMode,
}

fn parse_set_property(args: &[String]) -> Result<SetPropertyRequest> {
    if args.is_empty() {
        error!("called with incorrect number of arguments");
    }
    let scope = match PropertyScope::parse(&args[0]) {
        Some(scope) if scope != PropertyScope::Variable => scope,
        _ => error!(
            "given invalid scope {}.  Valid scopes are GLOBAL, DIRECTORY, TARGET, SOURCE, TEST, CACHE.",
            args[0]
        ),
    };

    #[derive(PartialEq)]
    enum Doing {
        None,
        Names,
        Property,
        Values,
    }
    let mut doing = if scope == PropertyScope::Global { Doing::None } else { Doing::Names };
    let mut separator = "";
    let mut req = SetPropertyRequest {
        scope,
        names: Vec::new(),
        property: String::new(),
        value: None,
        mode: AppendMode::Set,
    };
    for arg in &args[1..] {
        match arg.as_str() {
            "PROPERTY" => doing = Doing::Property,
            "APPEND" | "APPEND_STRING" => {
                doing = Doing::None;
                req.mode = if arg == "APPEND" { AppendMode::Append } else { AppendMode::AppendString };
                req.value.get_or_insert_with(String::new);
            }
            _ => match doing {
                Doing::Names => {
                    if !req.names.contains(arg) {
                        req.names.push(arg.clone());
                    }
                }
                Doing::Property => {
                    req.property = arg.clone();
                    doing = Doing::Values;
                }
                Doing::Values => {
                    let value = req.value.get_or_insert_with(String::new);
                    value.push_str(separator);
                    value.push_str(arg);
                    separator = ";";
                }
                Doing::None => error!("given invalid argument \"{arg}\"."),
            },
        }
    }
    if req.property.is_empty() {
        error!("not given a PROPERTY <name> argument.");
    }
    Ok(req)
}

fn set_cache_property(ev: &mut Evaluator, req: &SetPropertyRequest) -> Result<()> {
    let value = req.value.as_deref();
    match req.property.as_str() {
        "ADVANCED" => {
            if let Some(v) = value {
                if !is_on(v) && !is_off(v) {
                    error!("given non-boolean value \"{v}\" for CACHE property \"ADVANCED\".  ");
                }
            }
        }
        "TYPE" => {
            let v = value.unwrap_or_default();
            if CacheEntryType::parse(v).is_none() {
                error!("given invalid CACHE entry TYPE \"{v}\"");
            }
        }
        "HELPSTRING" | "STRINGS" | "VALUE" => {}
        other => error!(
            "given invalid CACHE property {other}.  Settable CACHE properties are: ADVANCED, \
             HELPSTRING, STRINGS, TYPE, and VALUE."
        ),
    }
    for name in &req.names {
        let Some(entry) = ev.cache.get_mut(name) else {
            error!("could not find CACHE variable {name}.  Perhaps it has not yet been created.");
        };
        let mut map = PropertyMap::new();
        if let Some(current) = entry.get_property(&req.property) {
            map.insert(req.property.clone(), current);
        }
        update_property(&mut map, &req.property, value, req.mode);
        match map.remove(&req.property) {
            Some(v) => entry.set_property(&req.property, &v),
            None => {
                entry.properties.remove(&req.property);
            }
        }
    }
    Ok(())
}

pub fn set_property_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    let req = parse_set_property(&args)?;
    let value = req.value.as_deref();
    match req.scope {
        PropertyScope::Global => {
            if !req.names.is_empty() {
                error!("given names for GLOBAL scope.");
            }
            update_property(&mut ev.global_properties, &req.property, value, req.mode);
        }
        PropertyScope::Directory => {
            if req.names.len() > 1 {
                error!("allows at most one name for DIRECTORY scope.");
            }
            let Some(dir) = find_directory_mut(ev, req.names.first().map(String::as_str)) else {
                error!("{DIRECTORY_NOT_FOUND}");
            };
            update_property(&mut dir.properties, &req.property, value, req.mode);
        }
        PropertyScope::Target => {
            for name in &req.names {
                if ev.build.is_alias(name) {
                    error!("can not be used on an ALIAS target.");
                }
                if ev.build.find_target(name).is_none() {
                    error!("could not find TARGET {name}.  Perhaps it has not yet been created.");
                }
                crate::target::apply_target_property(ev, name, &req.property, value, req.mode)?;
            }
        }
        PropertyScope::Source => {
            let base = ev.current_source_dir();
            for name in &req.names {
                let map = ev.build.source_mut(&collapse_full_path(name, &base));
                update_property(map, &req.property, value, req.mode);
            }
        }
        PropertyScope::Test => {
            let dir = ev.current_source_dir();
            let missing: Vec<&String> = req.names.iter().filter(|n| !ev.build.has_test_in(&dir, n)).collect();
            for name in &req.names {
                if let Some(test) = ev.build.find_test_mut(&dir, name) {
                    update_property(&mut test.properties, &req.property, value, req.mode);
                }
            }
            if !missing.is_empty() {
                let list: String = missing.iter().map(|n| format!("  {n}\n")).collect();
                error!("given TEST names that do not exist:\n{list}");
            }
        }
        PropertyScope::Cache => set_cache_property(ev, &req)?,
        PropertyScope::Variable => {}
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GetMode {
    Value,
    Set,
    Defined,
    BriefDocs,
    FullDocs,
}

pub(crate) fn target_property_value(ev: &Evaluator, name: &str, prop: &str) -> Option<String> {
    let target = ev.build.find_target(name)?;
    if let Some(v) = ev.build.alias_target_property(name, prop).or_else(|| target.get_property(prop)) {
        return Some(v);
    }
    if ev.build.is_inherited(PropertyScope::Target, prop) {
        let dir = find_directory(ev, Some(&target.source_dir))?;
        return directory_property(ev, dir, prop);
    }
    None
}

fn inherit_from_current_directory(ev: &Evaluator, scope: PropertyScope, prop: &str) -> Option<String> {
    if !ev.build.is_inherited(scope, prop) {
        return None;
    }
    let dir = ev.dirs.last()?;
    directory_property(ev, dir, prop)
}

pub fn get_property_command(ev: &mut Evaluator, args: &[ExpandedArgument], _: &mut ExecutionStatus) -> Result<()> {
    let args = argument_values(args);
    if args.len() < 3 {
        error!("called with incorrect number of arguments");
    }
    let var = &args[0];
    let Some(scope) = PropertyScope::parse(&args[1]) else {
        error!(
            "given invalid scope {}.  Valid scopes are GLOBAL, DIRECTORY, TARGET, SOURCE, TEST, \
             VARIABLE, CACHE.",
            args[1]
        );
    };

    let mut expect_name = !matches!(scope, PropertyScope::Global | PropertyScope::Variable);
    let mut expect_property = false;
    let mut name: Option<String> = None;
    let mut property = String::new();
    let mut mode = GetMode::Value;
    for arg in &args[2..] {
        match arg.as_str() {
            "PROPERTY" => {
                expect_name = false;
                expect_property = true;
            }
            "SET" => mode = GetMode::Set,
            "DEFINED" => mode = GetMode::Defined,
            "BRIEF_DOCS" => mode = GetMode::BriefDocs,
            "FULL_DOCS" => mode = GetMode::FullDocs,
            _ if expect_name => {
                name = Some(arg.clone());
                expect_name = false;
            }
            _ if expect_property => {
                property = arg.clone();
                expect_property = false;
            }
            _ => error!("given invalid argument \"{arg}\"."),
        }
    }
    if property.is_empty() {
        error!("not given a PROPERTY <name> argument.");
    }

    match mode {
        GetMode::Defined => {
            let defined = ev.build.property_definition(scope, &property).is_some();
            ev.add_definition(var, if defined { "1" } else { "0" });
            return Ok(());
        }
        GetMode::BriefDocs | GetMode::FullDocs => {
            let doc = ev.build.property_definition(scope, &property).map_or("NOTFOUND".to_string(), |d| {
                if mode == GetMode::BriefDocs { d.brief.clone() } else { d.full.clone() }
            });
            ev.add_definition(var, &doc);
            return Ok(());
        }
        GetMode::Value | GetMode::Set => {}
    }

    let scope_name = args[1].as_str();
    let require_name = |name: &Option<String>| -> Result<String> {
        match name {
            Some(n) => Ok(n.clone()),
            None => error!("not given name for {scope_name} scope."),
        }
    };
    let value = match scope {
        PropertyScope::Global => ev.global_properties.get(&property).cloned(),
        PropertyScope::Directory => {
            let Some(dir) = find_directory(ev, name.as_deref()) else {
                error!("{DIRECTORY_NOT_FOUND}");
            };
            directory_property(ev, dir, &property)
        }
        PropertyScope::Target => {
            let name = require_name(&name)?;
            if ev.build.find_target(&name).is_none() {
                error!("could not find TARGET {name}.  Perhaps it has not yet been created.");
            }
            target_property_value(ev, &name, &property)
        }
        PropertyScope::Source => {
            let name = require_name(&name)?;
            let path = collapse_full_path(&name, &ev.current_source_dir());
            ev.build
                .source_property(&path, &property)
                .or_else(|| inherit_from_current_directory(ev, scope, &property))
        }
        PropertyScope::Test => {
            let name = require_name(&name)?;
            let Some(test) = ev.build.find_test(&ev.current_source_dir(), &name) else {
                error!("given TEST name that does not exist: {name}");
            };
            test.properties
                .get(&property)
                .cloned()
                .or_else(|| inherit_from_current_directory(ev, scope, &property))
        }
        PropertyScope::Variable => {
            if name.is_some() {
                error!("given name for VARIABLE scope.");
            }
            ev.get_definition(&property).map(str::to_string)
        }
        PropertyScope::Cache => {
            let name = require_name(&name)?;
            ev.cache.get(&name).and_then(|e| e.get_property(&property))
        }
    };

    match (mode, value) {
        (GetMode::Set, v) => ev.add_definition(var, if v.is_some() { "1" } else { "0" }),
        (_, Some(v)) => ev.add_definition(var, &v),
        (_, None) => ev.remove_definition(var),
    }
    Ok(())
}

pub fn get_cmake_property_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    let args = argument_values(args);
    if args.len() < 2 {
        error!("called with incorrect number of arguments");
    }
    let output = match args[1].as_str() {
        "VARIABLES" => {
            let mut names = ev.vars.names();
            names.extend(ev.cache.keys().cloned());
            names.sort();
            names.dedup();
            names.join(";")
        }
        "CACHE_VARIABLES" => ev.cache.keys().cloned().collect::<Vec<_>>().join(";"),
        "COMMANDS" => ev.commands.names().join(";"),
        "MACROS" => ev.commands.macro_names().join(";"),
        "COMPONENTS" => String::new(),
        other => ev.global_properties.get(other).cloned().unwrap_or_else(|| "NOTFOUND".to_string()),
    };
    ev.add_definition(&args[0], &output);
    Ok(())
}

pub fn get_directory_property_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    let args = argument_values(args);
    if args.len() < 2 {
        error!("called with incorrect number of arguments");
    }
    let var = &args[0];
    let mut i = 1;
    let mut dir_arg: Option<&str> = None;
    if args[1] == "DIRECTORY" {
        if args.len() < 4 {
            error!("DIRECTORY argument provided without subsequent arguments");
        }
        dir_arg = Some(&args[2]);
        i = 3;
    }
    let Some(dir) = find_directory(ev, dir_arg) else {
        error!(
            "DIRECTORY argument provided but requested directory not found. This could be because \
             the directory argument was invalid or, it is valid but has not been processed yet."
        );
    };
    if args[i] == "DEFINITION" {
        let Some(name) = args.get(i + 1) else {
            error!(
                "A request for a variable definition was made without providing the name of the \
                 variable to get."
            );
        };
        let value = ev.get_safe_definition(name);
        ev.add_definition(var, &value);
        return Ok(());
    }
    let value = directory_property(ev, dir, &args[i]).unwrap_or_default();
    ev.add_definition(var, &value);
    Ok(())
}

pub fn set_directory_properties_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    let args = argument_values(args);
    if args.len() < 2 || args[0] != "PROPERTIES" {
        error!("called with incorrect number of arguments");
    }
    let pairs = &args[1..];
    if pairs.len() % 2 != 0 {
        error!("Wrong number of arguments");
    }
    for pair in pairs.chunks(2) {
        match pair[0].as_str() {
            "VARIABLES" => error!("Variables and cache variables should be set using SET command"),
            "MACROS" => error!("Commands and macros cannot be set using SET_CMAKE_PROPERTIES"),
            prop => {
                ev.directory_properties_mut().insert(prop.to_string(), pair[1].clone());
            }
        }
    }
    Ok(())
}

pub fn get_source_file_property_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    let args = argument_values(args);
    if args.len() != 3 {
        error!("called with incorrect number of arguments");
    }
    let path = collapse_full_path(&args[1], &ev.current_source_dir());
    let value = if args[2] == "LOCATION" {
        ev.build.source_mut(&path);
        Some(path)
    } else {
        ev.build.source_property(&path, &args[2])
    };
    ev.add_definition(&args[0], value.as_deref().unwrap_or("NOTFOUND"));
    Ok(())
}

pub fn set_source_files_properties_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    let args = argument_values(args);
    if args.len() < 2 {
        error!("called with incorrect number of arguments");
    }
    let Some(pos) = args.iter().position(|a| a == "PROPERTIES") else {
        error!("called with illegal arguments, maybe missing a PROPERTIES specifier?");
    };
    let pairs = &args[pos + 1..];
    if pairs.len() % 2 != 0 {
        error!("called with incorrect number of arguments.");
    }
    let base = ev.current_source_dir();
    for file in &args[..pos] {
        let map = ev.build.source_mut(&collapse_full_path(file, &base));
        for pair in pairs.chunks(2) {
            map.insert(pair[0].clone(), pair[1].clone());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::testutil::{output, run, run_project};
    use crate::message::MessageType;

    #[test]
    fn test_update_property() {
        let mut map = PropertyMap::new();
        update_property(&mut map, "P", Some("a"), AppendMode::Append);
        update_property(&mut map, "P", Some("b"), AppendMode::Append);
        update_property(&mut map, "P", Some(""), AppendMode::Append);
        update_property(&mut map, "P", Some("c"), AppendMode::AppendString);
        assert_eq!(map["P"], "a;bc");
        update_property(&mut map, "P", None, AppendMode::Set);
        assert!(map.is_empty());
    }

    #[test]
    fn test_global_and_directory_properties() {
        let ev = run(
            "set_property(GLOBAL PROPERTY G a b)\nset_property(GLOBAL APPEND PROPERTY G c)\n\
             get_property(g GLOBAL PROPERTY G)\nmessage(\"${g}\")\n\
             get_property(s GLOBAL PROPERTY MISSING SET)\nmessage(${s})\n\
             set_property(DIRECTORY PROPERTY D x)\nget_property(d DIRECTORY PROPERTY D)\n\
             message(${d})\nget_directory_property(d2 D)\nmessage(${d2})\n\
             get_cmake_property(g2 G)\nmessage(\"${g2}\")\n",
        );
        assert_eq!(output(&ev), vec!["a;b;c", "0", "x", "x", "a;b;c"]);
    }

    #[test]
    fn test_get_property_unset_removes_variable() {
        let ev = run(
            "set(v old)\nget_property(v GLOBAL PROPERTY NOPE)\n\
             if(DEFINED v)\nmessage(defined)\nelse()\nmessage(undefined)\nendif()\n",
        );
        assert_eq!(output(&ev), vec!["undefined"]);
    }

    #[test]
    fn test_cache_properties() {
        let ev = run(
            "set(C 1 CACHE STRING \"doc\")\nset_property(CACHE C PROPERTY STRINGS a b)\n\
             set_property(CACHE C PROPERTY VALUE 2)\nget_property(v CACHE C PROPERTY VALUE)\n\
             get_property(t CACHE C PROPERTY TYPE)\nget_property(h CACHE C PROPERTY HELPSTRING)\n\
             message(\"${v} ${t} ${h}\")\nset_property(CACHE C PROPERTY BOGUS 1)\n",
        );
        assert_eq!(output(&ev), vec!["2 STRING doc"]);
        assert_eq!(
            ev.messenger.texts(MessageType::FatalError),
            vec![
                "set_property given invalid CACHE property BOGUS.  Settable CACHE properties are: \
                 ADVANCED, HELPSTRING, STRINGS, TYPE, and VALUE."
            ]
        );
    }

    #[test]
    fn test_define_property_docs_and_inheritance() {
        let ev = run(
            "define_property(DIRECTORY PROPERTY X INHERITED BRIEF_DOCS short FULL_DOCS long)\n\
             get_property(b DIRECTORY PROPERTY X BRIEF_DOCS)\nget_property(d DIRECTORY PROPERTY X DEFINED)\n\
             get_property(n DIRECTORY PROPERTY Y DEFINED)\nset_property(GLOBAL PROPERTY X fromglobal)\n\
             get_property(x DIRECTORY PROPERTY X)\nmessage(\"${b} ${d} ${n} ${x}\")\n",
        );
        assert_eq!(output(&ev), vec!["short 1 0 fromglobal"]);
    }

    #[test]
    fn test_invalid_scope() {
        let ev = run("set_property(NOWHERE PROPERTY X 1)\n");
        assert_eq!(
            ev.messenger.texts(MessageType::FatalError),
            vec![
                "set_property given invalid scope NOWHERE.  Valid scopes are GLOBAL, DIRECTORY, \
                 TARGET, SOURCE, TEST, CACHE."
            ]
        );
    }

    #[test]
    fn test_variable_scope_and_cmake_property_commands() {
        let ev = run(
            "set(V1 hi)\nget_property(v VARIABLE PROPERTY V1)\nmessage(${v})\n\
             macro(my_macro)\nendmacro()\nget_cmake_property(m MACROS)\nmessage(\"${m}\")\n\
             get_cmake_property(vars VARIABLES)\nlist(FIND vars V1 idx)\n\
             if(idx GREATER -1)\nmessage(found)\nendif()\n",
        );
        assert_eq!(output(&ev), vec!["hi", "my_macro", "found"]);
    }

    #[test]
    fn test_source_properties() {
        let ev = run_project(
            "project(P)\nset_source_files_properties(a.c b.c PROPERTIES COMPILE_FLAGS -O2)\n\
             get_source_file_property(f a.c COMPILE_FLAGS)\nget_source_file_property(n c.c COMPILE_FLAGS)\n\
             set_property(SOURCE b.c APPEND PROPERTY COMPILE_FLAGS -g)\n\
             get_property(g SOURCE b.c PROPERTY COMPILE_FLAGS)\nmessage(\"${f} ${n} ${g}\")\n",
        );
        assert_eq!(output(&ev), vec!["-O2 NOTFOUND -O2;-g"]);
    }
}
