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

//! The name to command registry. Lookup is case-insensitive; every entry is
//! either a built-in, a scripted function or macro, a built-in gated by a
//! policy, or a stub that only reports misuse.

use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, LazyLock},
};

use anyhow::Result;

use crate::{
    eval::{Evaluator, ExecutionStatus},
    exec, file_cmd, find, func, list_cmd, math,
    policy::{CMP0029, CMP0035, CMP0036, PolicyId, PolicyMap},
    property, string_cmd,
    stmt::{ExpandedArgument, Stmt},
    target,
};

pub type BuiltinFn = fn(&mut Evaluator, &[ExpandedArgument], &mut ExecutionStatus) -> Result<()>;

/// Runs after the whole project has been read, with the arguments the
/// command saw during the first pass.
pub type FinalPassFn = fn(&mut Evaluator, &[String]) -> Result<()>;

pub struct BuiltinInfo {
    pub name: &'static str,
    pub func: BuiltinFn,
    pub final_pass: Option<FinalPassFn>,
    /// Allowed in `-P` script mode.
    pub scriptable: bool,
}

// Function pointers are not comparable, so just compare by name
impl PartialEq for BuiltinInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Debug for BuiltinInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BuiltinInfo({})", self.name)
    }
}

/// A user-defined `function` or `macro`.
#[derive(Debug)]
pub struct ScriptedDef {
    /// As written in the definition.
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    /// Policy settings in effect where the definition was closed.
    pub policies: PolicyMap,
    pub file: String,
}

#[derive(Debug, Clone)]
pub enum Command {
    Builtin(&'static BuiltinInfo),
    Function(Arc<ScriptedDef>),
    Macro(Arc<ScriptedDef>),
    /// A built-in that the given policy may forbid.
    Disallowed {
        inner: &'static BuiltinInfo,
        policy: PolicyId,
        message: &'static str,
    },
    /// A closing keyword seen without its opener, or a command that is
    /// unavailable in the current mode.
    Unexpected {
        name: String,
        error: String,
    },
}

impl Command {
    pub fn is_macro(&self) -> bool {
        matches!(self, Command::Macro(_))
    }

    fn is_scriptable(&self) -> bool {
        match self {
            Command::Builtin(info) | Command::Disallowed { inner: info, .. } => info.scriptable,
            _ => true,
        }
    }
}

const fn builtin(name: &'static str, f: BuiltinFn) -> BuiltinInfo {
    BuiltinInfo {
        name,
        func: f,
        final_pass: None,
        scriptable: true,
    }
}

const fn project_builtin(name: &'static str, f: BuiltinFn) -> BuiltinInfo {
    BuiltinInfo {
        name,
        func: f,
        final_pass: None,
        scriptable: false,
    }
}

const BUILTINS: &[BuiltinInfo] = &[
    builtin("break", func::break_command),
    builtin("cmake_minimum_required", func::cmake_minimum_required_command),
    builtin("cmake_parse_arguments", func::cmake_parse_arguments_command),
    builtin("cmake_policy", func::cmake_policy_command),
    builtin("configure_file", file_cmd::configure_file_command),
    builtin("continue", func::continue_command),
    builtin("define_property", property::define_property_command),
    builtin("execute_process", exec::execute_process_command),
    builtin("file", file_cmd::file_command),
    builtin("find_file", find::find_file_command),
    builtin("find_library", find::find_library_command),
    builtin("find_path", find::find_path_command),
    builtin("find_program", find::find_program_command),
    builtin("foreach", func::foreach_command),
    builtin("function", func::function_command),
    builtin("get_cmake_property", property::get_cmake_property_command),
    builtin("get_directory_property", property::get_directory_property_command),
    builtin("get_filename_component", file_cmd::get_filename_component_command),
    builtin("get_property", property::get_property_command),
    builtin("if", func::if_command),
    builtin("include", func::include_command),
    builtin("include_guard", func::include_guard_command),
    builtin("list", list_cmd::list_command),
    builtin("macro", func::macro_command),
    builtin("mark_as_advanced", func::mark_as_advanced_command),
    builtin("math", math::math_command),
    builtin("message", func::message_command),
    builtin("option", func::option_command),
    builtin("return", func::return_command),
    builtin("separate_arguments", func::separate_arguments_command),
    builtin("set", func::set_command),
    builtin("set_directory_properties", property::set_directory_properties_command),
    builtin("set_property", property::set_property_command),
    builtin("string", string_cmd::string_command),
    builtin("unset", func::unset_command),
    builtin("while", func::while_command),
    project_builtin("add_compile_options", target::add_compile_options_command),
    project_builtin("add_custom_target", target::add_custom_target_command),
    project_builtin("add_definitions", target::add_definitions_command),
    project_builtin("add_dependencies", target::add_dependencies_command),
    project_builtin("add_executable", target::add_executable_command),
    project_builtin("add_library", target::add_library_command),
    project_builtin("add_subdirectory", func::add_subdirectory_command),
    project_builtin("add_test", target::add_test_command),
    project_builtin("build_name", func::build_name_command),
    BuiltinInfo {
        name: "enable_testing",
        func: target::enable_testing_command,
        final_pass: Some(target::enable_testing_final_pass),
        scriptable: false,
    },
    project_builtin("get_source_file_property", property::get_source_file_property_command),
    project_builtin("get_target_property", target::get_target_property_command),
    project_builtin("get_test_property", target::get_test_property_command),
    project_builtin("include_directories", target::include_directories_command),
    project_builtin("project", target::project_command),
    project_builtin("set_source_files_properties", property::set_source_files_properties_command),
    project_builtin("set_target_properties", target::set_target_properties_command),
    project_builtin("set_tests_properties", target::set_tests_properties_command),
    project_builtin("subdir_depends", func::subdir_depends_command),
    project_builtin("target_compile_definitions", target::target_compile_definitions_command),
    project_builtin("target_compile_options", target::target_compile_options_command),
    project_builtin("target_include_directories", target::target_include_directories_command),
    project_builtin("target_link_libraries", target::target_link_libraries_command),
    project_builtin("target_sources", target::target_sources_command),
    project_builtin("variable_requires", func::variable_requires_command),
];

static BUILTIN_MAP: LazyLock<HashMap<&'static str, &'static BuiltinInfo>> =
    LazyLock::new(|| BUILTINS.iter().map(|b| (b.name, b)).collect());

pub fn get_builtin_info(name: &str) -> Option<&'static BuiltinInfo> {
    BUILTIN_MAP.get(name).copied()
}

/// Built-ins that a policy turns into errors.
const DISALLOWED: &[(&str, PolicyId, &str)] = &[
    (
        "build_name",
        CMP0036,
        "The build_name command should not be called; see CMP0036.",
    ),
    (
        "subdir_depends",
        CMP0029,
        "The subdir_depends command should not be called; see CMP0029.",
    ),
    (
        "variable_requires",
        CMP0035,
        "The variable_requires command should not be called; see CMP0035.",
    ),
];

fn unexpected_block_error(opener: &str, closer: &str) -> String {
    format!(
        "An {closer} command was found outside of a proper {opener} {closer} structure.  \
         Or its arguments did not match the opening {opener} command."
    )
}

pub struct CommandTable {
    commands: HashMap<String, Command>,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTable {
    pub fn new() -> Self {
        let mut commands: HashMap<String, Command> = BUILTINS
            .iter()
            .map(|b| (b.name.to_string(), Command::Builtin(b)))
            .collect();
        for (name, policy, message) in DISALLOWED {
            if let Some(inner) = get_builtin_info(name) {
                commands.insert(
                    name.to_string(),
                    Command::Disallowed {
                        inner,
                        policy: *policy,
                        message: *message,
                    },
                );
            }
        }
        let mut unexpected = |name: &str, error: String| {
            commands.insert(
                name.to_string(),
                Command::Unexpected {
                    name: name.to_string(),
                    error,
                },
            );
        };
        unexpected(
            "else",
            "An ELSE command was found outside of a proper IF ENDIF structure.".to_string(),
        );
        unexpected(
            "elseif",
            "An ELSEIF command was found outside of a proper IF ENDIF structure.".to_string(),
        );
        unexpected("endforeach", unexpected_block_error("FOREACH", "ENDFOREACH"));
        unexpected("endfunction", unexpected_block_error("FUNCTION", "ENDFUNCTION"));
        unexpected("endif", unexpected_block_error("IF", "ENDIF"));
        unexpected("endmacro", unexpected_block_error("MACRO", "ENDMACRO"));
        unexpected("endwhile", unexpected_block_error("WHILE", "ENDWHILE"));
        CommandTable { commands }
    }

    /// Replaces every command that only makes sense while configuring a
    /// project with a stub reporting that it is not scriptable.
    pub fn remove_unscriptable(&mut self) {
        for (name, cmd) in self.commands.iter_mut() {
            if !cmd.is_scriptable() {
                *cmd = Command::Unexpected {
                    name: name.clone(),
                    error: "command is not scriptable".to_string(),
                };
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        match self.commands.get(name) {
            Some(cmd) => Some(cmd),
            None => self.commands.get(&name.to_ascii_lowercase()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registers a function or macro. A command that already has this name
    /// stays reachable as `_name`.
    pub fn add_scripted(&mut self, name: &str, cmd: Command) {
        let name = name.to_ascii_lowercase();
        if let Some(old) = self.commands.get(&name).cloned() {
            self.commands.insert(format!("_{name}"), old);
        }
        self.commands.insert(name, cmd);
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn macro_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .iter()
            .filter(|(_, c)| c.is_macro())
            .map(|(n, _)| n.clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripted(name: &str) -> Arc<ScriptedDef> {
        Arc::new(ScriptedDef {
            name: name.to_string(),
            params: vec![],
            body: vec![],
            policies: PolicyMap::new(),
            file: "CMakeLists.txt".to_string(),
        })
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let t = CommandTable::new();
        assert!(matches!(t.get("SET"), Some(Command::Builtin(b)) if b.name == "set"));
        assert!(t.contains("Message"));
        assert!(!t.contains("no_such_command"));
    }

    #[test]
    fn test_add_scripted_keeps_old_definition() {
        let mut t = CommandTable::new();
        t.add_scripted("Foo", Command::Function(scripted("first")));
        t.add_scripted("foo", Command::Macro(scripted("second")));
        assert!(matches!(t.get("foo"), Some(Command::Macro(d)) if d.name == "second"));
        assert!(matches!(t.get("_foo"), Some(Command::Function(d)) if d.name == "first"));
        assert_eq!(t.macro_names(), vec!["foo".to_string()]);
    }

    #[test]
    fn test_overriding_builtin() {
        let mut t = CommandTable::new();
        t.add_scripted("message", Command::Function(scripted("message")));
        assert!(matches!(t.get("_message"), Some(Command::Builtin(b)) if b.name == "message"));
    }

    #[test]
    fn test_disallowed_and_unexpected() {
        let t = CommandTable::new();
        assert!(matches!(
            t.get("build_name"),
            Some(Command::Disallowed { policy, .. }) if *policy == CMP0036
        ));
        match t.get("endwhile") {
            Some(Command::Unexpected { error, .. }) => assert_eq!(
                error,
                "An ENDWHILE command was found outside of a proper WHILE ENDWHILE structure.  \
                 Or its arguments did not match the opening WHILE command."
            ),
            _ => panic!("endwhile should be a stub"),
        }
    }

    #[test]
    fn test_remove_unscriptable() {
        let mut t = CommandTable::new();
        t.remove_unscriptable();
        assert!(matches!(t.get("project"), Some(Command::Unexpected { .. })));
        assert!(matches!(t.get("build_name"), Some(Command::Unexpected { .. })));
        assert!(matches!(t.get("set"), Some(Command::Builtin(_))));
    }
}
