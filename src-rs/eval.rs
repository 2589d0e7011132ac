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

//! The interpreter context. An [`Evaluator`] owns everything one run needs:
//! variable scopes, the cache, the policy stack, the command table, pending
//! blocks and the build description. Commands are executed one record at a
//! time through [`Evaluator::execute_command`].

use std::collections::HashSet;
use std::sync::Arc;

use crate::backtrace::{Backtrace, Frame};
use crate::blocker::Pending;
use crate::cache::{Cache, CacheEntryType};
use crate::command::{Command, CommandTable, FinalPassFn};
use crate::cond::{Condition, ConditionEvaluator};
use crate::expand::{ExpandOptions, VariableSource, expand_list_argument, expand_variables, has_empty_elements};
use crate::file::ListFile;
use crate::fileutil::host_system_info;
use crate::find::DirectoryContentCache;
use crate::flags::FLAGS;
use crate::loc::Loc;
use crate::message::{MessageType, Messenger};
use crate::policy::{
    CMP0007, CMP0011, PolicyId, PolicyMap, PolicyStack, PolicyStatus, policy_info, policy_warning,
};
use crate::property::PropertyMap;
use crate::stmt::{Argument, CommandRecord, Delimiter, ExpandedArgument, Stmt};
use crate::strutil::{collapse_full_path, concat_dir, filename_path, is_off, is_on, path_to_string};
use crate::target::BuildState;
use crate::var::{ScopeKind, Vars};
use crate::{collect_stats_with_slow_report, file_cache, log};

pub const CMAKE_VERSION: &str = "3.13.4";
const CMAKE_MAJOR_VERSION: u32 = 3;
const CMAKE_MINOR_VERSION: u32 = 13;
const CMAKE_PATCH_VERSION: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkingMode {
    /// `-P`: one script, no build description.
    Script,
    /// Reading a source tree's `CMakeLists.txt`.
    Project,
}

/// Non-local control flow requested by the commands of a body.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionStatus {
    pub return_invoked: bool,
    pub break_invoked: bool,
    pub continue_invoked: bool,
    /// An error was already reported further down the call chain.
    pub nested_error: bool,
}

impl ExecutionStatus {
    pub fn new() -> Self {
        Self::default()
    }
}

struct CallFrame {
    stmt: Stmt,
    nested_error: bool,
}

#[derive(Debug, Clone)]
pub struct DirState {
    pub source_dir: String,
    pub binary_dir: String,
    /// Source directory of the parent, empty at the top.
    pub parent_dir: String,
    pub properties: PropertyMap,
}

/// Directory properties a subdirectory starts out with.
const INHERITED_DIRECTORY_PROPERTIES: &[&str] =
    &["INCLUDE_DIRECTORIES", "COMPILE_OPTIONS", "COMPILE_DEFINITIONS", "DEFINITIONS"];

impl DirState {
    fn new(source_dir: &str, binary_dir: &str) -> Self {
        DirState {
            source_dir: source_dir.to_string(),
            binary_dir: binary_dir.to_string(),
            parent_dir: String::new(),
            properties: PropertyMap::new(),
        }
    }

    fn child(&self, source_dir: &str, binary_dir: &str) -> Self {
        let mut dir = DirState::new(source_dir, binary_dir);
        dir.parent_dir = self.source_dir.clone();
        for prop in INHERITED_DIRECTORY_PROPERTIES {
            if let Some(v) = self.properties.get(*prop) {
                dir.properties.insert(prop.to_string(), v.clone());
            }
        }
        dir
    }
}

struct FinalPass {
    name: String,
    func: FinalPassFn,
    args: Vec<String>,
    backtrace: Backtrace,
}

pub struct Evaluator {
    pub mode: WorkingMode,
    pub vars: Vars,
    pub cache: Cache,
    pub policies: PolicyStack,
    pub commands: CommandTable,
    pub build: BuildState,
    pub messenger: Messenger,
    pub global_properties: PropertyMap,
    pub(crate) dirs: Vec<DirState>,
    pub(crate) dir_contents: DirectoryContentCache,

    backtrace: Backtrace,
    call_stack: Vec<CallFrame>,
    pending: Vec<Pending>,
    // Each entry is the length of `pending` when the barrier was pushed.
    blocker_barriers: Vec<usize>,
    // One counter of open loops per function body or directory.
    loop_blocks: Vec<usize>,
    // Each entry is the policy stack depth when the barrier was pushed.
    policy_barriers: Vec<usize>,
    final_passes: Vec<FinalPass>,
    cmp0054_reported: HashSet<Loc>,
    list_files: Vec<String>,

    fatal_error: bool,
    error_occurred: bool,
    pub trace: bool,
    pub warn_uninitialized: bool,
}

impl Evaluator {
    pub fn new(mode: WorkingMode) -> Self {
        Self::with_messenger(mode, Messenger::new())
    }

    pub fn with_messenger(mode: WorkingMode, messenger: Messenger) -> Self {
        let cwd = std::env::current_dir()
            .map(|p| path_to_string(&p))
            .unwrap_or_else(|_| "/".to_string());
        let mut commands = CommandTable::new();
        if mode == WorkingMode::Script {
            commands.remove_unscriptable();
        }
        let mut ev = Evaluator {
            mode,
            vars: Vars::new(),
            cache: Cache::new(),
            policies: PolicyStack::new(),
            commands,
            build: BuildState::default(),
            messenger,
            global_properties: PropertyMap::new(),
            dirs: vec![DirState::new(&cwd, &cwd)],
            dir_contents: DirectoryContentCache::default(),
            backtrace: Backtrace::empty(),
            call_stack: Vec::new(),
            pending: Vec::new(),
            blocker_barriers: Vec::new(),
            loop_blocks: vec![0],
            policy_barriers: Vec::new(),
            final_passes: Vec::new(),
            cmp0054_reported: HashSet::new(),
            list_files: Vec::new(),
            fatal_error: false,
            error_occurred: false,
            trace: FLAGS.trace,
            warn_uninitialized: FLAGS.warn_uninitialized,
        };
        ev.add_default_definitions();
        ev.set_home_directories(&cwd, &cwd);
        ev
    }

    fn add_default_definitions(&mut self) {
        self.add_definition("CMAKE_VERSION", CMAKE_VERSION);
        self.add_definition("CMAKE_MAJOR_VERSION", &CMAKE_MAJOR_VERSION.to_string());
        self.add_definition("CMAKE_MINOR_VERSION", &CMAKE_MINOR_VERSION.to_string());
        self.add_definition("CMAKE_PATCH_VERSION", &CMAKE_PATCH_VERSION.to_string());
        self.add_definition("CMAKE_TWEAK_VERSION", "0");
        if let Ok(exe) = std::env::current_exe() {
            self.add_definition("CMAKE_COMMAND", &path_to_string(&exe));
        }
        self.add_definition("CMAKE_FILES_DIRECTORY", "/CMakeFiles");
        self.add_definition("CMAKE_HOST_UNIX", "1");
        self.add_definition("UNIX", "1");
        let (system, processor) = host_system_info();
        if system == "Darwin" {
            self.add_definition("APPLE", "1");
            self.add_definition("CMAKE_HOST_APPLE", "1");
        }
        self.add_definition("CMAKE_HOST_SYSTEM_NAME", &system);
        self.add_definition("CMAKE_HOST_SYSTEM_PROCESSOR", &processor);
    }

    /// Roots the top-level directory at the given trees.
    pub fn set_home_directories(&mut self, source_dir: &str, binary_dir: &str) {
        self.dirs.truncate(1);
        self.dirs[0] = DirState::new(source_dir, binary_dir);
        self.add_definition("CMAKE_SOURCE_DIR", source_dir);
        self.add_definition("CMAKE_BINARY_DIR", binary_dir);
        self.set_directory_definitions();
    }

    fn set_directory_definitions(&mut self) {
        let (src, bin) = (self.current_source_dir(), self.current_binary_dir());
        self.add_definition("CMAKE_CURRENT_SOURCE_DIR", &src);
        self.add_definition("CMAKE_CURRENT_BINARY_DIR", &bin);
    }

    pub fn current_source_dir(&self) -> String {
        self.dirs.last().map_or_else(String::new, |d| d.source_dir.clone())
    }

    pub fn current_binary_dir(&self) -> String {
        self.dirs.last().map_or_else(String::new, |d| d.binary_dir.clone())
    }

    pub fn home_source_dir(&self) -> String {
        self.dirs.first().map_or_else(String::new, |d| d.source_dir.clone())
    }

    pub fn home_binary_dir(&self) -> String {
        self.dirs.first().map_or_else(String::new, |d| d.binary_dir.clone())
    }

    pub fn directory_properties(&self) -> &PropertyMap {
        &self.dirs[self.dirs.len() - 1].properties
    }

    pub fn directory_properties_mut(&mut self) -> &mut PropertyMap {
        let last = self.dirs.len() - 1;
        &mut self.dirs[last].properties
    }

    pub fn fatal_error_occurred(&self) -> bool {
        self.fatal_error
    }

    pub fn set_fatal_error(&mut self) {
        self.fatal_error = true;
    }

    /// Whether anything at error severity was reported.
    pub fn error_occurred(&self) -> bool {
        self.error_occurred || self.fatal_error
    }

    /// Every list file read so far, in order.
    pub fn list_files(&self) -> &[String] {
        &self.list_files
    }

    // Variables.

    /// A normal variable, falling back to the cache.
    pub fn get_definition(&self, name: &str) -> Option<&str> {
        self.vars.get(name).or_else(|| self.cache.value(name))
    }

    pub fn get_safe_definition(&self, name: &str) -> String {
        self.get_definition(name).unwrap_or_default().to_string()
    }

    pub fn is_definition_set(&self, name: &str) -> bool {
        self.get_definition(name).is_some()
    }

    pub fn is_on(&self, name: &str) -> bool {
        self.get_definition(name).is_some_and(is_on)
    }

    pub fn add_definition(&mut self, name: &str, value: &str) {
        log!("set {name}={value}");
        self.vars.set(name, value);
    }

    pub fn remove_definition(&mut self, name: &str) {
        log!("unset {name}");
        self.vars.unset(name);
    }

    pub fn add_cache_definition(
        &mut self,
        name: &str,
        value: &str,
        doc: &str,
        ty: CacheEntryType,
        force: bool,
    ) {
        let mut value = value.to_string();
        if let Some(existing) = self.cache.get(name) {
            if existing.ty == CacheEntryType::Uninitialized && !force {
                // A value given with -D but no type takes the type declared
                // by the project.
                value = existing.value.clone();
                if matches!(ty, CacheEntryType::Path | CacheEntryType::FilePath) {
                    let base = self.home_binary_dir();
                    value = value
                        .split(';')
                        .map(|f| if f.is_empty() { String::new() } else { collapse_full_path(f, &base) })
                        .collect::<Vec<_>>()
                        .join(";");
                }
            }
        }
        self.cache.set(name, &value, ty, Some(doc));
        self.vars.unset(name);
    }

    pub fn remove_cache_definition(&mut self, name: &str) {
        self.cache.remove(name);
    }

    /// `set(... PARENT_SCOPE)`. A value of None unsets in the parent.
    pub fn raise_scope(&mut self, name: &str, value: Option<&str>) {
        if !self.vars.set_parent(name, value) {
            self.issue_message(
                MessageType::AuthorWarning,
                &format!("Cannot set \"{name}\": current scope has no parent."),
            );
        }
    }

    pub fn clear_matches(&mut self) {
        let count = self.get_definition("CMAKE_MATCH_COUNT").and_then(|c| c.parse::<usize>().ok());
        for i in 0..=count.unwrap_or(0).min(9) {
            let var = format!("CMAKE_MATCH_{i}");
            if self.vars.get(&var).is_some_and(|v| !v.is_empty()) {
                self.add_definition(&var, "");
            }
        }
        self.add_definition("CMAKE_MATCH_COUNT", "0");
    }

    pub fn store_matches(&mut self, caps: &regex::Captures) {
        let mut highest = 0;
        for i in 0..caps.len().min(10) {
            let var = format!("CMAKE_MATCH_{i}");
            match caps.get(i) {
                Some(m) => {
                    self.add_definition(&var, m.as_str());
                    highest = i;
                }
                None => {
                    if self.vars.get(&var).is_some_and(|v| !v.is_empty()) {
                        self.add_definition(&var, "");
                    }
                }
            }
        }
        self.add_definition("CMAKE_MATCH_COUNT", &highest.to_string());
    }

    // Diagnostics.

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Reports a diagnostic. Errors of fatal severity abort the rest of the
    /// run.
    pub fn issue_message(&mut self, t: MessageType, text: &str) {
        if matches!(t, MessageType::FatalError | MessageType::InternalError) {
            if let Some(frame) = self.call_stack.last_mut() {
                frame.nested_error = true;
            }
            self.fatal_error = true;
        }
        self.display_message(t, text);
    }

    /// Prints a diagnostic without aborting, as `message(SEND_ERROR)` does.
    pub fn display_message(&mut self, t: MessageType, text: &str) {
        let Some(t) = self.convert_message_type(t) else {
            return;
        };
        if t.is_error() {
            self.error_occurred = true;
        }
        let bt = self.backtrace.clone();
        self.messenger.issue(t, text, &bt);
    }

    fn convert_message_type(&self, t: MessageType) -> Option<MessageType> {
        match t {
            MessageType::AuthorWarning => {
                if self.is_on("CMAKE_SUPPRESS_DEVELOPER_WARNINGS") {
                    return None;
                }
                if self.get_definition("CMAKE_SUPPRESS_DEVELOPER_ERRORS").is_some_and(is_off) {
                    return Some(MessageType::AuthorError);
                }
                Some(t)
            }
            MessageType::DeprecationWarning => {
                if self.is_on("CMAKE_ERROR_DEPRECATED") {
                    return Some(MessageType::DeprecationError);
                }
                if self.get_definition("CMAKE_WARN_DEPRECATED").is_some_and(is_off) {
                    return None;
                }
                Some(t)
            }
            _ => Some(t),
        }
    }

    pub(crate) fn print_command_trace(&mut self, stmt: &CommandRecord) {
        let line = format!("{}({}):  {stmt}", stmt.loc.filename, stmt.loc.line);
        self.messenger.display_log(&line);
    }

    // Policies.

    pub fn policy_status(&self, id: PolicyId) -> PolicyStatus {
        self.policies.get(id)
    }

    /// `cmake_policy(VERSION)` and the version half of
    /// `cmake_minimum_required`. Policies newer than `version` may be
    /// preset through `CMAKE_POLICY_DEFAULT_CMPxxxx`.
    pub fn set_policy_version(&mut self, version: &str) -> bool {
        if let Err(e) = self.policies.set_version(version) {
            self.issue_message(MessageType::FatalError, &e.to_string());
            return false;
        }
        for info in crate::policy::all_policies() {
            if self.policies.get(info.id) != PolicyStatus::Warn {
                continue;
            }
            let var = format!("CMAKE_POLICY_DEFAULT_{}", info.id);
            match self.get_definition(&var).map(str::to_string).as_deref() {
                Some("NEW") => self.policies.set(info.id, PolicyStatus::New),
                Some("OLD") => self.policies.set(info.id, PolicyStatus::Old),
                None | Some("") => {}
                Some(other) => {
                    self.issue_message(
                        MessageType::FatalError,
                        &format!("Policy {} has invalid value \"{other}\".", info.id),
                    );
                    return false;
                }
            }
        }
        true
    }

    /// `cmake_policy(SET)`. Returns false after reporting an error.
    pub fn set_policy(&mut self, id: PolicyId, status: PolicyStatus) -> bool {
        let Some(info) = policy_info(id) else {
            self.issue_message(
                MessageType::FatalError,
                &format!("Policy \"{id}\" is not known to this version of CMake."),
            );
            return false;
        };
        if status == PolicyStatus::Old
            && matches!(
                info.default,
                PolicyStatus::RequiredIfUsed | PolicyStatus::RequiredAlways
            )
        {
            self.issue_message(
                MessageType::FatalError,
                &crate::policy::required_policy_error(id),
            );
            return false;
        }
        if status == PolicyStatus::Old && id.0 <= 36 {
            self.issue_message(
                MessageType::DeprecationWarning,
                &format!(
                    "The OLD behavior for policy {id} will be removed from a future version of \
                     CMake.\nThe cmake-policies(7) manual explains that the OLD behaviors of all \
                     policies are deprecated and that a policy should be set to OLD only under \
                     specific short-term circumstances.  Projects should be ported to the NEW \
                     behavior and not rely on setting a policy to OLD."
                ),
            );
        }
        self.policies.set(id, status);
        true
    }

    /// `cmake_policy(PUSH)`.
    pub fn push_policy(&mut self) {
        self.policies.push(false, PolicyMap::new());
    }

    /// `cmake_policy(POP)`.
    pub fn pop_policy(&mut self) {
        let floor = self.policy_barriers.last().copied().unwrap_or(1);
        if self.policies.depth() <= floor {
            self.issue_message(MessageType::FatalError, "cmake_policy POP without matching PUSH");
            return;
        }
        self.policies.pop();
    }

    fn push_policy_barrier(&mut self) {
        self.policy_barriers.push(self.policies.depth());
    }

    fn pop_policy_barrier(&mut self, report_error: bool) {
        let Some(depth) = self.policy_barriers.pop() else {
            return;
        };
        if self.policies.depth() > depth {
            if report_error {
                self.issue_message(MessageType::FatalError, "cmake_policy PUSH without matching POP");
            }
            while self.policies.depth() > depth {
                self.policies.pop();
            }
        }
    }

    /// Returns true the first time a CMP0054 diagnostic is requested for
    /// `loc`.
    pub(crate) fn should_report_cmp0054(&mut self, loc: Loc) -> bool {
        self.cmp0054_reported.insert(loc)
    }

    // Blocks and scopes.

    pub(crate) fn add_pending(&mut self, pending: Pending) {
        if pending.is_loop() {
            self.push_loop_block();
        }
        self.pending.push(pending);
    }

    pub(crate) fn pop_pending(&mut self) -> Option<Pending> {
        let barrier = self.blocker_barriers.last().copied().unwrap_or(0);
        if self.pending.len() <= barrier {
            return None;
        }
        self.pending.pop()
    }

    pub(crate) fn top_pending_mut(&mut self) -> Option<&mut Pending> {
        let barrier = self.blocker_barriers.last().copied().unwrap_or(0);
        if self.pending.len() <= barrier {
            return None;
        }
        self.pending.last_mut()
    }

    /// Called once a pending block has been replayed or abandoned.
    pub(crate) fn end_pending(&mut self, pending: &Pending) {
        if pending.is_loop() {
            self.pop_loop_block();
        }
    }

    fn push_function_blocker_barrier(&mut self) {
        self.blocker_barriers.push(self.pending.len());
    }

    fn pop_function_blocker_barrier(&mut self, mut report_error: bool) {
        let barrier = self.blocker_barriers.pop().unwrap_or(0);
        while self.pending.len() > barrier {
            let Some(p) = self.pending.pop() else {
                break;
            };
            self.end_pending(&p);
            if report_error {
                self.issue_message(
                    MessageType::FatalError,
                    &format!("A logical block opening on the line\n  {}\nis not closed.", p.start()),
                );
                report_error = false;
            }
        }
    }

    fn push_loop_block(&mut self) {
        if let Some(top) = self.loop_blocks.last_mut() {
            *top += 1;
        }
    }

    fn pop_loop_block(&mut self) {
        if let Some(top) = self.loop_blocks.last_mut() {
            *top = top.saturating_sub(1);
        }
    }

    /// Whether `break()` and `continue()` have a loop to act on.
    pub fn is_loop_block(&self) -> bool {
        self.loop_blocks.last().is_some_and(|c| *c > 0)
    }

    pub(crate) fn push_function_scope(&mut self, policies: &PolicyMap) {
        log!("push function scope");
        self.vars.push_scope(ScopeKind::Function);
        self.loop_blocks.push(0);
        self.push_function_blocker_barrier();
        self.policies.push(true, policies.clone());
        self.push_policy_barrier();
    }

    pub(crate) fn pop_function_scope(&mut self, report_error: bool) {
        log!("pop function scope");
        self.pop_policy_barrier(report_error);
        self.policies.pop();
        self.vars.pop_scope();
        self.pop_function_blocker_barrier(report_error);
        self.loop_blocks.pop();
    }

    pub(crate) fn push_macro_scope(&mut self, policies: &PolicyMap) {
        self.push_function_blocker_barrier();
        self.policies.push(true, policies.clone());
        self.push_policy_barrier();
    }

    pub(crate) fn pop_macro_scope(&mut self, report_error: bool) {
        self.pop_policy_barrier(report_error);
        self.policies.pop();
        self.pop_function_blocker_barrier(report_error);
    }

    // Execution.

    /// The record being executed, if any.
    pub fn current_command(&self) -> Option<&Stmt> {
        self.call_stack.last().map(|f| &f.stmt)
    }

    /// The frame naming the record being executed, for messages that point
    /// back at it later.
    pub fn current_frame(&self) -> Frame {
        match self.current_command() {
            Some(stmt) => Frame {
                loc: stmt.loc,
                name: Some(stmt.name.clone()),
            },
            None => Frame {
                loc: Loc::default(),
                name: None,
            },
        }
    }

    pub(crate) fn push_command_frame(&mut self, loc: Loc, name: &str) {
        self.backtrace = self.backtrace.push_command(loc, name);
    }

    pub(crate) fn pop_frame(&mut self) {
        self.backtrace = self.backtrace.pop();
    }

    /// Expands `source` against the current scope.
    pub fn expand_string(&mut self, source: &str, opts: &ExpandOptions) -> anyhow::Result<String> {
        let exp = expand_variables(source, &*self, opts)?;
        if self.warn_uninitialized {
            for name in &exp.undefined {
                if !self.vars.is_initialized(name) {
                    self.issue_message(
                        MessageType::AuthorWarning,
                        &format!("uninitialized variable '{name}'"),
                    );
                }
            }
        }
        Ok(exp.value)
    }

    /// Expands raw arguments into the values a command sees. Returns None
    /// once a fatal expansion error has been reported.
    pub fn expand_arguments(&mut self, args: &[Argument], filename: &str) -> Option<Vec<ExpandedArgument>> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            if arg.delim == Delimiter::Bracket {
                out.push(ExpandedArgument::new(arg.value.clone(), true));
                continue;
            }
            let opts = ExpandOptions {
                filename: Some(filename),
                line: arg.line,
                ..Default::default()
            };
            let value = match self.expand_string(&arg.value, &opts) {
                Ok(v) => v,
                Err(e) => {
                    self.issue_message(MessageType::FatalError, &e.to_string());
                    return None;
                }
            };
            if arg.delim == Delimiter::Quoted {
                out.push(ExpandedArgument::new(value, true));
            } else {
                self.split_unquoted(&value, &mut out);
            }
        }
        Some(out)
    }

    fn split_unquoted(&mut self, value: &str, out: &mut Vec<ExpandedArgument>) {
        if value.is_empty() {
            return;
        }
        let keep_empty = match self.policy_status(CMP0007) {
            PolicyStatus::Old => false,
            PolicyStatus::Warn => {
                if has_empty_elements(value) {
                    self.issue_message(
                        MessageType::AuthorWarning,
                        &format!("{} List has value = [{value}].", policy_warning(CMP0007)),
                    );
                }
                false
            }
            _ => true,
        };
        out.extend(
            expand_list_argument(value, keep_empty)
                .into_iter()
                .map(ExpandedArgument::unquoted),
        );
    }

    pub fn evaluate_condition(&mut self, args: &[ExpandedArgument]) -> Condition {
        let loc = self.current_command().map_or_else(Loc::default, |s| s.loc);
        ConditionEvaluator::new(self, loc).is_true(args)
    }

    pub fn execute_command(&mut self, stmt: &Stmt, status: &mut ExecutionStatus) -> bool {
        if self.is_function_blocked(stmt, status) {
            return true;
        }
        self.push_command_frame(stmt.loc, &stmt.name);
        self.call_stack.push(CallFrame {
            stmt: stmt.clone(),
            nested_error: false,
        });
        let result = self.dispatch(stmt, status);
        self.call_stack.pop();
        self.pop_frame();
        result
    }

    fn dispatch(&mut self, stmt: &Stmt, status: &mut ExecutionStatus) -> bool {
        let Some(cmd) = self.commands.get(&stmt.lower_name).cloned() else {
            if self.fatal_error {
                return true;
            }
            self.issue_message(
                MessageType::FatalError,
                &format!("Unknown CMake command \"{}\".", stmt.name),
            );
            return false;
        };
        if self.fatal_error {
            return true;
        }
        if self.trace {
            self.print_command_trace(stmt);
        }
        log!("{}: {}", stmt.loc, stmt.name);

        let filename = stmt.loc.filename.as_str();
        let Some(args) = self.expand_arguments(&stmt.args, &filename) else {
            return true;
        };

        let outcome = self.invoke(&cmd, &args, status);
        if self.call_stack.last().is_some_and(|f| f.nested_error) {
            status.nested_error = true;
        }
        match outcome {
            Ok(()) if !status.nested_error => {
                if let Command::Builtin(info) = &cmd {
                    if let Some(func) = info.final_pass {
                        self.final_passes.push(FinalPass {
                            name: stmt.name.clone(),
                            func,
                            args: args.iter().map(|a| a.value.clone()).collect(),
                            backtrace: self.backtrace.clone(),
                        });
                    }
                }
                true
            }
            Ok(()) => {
                self.fatal_error = true;
                false
            }
            Err(e) => {
                if !status.nested_error {
                    self.issue_message(MessageType::FatalError, &format!("{} {e}", stmt.name));
                    status.nested_error = true;
                }
                self.fatal_error = true;
                false
            }
        }
    }

    fn invoke(
        &mut self,
        cmd: &Command,
        args: &[ExpandedArgument],
        status: &mut ExecutionStatus,
    ) -> anyhow::Result<()> {
        match cmd {
            Command::Builtin(info) => (info.func)(self, args, status),
            Command::Function(def) => self.call_function(def, args, status),
            Command::Macro(def) => self.call_macro(def, args, status),
            Command::Disallowed {
                inner,
                policy,
                message,
            } => {
                match self.policy_status(*policy) {
                    PolicyStatus::Warn => {
                        self.issue_message(MessageType::AuthorWarning, &policy_warning(*policy))
                    }
                    PolicyStatus::Old => {}
                    _ => {
                        self.issue_message(MessageType::FatalError, message);
                        return Ok(());
                    }
                }
                (inner.func)(self, args, status)
            }
            Command::Unexpected { error, .. } => crate::error!("{error}"),
        }
    }

    /// Runs the deferred halves of commands such as `enable_testing`.
    pub fn run_final_passes(&mut self) {
        let passes = std::mem::take(&mut self.final_passes);
        for pass in passes {
            if self.fatal_error {
                break;
            }
            let saved = std::mem::replace(&mut self.backtrace, pass.backtrace.clone());
            if let Err(e) = (pass.func)(self, &pass.args) {
                self.issue_message(MessageType::FatalError, &format!("{} {e}", pass.name));
            }
            self.backtrace = saved;
        }
    }

    // Reading files.

    fn load_list_file(&mut self, path: &str) -> Option<Arc<ListFile>> {
        match file_cache::get_list_file(path) {
            Ok(lf) => lf,
            Err(e) => {
                self.issue_message(MessageType::FatalError, &format!("{e:#}"));
                None
            }
        }
    }

    fn run_list_file(&mut self, lf: &ListFile, path: &str) {
        collect_stats_with_slow_report!("list file time", path);
        log!("Reading {path}");
        self.list_files.push(path.to_string());

        let parent = self.get_safe_definition("CMAKE_PARENT_LIST_FILE");
        let current = self.get_safe_definition("CMAKE_CURRENT_LIST_FILE");
        self.add_definition("CMAKE_CURRENT_LIST_FILE", path);
        self.add_definition("CMAKE_CURRENT_LIST_DIR", filename_path(path));

        for stmt in &lf.stmts {
            let mut status = ExecutionStatus::new();
            self.execute_command(stmt, &mut status);
            if self.fatal_error || status.return_invoked {
                break;
            }
        }

        self.add_definition("CMAKE_PARENT_LIST_FILE", &parent);
        self.add_definition("CMAKE_CURRENT_LIST_FILE", &current);
        self.add_definition("CMAKE_CURRENT_LIST_DIR", filename_path(&current));
    }

    fn run_in_list_file_scope(&mut self, path: &str, lf: Option<Arc<ListFile>>) -> bool {
        self.backtrace = self.backtrace.push_file(path);
        self.push_function_blocker_barrier();
        let lf = lf.or_else(|| self.load_list_file(path));
        let read = match &lf {
            Some(lf) => {
                self.run_list_file(lf, path);
                true
            }
            None => false,
        };
        let report = !self.fatal_error;
        self.pop_function_blocker_barrier(report);
        self.pop_frame();
        read
    }

    /// Reads and runs a list file in the current scope. Returns false if it
    /// could not be read.
    pub fn read_list_file(&mut self, filename: &str) -> bool {
        let path = collapse_full_path(filename, &self.current_source_dir());
        self.run_in_list_file_scope(&path, None)
    }

    /// Runs script text as if it were a file called `name`.
    pub fn read_list_text(&mut self, name: &str, text: &str) -> bool {
        match ListFile::from_text(name, text) {
            Ok(lf) => self.run_in_list_file_scope(name, Some(lf)),
            Err(e) => {
                self.issue_message(MessageType::FatalError, &format!("{e:#}"));
                false
            }
        }
    }

    /// `include()`: runs `filename` with its own policy scope unless
    /// `no_policy_scope` is set or CMP0011 is OLD.
    pub fn read_dependent_file(&mut self, filename: &str, mut no_policy_scope: bool) -> bool {
        let current = self.get_safe_definition("CMAKE_CURRENT_LIST_FILE");
        self.add_definition("CMAKE_PARENT_LIST_FILE", &current);
        let path = collapse_full_path(filename, &self.current_source_dir());
        collect_stats_with_slow_report!("include time", &path);

        self.backtrace = self.backtrace.push_file(&path);
        self.push_function_blocker_barrier();
        let mut check_cmp0011 = false;
        if !no_policy_scope {
            match self.policy_status(CMP0011) {
                PolicyStatus::Warn => {
                    check_cmp0011 = true;
                    self.policies.push(true, PolicyMap::new());
                }
                PolicyStatus::Old => no_policy_scope = true,
                PolicyStatus::New => self.policies.push(false, PolicyMap::new()),
                PolicyStatus::RequiredIfUsed | PolicyStatus::RequiredAlways => {
                    check_cmp0011 = true;
                    self.policies.push(false, PolicyMap::new());
                }
            }
        }
        self.push_policy_barrier();

        let read = match self.load_list_file(&path) {
            Some(lf) => {
                self.run_list_file(&lf, &path);
                true
            }
            None => false,
        };

        let report = !self.fatal_error;
        self.pop_policy_barrier(report);
        if !no_policy_scope {
            if check_cmp0011 && self.policies.top_is_empty() {
                check_cmp0011 = false;
            }
            self.policies.pop();
            if check_cmp0011 {
                self.enforce_cmp0011(&path);
            }
        }
        self.pop_function_blocker_barrier(report);
        self.pop_frame();
        read
    }

    fn enforce_cmp0011(&mut self, path: &str) {
        match self.policy_status(CMP0011) {
            PolicyStatus::Warn => {
                let text = format!(
                    "{}\nThe included script\n  {path}\naffects policy settings.  CMake is \
                     implying the NO_POLICY_SCOPE option for compatibility, so the effects are \
                     applied to the including context.",
                    policy_warning(CMP0011)
                );
                self.issue_message(MessageType::AuthorWarning, &text);
            }
            PolicyStatus::RequiredIfUsed | PolicyStatus::RequiredAlways => {
                let text = format!(
                    "{}\nThe included script\n  {path}\naffects policy settings, so it requires \
                     this policy to be set.",
                    crate::policy::required_policy_error(CMP0011)
                );
                self.issue_message(MessageType::FatalError, &text);
            }
            PolicyStatus::Old | PolicyStatus::New => {}
        }
    }

    /// Reads `<dir>/CMakeLists.txt` inside the current directory's own
    /// policy scope.
    fn read_directory_list_file(&mut self, prelude: Option<Stmt>) -> bool {
        let list_file = concat_dir(&self.current_source_dir(), "CMakeLists.txt");
        self.policies.push(false, PolicyMap::new());
        self.push_policy_barrier();
        if let Some(stmt) = prelude {
            let mut status = ExecutionStatus::new();
            self.execute_command(&stmt, &mut status);
        }
        let read = self.read_list_file(&list_file);
        let report = !self.fatal_error;
        self.pop_policy_barrier(report);
        self.policies.pop();
        read
    }

    /// `add_subdirectory()`: runs the child's list file in a new variable
    /// scope with its own directory state.
    pub fn process_subdirectory(&mut self, source_dir: &str, binary_dir: &str) -> bool {
        log!("Entering directory {source_dir}");
        self.vars.push_scope(ScopeKind::Directory);
        let dir = match self.dirs.last() {
            Some(parent) => parent.child(source_dir, binary_dir),
            None => DirState::new(source_dir, binary_dir),
        };
        self.dirs.push(dir);
        self.loop_blocks.push(0);
        self.set_directory_definitions();
        let read = self.read_directory_list_file(None);
        self.loop_blocks.pop();
        if let Some(dir) = self.dirs.pop() {
            self.build.finish_directory(dir);
        }
        self.vars.pop_scope();
        read
    }

    /// Script mode: runs one file with `CMAKE_ARGV<n>` describing the
    /// command line.
    pub fn run_script(&mut self, script: &str, script_args: &[String]) -> bool {
        let cwd = self.current_source_dir();
        let path = collapse_full_path(script, &cwd);
        self.add_definition("CMAKE_SCRIPT_MODE_FILE", &path);
        let mut argv = vec![
            self.get_safe_definition("CMAKE_COMMAND"),
            "-P".to_string(),
            script.to_string(),
        ];
        argv.extend(script_args.iter().cloned());
        for (i, arg) in argv.iter().enumerate() {
            self.add_definition(&format!("CMAKE_ARGV{i}"), arg);
        }
        self.add_definition("CMAKE_ARGC", &argv.len().to_string());

        if !self.read_list_file(&path) {
            self.issue_message(
                MessageType::FatalError,
                &format!("Error processing file: {path}"),
            );
        }
        !self.error_occurred()
    }

    /// Project mode: reads the top-level `CMakeLists.txt` and runs the final
    /// passes. Cache loading and saving are up to the caller.
    pub fn configure(&mut self, source_dir: &str, binary_dir: &str) -> bool {
        collect_stats_with_slow_report!("configure time", source_dir);
        self.set_home_directories(source_dir, binary_dir);
        if let Some(home) = self.cache.value("CMAKE_HOME_DIRECTORY").map(str::to_string) {
            if home != source_dir {
                let text = format!(
                    "The source \"{source_dir}/CMakeLists.txt\" does not match the source \
                     \"{home}/CMakeLists.txt\" used to generate cache.  Re-run cmake with a \
                     different source directory."
                );
                self.issue_message(MessageType::FatalError, &text);
                return false;
            }
        }
        self.cache.set(
            "CMAKE_HOME_DIRECTORY",
            source_dir,
            CacheEntryType::Internal,
            Some("Source directory with the top level CMakeLists.txt file for this project"),
        );
        self.cache.set(
            "CMAKE_CACHEFILE_DIR",
            binary_dir,
            CacheEntryType::Internal,
            Some("This is the directory where this CMakeCache.txt was created"),
        );
        let command = self.get_safe_definition("CMAKE_COMMAND");
        self.cache.set(
            "CMAKE_COMMAND",
            &command,
            CacheEntryType::Internal,
            Some("Path to CMake executable."),
        );

        let list_file = concat_dir(source_dir, "CMakeLists.txt");
        let Some(lf) = self.load_list_file(&list_file) else {
            if !self.fatal_error {
                self.issue_message(
                    MessageType::FatalError,
                    &format!(
                        "The source directory\n  {source_dir}\ndoes not appear to contain \
                         CMakeLists.txt."
                    ),
                );
            }
            return false;
        };

        let prelude = self.check_top_level_commands(&lf, &list_file);
        self.read_directory_list_file(prelude);
        if !self.fatal_error {
            self.run_final_passes();
        }
        let status = if self.error_occurred() {
            "Configuring incomplete, errors occurred!"
        } else {
            "Configuring done"
        };
        self.messenger.display_status(status);
        !self.error_occurred()
    }

    /// Diagnoses a top-level list file without `cmake_minimum_required()` or
    /// `project()`. Returns the implicit `project()` call to run first, if
    /// one is needed.
    fn check_top_level_commands(&mut self, lf: &ListFile, path: &str) -> Option<Stmt> {
        let has_version = lf.stmts.iter().any(|s| s.lower_name == "cmake_minimum_required");
        let has_project = lf.stmts.iter().any(|s| s.lower_name == "project");
        self.backtrace = self.backtrace.push_file(path);
        if !has_version {
            let text = format!(
                "No cmake_minimum_required command is present.  A line of code such as\n\n  \
                 cmake_minimum_required(VERSION {CMAKE_MAJOR_VERSION}.{CMAKE_MINOR_VERSION})\n\n\
                 should be added at the top of the file.  The version specified may be lower \
                 if you wish to support older CMake versions for this project.  For more \
                 information run \"cmake --help-policy CMP0000\"."
            );
            self.issue_message(MessageType::AuthorWarning, &text);
            self.set_policy_version("2.4");
        }
        let prelude = if has_project {
            None
        } else {
            let text = "No project() command is present.  The top-level CMakeLists.txt file \
                        must contain a literal, direct call to the project() command.  Add a \
                        line of code such as\n\n  project(ProjectName)\n\nnear the top of the \
                        file, but after cmake_minimum_required().\n\nCMake is pretending there \
                        is a \"project(Project)\" command on the first line.";
            self.issue_message(MessageType::AuthorWarning, text);
            let loc = Loc::new(path, 1);
            Some(Arc::new(CommandRecord::new(
                "project",
                loc,
                vec![Argument::new("Project", Delimiter::Unquoted, 1)],
            )))
        };
        self.pop_frame();
        prelude
    }
}

impl VariableSource for Evaluator {
    fn definition(&self, name: &str) -> Option<&str> {
        self.get_definition(name)
    }

    fn cache_definition(&self, name: &str) -> Option<&str> {
        self.cache.value(name)
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    pub fn script_evaluator() -> Evaluator {
        Evaluator::with_messenger(WorkingMode::Script, Messenger::capturing())
    }

    /// Runs `text` in a fresh script-mode evaluator.
    pub fn run(text: &str) -> Evaluator {
        let mut ev = script_evaluator();
        ev.read_list_text("test.cmake", text);
        ev
    }

    /// Runs `text` as the top-level list file of a project-mode evaluator,
    /// followed by the final passes.
    pub fn run_project(text: &str) -> Evaluator {
        let mut ev = Evaluator::with_messenger(WorkingMode::Project, Messenger::capturing());
        ev.read_list_text("CMakeLists.txt", text);
        if !ev.fatal_error_occurred() {
            ev.run_final_passes();
        }
        ev
    }

    /// Plain `message()` output, in order.
    pub fn output(ev: &Evaluator) -> Vec<String> {
        ev.messenger
            .texts(MessageType::Message)
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;

    #[test]
    fn test_list_length_scenario() {
        let ev = run("set(L 1 2 3)\nlist(LENGTH L n)\nmessage(${n})\n");
        assert_eq!(output(&ev), vec!["3"]);
        assert!(!ev.error_occurred());
    }

    #[test]
    fn test_function_early_return() {
        let ev = run(
            "function(f a)\n if(${a} EQUAL 1)\n return()\n endif()\n message(\"unreachable\")\n\
             endfunction()\nf(1)\n",
        );
        assert!(output(&ev).is_empty());
        assert!(!ev.error_occurred());
    }

    #[test]
    fn test_unknown_command_is_fatal() {
        let ev = run("message(a)\nno_such_thing()\nmessage(b)\n");
        assert_eq!(output(&ev), vec!["a"]);
        assert!(ev.fatal_error_occurred());
        assert_eq!(
            ev.messenger.texts(MessageType::FatalError),
            vec!["Unknown CMake command \"no_such_thing\"."]
        );
    }

    #[test]
    fn test_command_error_text() {
        let ev = run("unset()\n");
        assert_eq!(
            ev.messenger.texts(MessageType::FatalError),
            vec!["unset called with incorrect number of arguments"]
        );
    }

    #[test]
    fn test_not_scriptable() {
        let ev = run("project(x)\n");
        assert_eq!(
            ev.messenger.texts(MessageType::FatalError),
            vec!["project command is not scriptable"]
        );
    }

    #[test]
    fn test_expansion_splits_unquoted_only() {
        let mut ev = script_evaluator();
        ev.add_definition("L", "a;b;c");
        let args = vec![
            Argument::new("${L}", Delimiter::Unquoted, 1),
            Argument::new("${L}", Delimiter::Quoted, 1),
            Argument::new("x;y", Delimiter::Bracket, 1),
        ];
        let out = ev.expand_arguments(&args, "test.cmake").unwrap();
        let values: Vec<&str> = out.iter().map(|a| a.value.as_str()).collect();
        assert_eq!(values, vec!["a", "b", "c", "a;b;c", "x;y"]);
        assert!(out[3].quoted);
    }

    #[test]
    fn test_empty_elements_follow_cmp0007() {
        let mut ev = script_evaluator();
        ev.add_definition("L", "a;;b");
        let args = vec![Argument::new("${L}", Delimiter::Unquoted, 1)];
        ev.policies.set(CMP0007, PolicyStatus::Old);
        assert_eq!(ev.expand_arguments(&args, "t").unwrap().len(), 2);
        ev.policies.set(CMP0007, PolicyStatus::New);
        assert_eq!(ev.expand_arguments(&args, "t").unwrap().len(), 3);
        ev.add_definition("E", "");
        let empty = vec![Argument::new("${E}", Delimiter::Unquoted, 1)];
        assert!(ev.expand_arguments(&empty, "t").unwrap().is_empty());
    }

    #[test]
    fn test_list_file_variables() {
        let dir = tempfile::tempdir().unwrap();
        let inc = dir.path().join("inc.cmake");
        std::fs::write(&inc, "message(\"${CMAKE_CURRENT_LIST_FILE}|${CMAKE_PARENT_LIST_FILE}\")\n")
            .unwrap();
        let inc = inc.to_string_lossy().into_owned();
        let ev = run(&format!("include({inc})\nmessage(\"after=${{CMAKE_CURRENT_LIST_FILE}}\")\n"));
        let out = output(&ev);
        assert_eq!(out.len(), 2);
        assert!(out[0].starts_with(&format!("{inc}|")));
        assert_eq!(out[1], "after=test.cmake");
    }

    #[test]
    fn test_unclosed_block_reported() {
        let ev = run("if(TRUE)\nmessage(x)\n");
        let errors = ev.messenger.texts(MessageType::FatalError);
        assert_eq!(
            errors,
            vec!["A logical block opening on the line\n  test.cmake:1 (if)\nis not closed."]
        );
    }

    #[test]
    fn test_raise_scope_without_parent() {
        let ev = run("set(X 1 PARENT_SCOPE)\n");
        assert_eq!(
            ev.messenger.texts(MessageType::AuthorWarning),
            vec!["Cannot set \"X\": current scope has no parent."]
        );
    }

    #[test]
    fn test_trace_output() {
        let mut ev = script_evaluator();
        ev.trace = true;
        ev.read_list_text("t.cmake", "set(A \"b c\")\n");
        assert_eq!(
            ev.messenger.texts(MessageType::Log),
            vec!["t.cmake(1):  set(A \"b c\" )"]
        );
    }

    #[test]
    fn test_configure_project() {
        let src = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        std::fs::write(
            src.path().join("CMakeLists.txt"),
            "cmake_minimum_required(VERSION 3.5)\nproject(demo)\nmessage(${PROJECT_NAME})\n",
        )
        .unwrap();
        let src = src.path().to_string_lossy().into_owned();
        let bin = bin.path().to_string_lossy().into_owned();
        let mut ev = Evaluator::with_messenger(WorkingMode::Project, Messenger::capturing());
        assert!(ev.configure(&src, &bin));
        let out = output(&ev);
        assert_eq!(out.first().map(String::as_str), Some("demo"));
        assert_eq!(out.last().map(String::as_str), Some("-- Configuring done"));
        assert_eq!(ev.cache.value("CMAKE_HOME_DIRECTORY"), Some(src.as_str()));
    }

    #[test]
    fn test_configure_without_project_warns() {
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("CMakeLists.txt"), "message(${PROJECT_NAME})\n").unwrap();
        let src = src.path().to_string_lossy().into_owned();
        let mut ev = Evaluator::with_messenger(WorkingMode::Project, Messenger::capturing());
        assert!(ev.configure(&src, &src));
        assert_eq!(output(&ev)[0], "Project");
        let warnings = ev.messenger.texts(MessageType::AuthorWarning);
        assert!(warnings.iter().any(|w| w.starts_with("No cmake_minimum_required command")));
        assert!(warnings.iter().any(|w| w.starts_with("No project() command is present.")));
    }
}
