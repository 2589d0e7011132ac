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

//! `execute_process()`: runs one or more commands as a pipeline and reports
//! their output and exit status.

use std::fs::File;
use std::io::{Read, Write};
use std::process::{Child, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Result;
use os_pipe::{PipeReader, PipeWriter};

use crate::eval::{Evaluator, ExecutionStatus};
use crate::stmt::{ExpandedArgument, argument_values};
use crate::{error, log};

const TIMEOUT_RESULT: &str = "Process terminated due to timeout";

#[derive(Debug, Default)]
struct ProcessRequest {
    commands: Vec<Vec<String>>,
    working_directory: Option<String>,
    timeout: Option<Duration>,
    result_variable: Option<String>,
    results_variable: Option<String>,
    output_variable: Option<String>,
    error_variable: Option<String>,
    input_file: Option<String>,
    output_file: Option<String>,
    error_file: Option<String>,
    output_quiet: bool,
    error_quiet: bool,
    strip_output: bool,
    strip_error: bool,
}

impl ProcessRequest {
    fn merged_output(&self) -> bool {
        self.output_variable.is_some() && self.output_variable == self.error_variable
    }
}

fn parse_request(args: &[String]) -> Result<ProcessRequest> {
    if args.is_empty() {
        error!("called with incorrect number of arguments");
    }
    let mut req = ProcessRequest::default();
    let mut in_command = false;
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        let takes_value = matches!(
            arg,
            "WORKING_DIRECTORY"
                | "TIMEOUT"
                | "RESULT_VARIABLE"
                | "RESULTS_VARIABLE"
                | "OUTPUT_VARIABLE"
                | "ERROR_VARIABLE"
                | "INPUT_FILE"
                | "OUTPUT_FILE"
                | "ERROR_FILE"
                | "ENCODING"
        );
        if takes_value {
            in_command = false;
            let Some(value) = args.get(i + 1).cloned() else {
                error!("called with no value for {arg}.");
            };
            match arg {
                "WORKING_DIRECTORY" => req.working_directory = Some(value),
                "TIMEOUT" => {
                    let Some(secs) = value.trim().parse::<f64>().ok().filter(|s| s.is_finite()) else {
                        error!("called with TIMEOUT value that could not be parsed.");
                    };
                    req.timeout = Some(Duration::from_secs_f64(secs.max(0.0)));
                }
                "RESULT_VARIABLE" => req.result_variable = Some(value),
                "RESULTS_VARIABLE" => req.results_variable = Some(value),
                "OUTPUT_VARIABLE" => req.output_variable = Some(value),
                "ERROR_VARIABLE" => req.error_variable = Some(value),
                "INPUT_FILE" => req.input_file = Some(value),
                "OUTPUT_FILE" => req.output_file = Some(value),
                "ERROR_FILE" => req.error_file = Some(value),
                _ => {}
            }
            i += 2;
            continue;
        }
        match arg {
            "COMMAND" => {
                in_command = true;
                req.commands.push(Vec::new());
            }
            "OUTPUT_QUIET" => req.output_quiet = true,
            "ERROR_QUIET" => req.error_quiet = true,
            "OUTPUT_STRIP_TRAILING_WHITESPACE" => req.strip_output = true,
            "ERROR_STRIP_TRAILING_WHITESPACE" => req.strip_error = true,
            _ if in_command => {
                if let Some(cmd) = req.commands.last_mut() {
                    cmd.push(arg.to_string());
                }
            }
            _ => error!("given unknown argument \"{arg}\"."),
        }
        i += 1;
    }
    if req.commands.is_empty() {
        error!("called with no COMMAND argument.");
    }
    if req.commands.iter().any(Vec::is_empty) {
        error!("given COMMAND argument with no value.");
    }
    Ok(req)
}

/// Where one output stream of the pipeline goes.
enum Sink {
    Pipe(PipeWriter),
    File(File),
}

impl Sink {
    fn stdio(&self) -> std::io::Result<Stdio> {
        Ok(match self {
            Sink::Pipe(w) => w.try_clone()?.into(),
            Sink::File(f) => f.try_clone()?.into(),
        })
    }
}

fn open_sink(file: Option<&str>) -> std::io::Result<(Sink, Option<PipeReader>)> {
    match file {
        Some(path) => Ok((Sink::File(File::create(path)?), None)),
        None => {
            let (reader, writer) = os_pipe::pipe()?;
            Ok((Sink::Pipe(writer), Some(reader)))
        }
    }
}

fn drain(reader: Option<PipeReader>) -> Option<JoinHandle<Vec<u8>>> {
    reader.map(|mut r| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = r.read_to_end(&mut buf);
            buf
        })
    })
}

fn join(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

struct PipelineOutcome {
    /// One entry per command, in pipeline order.
    results: Vec<String>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

fn os_error_text(err: &std::io::Error) -> String {
    let text = err.to_string();
    match text.find(" (os error") {
        Some(pos) => text[..pos].to_string(),
        None => text,
    }
}

fn status_text(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    if let Some(code) = status.code() {
        return code.to_string();
    }
    match status.signal() {
        // SAFETY: strsignal returns a pointer to a static or thread-local
        // string that stays valid until the next call on this thread.
        Some(sig) => unsafe {
            let ptr = libc::strsignal(sig);
            if ptr.is_null() {
                format!("Signal {sig}")
            } else {
                std::ffi::CStr::from_ptr(ptr).to_string_lossy().into_owned()
            }
        },
        None => "Abnormal exit".to_string(),
    }
}

fn kill_all(children: &mut [Child]) {
    for child in children {
        let _ = child.kill();
        let _ = child.wait();
    }
}

fn run_pipeline(req: &ProcessRequest) -> std::io::Result<PipelineOutcome> {
    let (out_sink, out_reader) = open_sink(req.output_file.as_deref())?;
    let (err_sink, err_reader) = if req.merged_output() && req.error_file.is_none() {
        (None, None)
    } else {
        let (sink, reader) = open_sink(req.error_file.as_deref())?;
        (Some(sink), reader)
    };

    let mut children: Vec<Child> = Vec::new();
    let mut upstream: Option<PipeReader> = None;
    let last = req.commands.len() - 1;
    for (i, argv) in req.commands.iter().enumerate() {
        let mut cmd = std::process::Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        if let Some(dir) = &req.working_directory {
            cmd.current_dir(dir);
        }
        match upstream.take() {
            Some(reader) => {
                cmd.stdin(reader);
            }
            None => match &req.input_file {
                Some(path) => {
                    cmd.stdin(File::open(path)?);
                }
                None => {
                    cmd.stdin(Stdio::inherit());
                }
            },
        }
        if i == last {
            cmd.stdout(out_sink.stdio()?);
        } else {
            let (reader, writer) = os_pipe::pipe()?;
            cmd.stdout(writer);
            upstream = Some(reader);
        }
        cmd.stderr(err_sink.as_ref().unwrap_or(&out_sink).stdio()?);

        log!("execute_process: {argv:?}");
        let spawned = cmd.spawn();
        // The command holds copies of the pipe ends; release them so readers
        // see EOF once the children exit.
        drop(cmd);
        match spawned {
            Ok(child) => children.push(child),
            Err(e) => {
                kill_all(&mut children);
                return Err(e);
            }
        }
    }
    drop(out_sink);
    drop(err_sink);

    let out_thread = drain(out_reader);
    let err_thread = drain(err_reader);

    let mut statuses: Vec<Option<ExitStatus>> = vec![None; children.len()];
    let deadline = req.timeout.map(|t| Instant::now() + t);
    let mut timed_out = false;
    loop {
        for (child, status) in children.iter_mut().zip(statuses.iter_mut()) {
            if status.is_none() {
                *status = child.try_wait()?;
            }
        }
        if statuses.iter().all(Option::is_some) {
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            kill_all(&mut children);
            timed_out = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    let results = if timed_out {
        vec![TIMEOUT_RESULT.to_string(); children.len()]
    } else {
        statuses.into_iter().map(|s| s.map(status_text).unwrap_or_default()).collect()
    };
    Ok(PipelineOutcome {
        results,
        stdout: join(out_thread),
        stderr: join(err_thread),
    })
}

fn finish_output(data: &[u8], strip: bool) -> String {
    let text = String::from_utf8_lossy(data);
    if strip {
        text.trim_end_matches(|c: char| c.is_ascii_whitespace()).to_string()
    } else {
        text.into_owned()
    }
}

pub fn execute_process_command(
    ev: &mut Evaluator,
    args: &[ExpandedArgument],
    _: &mut ExecutionStatus,
) -> Result<()> {
    let args = argument_values(args);
    let req = parse_request(&args)?;

    let outcome = match run_pipeline(&req) {
        Ok(outcome) => outcome,
        Err(e) => PipelineOutcome {
            results: vec![os_error_text(&e); req.commands.len()],
            stdout: Vec::new(),
            stderr: Vec::new(),
        },
    };

    if !req.output_quiet {
        match &req.output_variable {
            Some(var) => ev.add_definition(var, &finish_output(&outcome.stdout, req.strip_output)),
            None => {
                let _ = std::io::stdout().write_all(&outcome.stdout);
            }
        }
    }
    if !req.error_quiet && !req.merged_output() {
        match &req.error_variable {
            Some(var) => ev.add_definition(var, &finish_output(&outcome.stderr, req.strip_error)),
            None => {
                let _ = std::io::stderr().write_all(&outcome.stderr);
            }
        }
    }
    if let Some(var) = &req.result_variable {
        let last = outcome.results.last().cloned().unwrap_or_default();
        ev.add_definition(var, &last);
    }
    if let Some(var) = &req.results_variable {
        ev.add_definition(var, &outcome.results.join(";"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::testutil::{output, run};
    use crate::message::MessageType;
    use crate::strutil::path_to_string;

    #[test]
    fn test_pipeline() {
        let ev = run(
            "execute_process(COMMAND echo hello COMMAND tr a-z A-Z OUTPUT_VARIABLE out \
             RESULT_VARIABLE r OUTPUT_STRIP_TRAILING_WHITESPACE)\nmessage(\"${out} ${r}\")\n",
        );
        assert_eq!(output(&ev), vec!["HELLO 0"]);
    }

    #[test]
    fn test_exit_codes() {
        let ev = run(
            "execute_process(COMMAND sh -c \"exit 2\" COMMAND sh -c \"exit 3\" RESULT_VARIABLE r \
             RESULTS_VARIABLE rs)\nmessage(\"${r} ${rs}\")\n",
        );
        assert_eq!(output(&ev), vec!["3 2;3"]);
    }

    #[test]
    fn test_merged_and_separate_error() {
        let ev = run(
            "execute_process(COMMAND sh -c \"echo out; echo err 1>&2\" OUTPUT_VARIABLE o ERROR_VARIABLE o)\n\
             string(FIND \"${o}\" err pos)\nmessage(${pos})\n\
             execute_process(COMMAND sh -c \"echo out; echo err 1>&2\" OUTPUT_VARIABLE o2 \
             ERROR_VARIABLE e2 OUTPUT_STRIP_TRAILING_WHITESPACE ERROR_STRIP_TRAILING_WHITESPACE)\n\
             message(\"${o2} ${e2}\")\n",
        );
        let out = output(&ev);
        assert_ne!(out[0], "-1");
        assert_eq!(out[1], "out err");
    }

    #[test]
    fn test_timeout() {
        let ev = run("execute_process(COMMAND sleep 5 TIMEOUT 0.2 RESULT_VARIABLE r)\nmessage(${r})\n");
        assert_eq!(output(&ev), vec![TIMEOUT_RESULT]);
    }

    #[test]
    fn test_missing_program() {
        let ev = run(
            "execute_process(COMMAND /nonexistent/program RESULT_VARIABLE r)\nmessage(\"${r}\")\n",
        );
        assert_eq!(output(&ev), vec!["No such file or directory"]);
    }

    #[test]
    fn test_files_and_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = path_to_string(dir.path());
        std::fs::write(format!("{root}/in.txt"), "b\na\n").unwrap();
        let ev = run(&format!(
            "execute_process(COMMAND sort INPUT_FILE {root}/in.txt OUTPUT_FILE {root}/out.txt)\n\
             execute_process(COMMAND pwd WORKING_DIRECTORY {root} OUTPUT_VARIABLE wd \
             OUTPUT_STRIP_TRAILING_WHITESPACE)\nmessage(${{wd}})\n"
        ));
        assert_eq!(std::fs::read_to_string(format!("{root}/out.txt")).unwrap(), "a\nb\n");
        let wd = std::fs::canonicalize(&root).unwrap();
        assert_eq!(std::fs::canonicalize(&output(&ev)[0]).unwrap(), wd);
    }

    #[test]
    fn test_argument_errors() {
        let ev = run("execute_process(OUTPUT_VARIABLE v)\n");
        assert_eq!(
            ev.messenger.texts(MessageType::FatalError),
            vec!["execute_process called with no COMMAND argument."]
        );
        let ev = run("execute_process(COMMAND true BOGUS)\n");
        assert!(ev.messenger.texts(MessageType::FatalError).is_empty());
        let ev = run("execute_process(COMMAND true TIMEOUT abc)\n");
        assert_eq!(
            ev.messenger.texts(MessageType::FatalError),
            vec!["execute_process called with TIMEOUT value that could not be parsed."]
        );
    }
}
