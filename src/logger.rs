// License below.
//! A small console+file logger, ported to the current `log` facade API
//! (`Log`/`Record`/`Metadata`/`LevelFilter`/`set_boxed_logger`) from the
//! host crate's older `box`-syntax-based `set_logger` closure form.
#![warn(missing_docs)]

use std::cell::RefCell;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::thread;

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Logs to stdout and, if a log file was opened successfully, to that
/// file as well. Each record is tagged with the logging thread's name
/// and the call site's file/line/module path.
pub struct ConsoleFileLogger {
    file: Option<Mutex<RefCell<File>>>,
    verbose: bool,
    colour: bool,
}

impl Log for ConsoleFileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        let min_level = if self.verbose { Level::Trace } else { Level::Info };
        metadata.level() <= min_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let cur = thread::current();
        let tid = cur.name().unwrap_or("<?>");
        let loc = format!("[{}:{} - {}]", record.file().unwrap_or("?"), record.line().unwrap_or(0), record.module_path().unwrap_or("?"));
        let fmt = format!("{}", record.args()).replace('\n', "\n\t\t   ");

        let msg = format!("[TID={}]\t{}\t{}\n\t\t-- {}\n", tid, record.level(), loc, fmt);

        if let Some(f) = self.file.as_ref() {
            let guard = f.lock().unwrap();
            let _ = writeln!(*guard.borrow_mut(), "{}", msg);
        }

        if !self.colour {
            println!("{}", msg);
        } else {
            println!(
                "\x1B[0m\x1B[2m[TID={}]\t{}{}\x1B[0m\x1B[2m\t{}\x1B[1m\n\t\t-- {}\x1B[0m\n",
                tid,
                match record.level() {
                    Level::Error => "\x1B[31m\x1B[1m", // Bold, red.
                    Level::Warn => "\x1B[33m\x1B[1m",  // Bold, yellow.
                    Level::Info => "\x1B[32m\x1B[1m",  // Bold, green.
                    _ => "\x1B[34m\x1B[1m",             // Bold, blue.
                },
                record.level(),
                loc,
                fmt
            );
        }
    }

    fn flush(&self) {
        if let Some(f) = self.file.as_ref() {
            let guard = f.lock().unwrap();
            let _ = guard.borrow_mut().flush();
        }
    }
}

/// Opens `file` (truncating it) and installs a `ConsoleFileLogger` as the
/// global logger. If the file can't be created, logging continues to
/// stdout only.
pub fn init_with(file: &Path, verbose: bool, colour: bool) -> Result<(), SetLoggerError> {
    let opened = File::create(file).ok().map(|f| Mutex::new(RefCell::new(f)));
    log::set_max_level(LevelFilter::Trace);
    log::set_boxed_logger(Box::new(ConsoleFileLogger { file: opened, verbose, colour }))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn console_only_logger_is_enabled_up_to_its_configured_level() {
        let quiet = ConsoleFileLogger { file: None, verbose: false, colour: false };
        assert!(quiet.enabled(&Metadata::builder().level(Level::Info).target("t").build()));
        assert!(!quiet.enabled(&Metadata::builder().level(Level::Debug).target("t").build()));

        let verbose = ConsoleFileLogger { file: None, verbose: true, colour: false };
        assert!(verbose.enabled(&Metadata::builder().level(Level::Trace).target("t").build()));
    }
}

/*
Licensed to the Apache Software Foundation (ASF) under one
or more contributor license agreements.  See the NOTICE file
distributed with this work for additional information
regarding copyright ownership.  The ASF licenses this file
to you under the Apache License, Version 2.0 (the
"License"); you may not use this file except in compliance
with the License.  You may obtain a copy of the License at

  http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing,
software distributed under the License is distributed on an
"AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
KIND, either express or implied.  See the License for the
specific language governing permissions and limitations
under the License.
*/
