// License below.
//! Error kinds for the translation pipeline.

use std::error;
use std::fmt;
use std::io;

/// Fatal pipeline failures.
///
/// Expected per-PC decode misses (a word that isn't a recognized
/// instruction, or fails structural validation) are *not* errors — they
/// are represented as `None` from `disassemble` and simply leave that
/// address untranslated. Only conditions that should abort the whole
/// run are collected here.
#[derive(Debug)]
pub enum TranslateError {
    /// The loader did not supply a code region (`ROMCodeStart == 0`).
    MissingRomConfig,
    /// The `--base` CLI argument was not a valid hex address.
    InvalidBaseAddress(String),
    /// Reading the input ROM image failed.
    RomIo(io::Error),
    /// Cranelift's IR verifier rejected a generated function or the module.
    Verification(String),
    /// Writing the relocatable object file failed.
    ObjectIo(io::Error),
    /// Declaring or defining a function/data object in the Cranelift
    /// module failed.
    ModuleError(String),
}

impl error::Error for TranslateError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            TranslateError::RomIo(ref e) | TranslateError::ObjectIo(ref e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            TranslateError::MissingRomConfig => write!(f, "missing loader metadata: ROMCodeStart == 0"),
            TranslateError::InvalidBaseAddress(ref s) => write!(f, "invalid --base argument '{}': expected a hex address", s),
            TranslateError::RomIo(ref e) => write!(f, "failed reading the input ROM image: {}", e),
            TranslateError::Verification(ref s) => write!(f, "IR verification failed: {}", s),
            TranslateError::ObjectIo(ref e) => write!(f, "failed writing the output object file: {}", e),
            TranslateError::ModuleError(ref s) => write!(f, "module builder error: {}", s),
        }
    }
}

impl From<io::Error> for TranslateError {
    fn from(e: io::Error) -> TranslateError {
        TranslateError::RomIo(e)
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
