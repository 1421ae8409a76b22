/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! The syscall dispatch contract: `SYSTEMCALL` looks up the accumulator's
//! value in a table supplied by the embedder. Kept as a trait, the same
//! dependency-injection shape as `FileReader`, so VM tests can assert on
//! observed output without touching real stdio.

use std::io::{self, Read, Write};

/// What a `SYSTEMCALL` instruction asked the embedder to do, reported back
/// to the interpreter so it can decide whether to halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallOutcome {
    Continue,
    Exit(u32),
    Unknown(u32),
}

pub trait SyscallTable {
    /// Dispatches on `a` (the accumulator value at the time of the
    /// `SYSTEMCALL`); `x` and `y_char` carry the other registers the
    /// minimum required entries read from.
    fn dispatch(&mut self, a: u32, x: u32) -> io::Result<(SyscallOutcome, u32)>;
}

/// The four minimum-required entries, doing real I/O. `x` carries the exit
/// code for entry 0 and the character to print for entry 2; the returned
/// `u32` is written back into the accumulator (used by entry 3, read-char).
pub struct DefaultSyscalls;

impl SyscallTable for DefaultSyscalls {
    fn dispatch(&mut self, a: u32, x: u32) -> io::Result<(SyscallOutcome, u32)> {
        match a {
            0 => Ok((SyscallOutcome::Exit(x), x)),
            1 => {
                print!("{x}");
                io::stdout().flush()?;
                Ok((SyscallOutcome::Continue, x))
            }
            2 => {
                print!("{}", (x as u8) as char);
                io::stdout().flush()?;
                Ok((SyscallOutcome::Continue, x))
            }
            3 => {
                let mut buf = [0u8; 1];
                let read = io::stdin().read(&mut buf)?;
                let ch = if read == 0 { 0 } else { buf[0] as u32 };
                Ok((SyscallOutcome::Continue, ch))
            }
            other => Ok((SyscallOutcome::Unknown(other), x)),
        }
    }
}

/// Records every dispatched syscall instead of touching stdio; used by
/// `hexvm`'s own VM-level tests to assert on observable output.
#[derive(Default)]
pub struct RecordingSyscalls {
    pub printed: String,
    pub scripted_input: std::collections::VecDeque<u8>,
}

impl SyscallTable for RecordingSyscalls {
    fn dispatch(&mut self, a: u32, x: u32) -> io::Result<(SyscallOutcome, u32)> {
        match a {
            0 => Ok((SyscallOutcome::Exit(x), x)),
            1 => {
                self.printed.push_str(&x.to_string());
                Ok((SyscallOutcome::Continue, x))
            }
            2 => {
                self.printed.push((x as u8) as char);
                Ok((SyscallOutcome::Continue, x))
            }
            3 => {
                let ch = self.scripted_input.pop_front().unwrap_or(0);
                Ok((SyscallOutcome::Continue, ch as u32))
            }
            other => Ok((SyscallOutcome::Unknown(other), x)),
        }
    }
}
