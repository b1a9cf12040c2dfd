// Copyright 2018-2020 Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The stream driver (C6): turns a byte stream into lines, feeds them
//! through the block-level state machine, and writes rendered chunks to
//! stdout with a one-line look-ahead so a setext underline can retroactively
//! promote the line above it to a heading.
//!
//! Three input modes are supported, matching §4.6:
//!
//! - a regular file or a blocking stdin: read line-by-line, no idle timeout;
//! - a non-blocking pipe (piped, TTY-attached stdout): `select`-driven, with
//!   an idle window that may flush a partial "prompt-looking" line;
//! - exec mode: a child's PTY is multiplexed against the user's keyboard.

use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::block::{LineEvent, ParseState};
use crate::code;
use crate::config::Config;
use crate::error::Error;
use crate::highlight::Highlighter;
use crate::inline::ImageRenderer;
use crate::plugins::clipboard::ClipboardSink;
use crate::plugins::latex::LatexPlugin;
use crate::plugins::PluginOutcome;
use crate::style;

static PROMPT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^.*>\s+$").expect("valid regex"));

/// One pending, not-yet-written render: the raw line that produced it (used
/// if a following line promotes it to a heading) and the chunks themselves.
struct Pending {
    raw_line: String,
    has_newline: bool,
    chunks: Vec<String>,
}

/// Owns the cross-line parser state and the narrow collaborators (§6),
/// and mediates between the byte loop and the block-level dispatcher.
pub struct RenderSession<'a, W: Write> {
    state: ParseState,
    highlighter: &'a dyn Highlighter,
    images: &'a dyn ImageRenderer,
    latex: &'a dyn LatexPlugin,
    clipboard: Option<&'a dyn ClipboardSink>,
    scrape_dir: Option<PathBuf>,
    scrape_index: usize,
    out: W,
    pending: Option<Pending>,
    exit_code: i32,
    last_scraped_sequence: u64,
}

impl<'a, W: Write> RenderSession<'a, W> {
    pub fn new(
        config: &Config,
        full_width: usize,
        highlighter: &'a dyn Highlighter,
        images: &'a dyn ImageRenderer,
        latex: &'a dyn LatexPlugin,
        clipboard: Option<&'a dyn ClipboardSink>,
        scrape_dir: Option<PathBuf>,
        out: W,
    ) -> Self {
        RenderSession {
            state: ParseState::new(config, full_width),
            highlighter,
            images,
            latex,
            clipboard,
            scrape_dir,
            scrape_index: 0,
            out,
            pending: None,
            exit_code: 0,
            last_scraped_sequence: 0,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn set_exit_code(&mut self, code: i32) {
        self.exit_code = code;
    }

    /// Feed one complete or partial logical line (newline included when
    /// present) through the plugin pass, then the block dispatcher.
    fn feed_line(&mut self, line: &str) -> io::Result<()> {
        let has_newline = line.ends_with('\n');

        match self.latex.apply(line) {
            PluginOutcome::Consumed => return Ok(()),
            PluginOutcome::Replace(chunks) => {
                self.commit_pending()?;
                for chunk in chunks {
                    self.write_chunk(&chunk, has_newline)?;
                }
                return Ok(());
            }
            PluginOutcome::Continue => {}
        }

        self.dispatch(line.to_string(), has_newline)
    }

    fn dispatch(&mut self, mut line: String, has_newline: bool) -> io::Result<()> {
        loop {
            let events = self.state.process_line(&line, self.highlighter, self.images);
            self.scrape_if_block_closed();

            let mut rewind = None;
            let mut promote = None;
            let mut chunks = Vec::new();
            for event in events {
                match event {
                    LineEvent::Chunk(chunk) => chunks.push(chunk),
                    LineEvent::PromoteHeading(level) => promote = Some(level),
                    LineEvent::Rewind(rewound) => rewind = Some(rewound),
                }
            }

            if let Some(level) = promote {
                if let Some(pending) = self.pending.take() {
                    let heading = self.state.format_heading(level, &pending.raw_line, self.images);
                    self.pending = Some(Pending {
                        raw_line: pending.raw_line,
                        has_newline: pending.has_newline,
                        chunks: vec![heading],
                    });
                } else {
                    warn!(level, "setext underline with nothing buffered to promote");
                }
                // The triggering line itself (the underline) never emits.
                self.state.inline.clear();
                return Ok(());
            }

            self.commit_pending()?;
            if !chunks.is_empty() {
                self.pending = Some(Pending {
                    raw_line: line.trim_end_matches('\n').trim_end().to_string(),
                    has_newline,
                    chunks,
                });
            }

            self.state.inline.clear();

            match rewind {
                Some(next) => line = next,
                None => return Ok(()),
            }
            // A `Rewind` re-feeds the triggering line as if freshly arrived,
            // without consuming another byte from the input.
        }
    }

    fn scrape_if_block_closed(&mut self) {
        if self.state.code_block_sequence == self.last_scraped_sequence {
            return;
        }
        self.last_scraped_sequence = self.state.code_block_sequence;
        let Some(dir) = &self.scrape_dir else {
            return;
        };
        let Some((language, raw)) = &self.state.last_code_block else {
            return;
        };
        let ext = code::extension_for(language);
        let path = dir.join(format!("file_{}.{ext}", self.scrape_index));
        if let Err(error) = std::fs::write(&path, raw) {
            warn!(?path, %error, "failed to scrape code block to disk");
        } else {
            self.scrape_index += 1;
        }
    }

    /// Write out a buffered render, joining its screen-row chunks with `\n`
    /// and normalizing the trailing newline to match whether the source line
    /// that produced it actually ended in one (§4.6).
    fn commit_pending(&mut self) -> io::Result<()> {
        if let Some(pending) = self.pending.take() {
            let joined = pending.chunks.join("\n");
            self.write_chunk(&joined, pending.has_newline)?;
        }
        Ok(())
    }

    fn write_chunk(&mut self, chunk: &str, has_newline: bool) -> io::Result<()> {
        let normalized = if has_newline && !chunk.ends_with('\n') {
            format!("{chunk}\n")
        } else if !has_newline {
            chunk.trim_end_matches('\n').to_string()
        } else {
            chunk.to_string()
        };
        self.write_raw(&normalized)
    }

    fn write_raw(&mut self, chunk: &str) -> io::Result<()> {
        self.out.write_all(chunk.as_bytes())?;
        self.out.flush()
    }

    /// Drain the look-ahead queue as one concatenated chunk, with no
    /// trailing newline added — used for the prompt-flush sub-case and for
    /// final cleanup (§4.6).
    fn flush_pending(&mut self) -> io::Result<()> {
        if let Some(pending) = self.pending.take() {
            let joined = pending.chunks.join("\n");
            self.write_raw(&joined)?;
        }
        Ok(())
    }

    /// Run the blocking byte loop over a regular file or blocking stdin: no
    /// idle timeout, no prompt heuristic, just line-at-a-time dispatch.
    pub fn run_blocking<R: Read>(&mut self, reader: R) -> Result<(), Error> {
        let mut reader = io::BufReader::new(reader);
        loop {
            let mut buf = Vec::new();
            let read = reader.read_until(b'\n', &mut buf).map_err(Error::Io)?;
            if read == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf).into_owned();
            self.feed_line(&line).map_err(Error::Io)?;
        }
        self.commit_pending().map_err(Error::Io)?;
        self.flush_clipboard();
        Ok(())
    }

    /// Run the non-blocking pipe loop: `select` with an idle timeout that
    /// may flush a partial line that looks like a prompt (§4.6).
    pub fn run_nonblocking_pipe(&mut self, timeout: Duration) -> Result<(), Error> {
        use rustix::event::{poll, PollFd, PollFlags};
        use rustix::fs::{fcntl_getfl, fcntl_setfl, OFlags};
        use rustix::stdio::stdin;

        let stdin_fd = stdin();
        let flags = fcntl_getfl(&stdin_fd).map_err(|e| Error::Terminal(io_error(e)))?;
        fcntl_setfl(&stdin_fd, flags | OFlags::NONBLOCK).map_err(|e| Error::Terminal(io_error(e)))?;

        let mut buffer: Vec<u8> = Vec::new();
        let mut byte = [0u8; 1];
        let mut idle_ticks = 0u32;

        loop {
            let mut fds = [PollFd::new(&stdin_fd, PollFlags::IN)];
            let ready = poll(&mut fds, timeout.as_millis() as i32).map_err(|e| Error::Terminal(io_error(e)))?;

            let got_byte = if ready > 0 && fds[0].revents().contains(PollFlags::IN) {
                match rustix::io::read(&stdin_fd, &mut byte) {
                    Ok(0) => break,
                    Ok(_) => {
                        idle_ticks = 0;
                        Some(byte[0])
                    }
                    Err(e) if e == rustix::io::Errno::AGAIN || e == rustix::io::Errno::WOULDBLOCK => None,
                    Err(e) => return Err(Error::Io(io_error(e))),
                }
            } else {
                None
            };

            match got_byte {
                Some(b) => {
                    buffer.push(b);
                    if b != b'\n' {
                        continue;
                    }
                }
                None => {
                    if buffer.is_empty() || buffer.ends_with(b"\n") {
                        continue;
                    }
                    if idle_ticks == 0 {
                        debug!("idle tick with a partial line pending");
                    }
                    idle_ticks += 1;

                    let visible_line = String::from_utf8_lossy(&buffer).into_owned();
                    let maybe_prompt = self.state.inline.is_clear() && PROMPT_RE.is_match(&visible_line);
                    if !maybe_prompt {
                        continue;
                    }

                    self.feed_line(&visible_line).map_err(Error::Io)?;
                    self.flush_pending().map_err(Error::Io)?;
                    buffer.clear();
                    continue;
                }
            }

            let line = String::from_utf8_lossy(&buffer).into_owned();
            buffer.clear();
            self.feed_line(&line).map_err(Error::Io)?;
        }

        if !buffer.is_empty() {
            let line = String::from_utf8_lossy(&buffer).into_owned();
            self.feed_line(&line).map_err(Error::Io)?;
        }
        self.commit_pending().map_err(Error::Io)?;
        self.flush_clipboard();
        Ok(())
    }

    /// Launch `command` wired to the user side of a fresh PTY, then
    /// multiplex the real keyboard against the PTY's controller side:
    /// keystrokes are forwarded and echoed byte-by-byte until a newline
    /// resets the echo buffer; otherwise PTY output feeds the parser (§4.6).
    pub fn run_exec(&mut self, command: &str) -> Result<(), Error> {
        use rustix::event::{poll, PollFd, PollFlags};
        use rustix::stdio::stdin;

        let pty = crate::pty::Pty::open()?;
        let _mode_guard = crate::pty::TerminalModeGuard::enter_cbreak()?;

        let mut parts = command.split_whitespace();
        let program = parts.next().unwrap_or_default();
        let mut cmd = std::process::Command::new(program);
        cmd.args(parts);
        let dup_user = || rustix::io::dup(&pty.user).map_err(|e| Error::Terminal(io_error(e)));
        cmd.stdin(std::process::Stdio::from(dup_user()?));
        cmd.stdout(std::process::Stdio::from(dup_user()?));
        cmd.stderr(std::process::Stdio::from(dup_user()?));
        let mut child = cmd.spawn().map_err(|source| Error::Spawn {
            command: command.to_string(),
            source,
        })?;

        let controller = &pty.controller;
        let stdin_fd = stdin();
        let mut echoing = false;
        let mut pty_buffer: Vec<u8> = Vec::new();
        let mut key_byte = [0u8; 1];
        let mut pty_byte = [0u8; 1];

        loop {
            if let Ok(Some(status)) = child.try_wait() {
                self.set_exit_code(status.code().unwrap_or(0));
                break;
            }

            let mut fds = [
                PollFd::new(&stdin_fd, PollFlags::IN),
                PollFd::new(controller, PollFlags::IN),
            ];
            let ready = poll(&mut fds, 100).map_err(|e| Error::Terminal(io_error(e)))?;
            if ready == 0 {
                continue;
            }

            if fds[0].revents().contains(PollFlags::IN) {
                if rustix::io::read(&stdin_fd, &mut key_byte).unwrap_or(0) > 0 {
                    rustix::io::write(controller, &key_byte).map_err(|e| Error::Io(io_error(e)))?;
                    self.out.write_all(&key_byte).map_err(Error::Io)?;
                    self.out.flush().map_err(Error::Io)?;
                    echoing = key_byte[0] != b'\n';
                }
            }

            if fds[1].revents().contains(PollFlags::IN) {
                match rustix::io::read(controller, &mut pty_byte) {
                    Ok(0) => continue,
                    Ok(_) => {
                        if echoing {
                            self.out.write_all(&pty_byte).map_err(Error::Io)?;
                            self.out.flush().map_err(Error::Io)?;
                        } else {
                            pty_buffer.push(pty_byte[0]);
                            if pty_byte[0] == b'\n' {
                                let line = String::from_utf8_lossy(&pty_buffer).into_owned();
                                pty_buffer.clear();
                                self.feed_line(&line).map_err(Error::Io)?;
                            }
                        }
                    }
                    Err(e) if e == rustix::io::Errno::AGAIN || e == rustix::io::Errno::WOULDBLOCK => {}
                    Err(e) => return Err(Error::Io(io_error(e))),
                }
            }
        }

        if !pty_buffer.is_empty() {
            let line = String::from_utf8_lossy(&pty_buffer).into_owned();
            self.feed_line(&line).map_err(Error::Io)?;
        }
        self.commit_pending().map_err(Error::Io)?;
        self.flush_clipboard();
        Ok(())
    }

    fn flush_clipboard(&mut self) {
        if let Some(sink) = self.clipboard {
            if let Some((_, raw)) = &self.state.last_code_block {
                if !raw.is_empty() {
                    sink.copy(raw);
                }
            }
        }
    }
}

fn io_error(errno: rustix::io::Errno) -> io::Error {
    io::Error::from_raw_os_error(errno.raw_os_error())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::highlight::SyntectHighlighter;
    use crate::inline::NullImageRenderer;
    use crate::plugins::latex::UnicodeLatexPlugin;

    fn session(out: &mut Vec<u8>) -> RenderSession<'_, &mut Vec<u8>> {
        RenderSession::new(
            &Config::default(),
            80,
            leak(SyntectHighlighter::new()),
            leak(NullImageRenderer),
            leak(UnicodeLatexPlugin),
            None,
            None,
            out,
        )
    }

    fn leak<T>(value: T) -> &'static T {
        Box::leak(Box::new(value))
    }

    #[test]
    fn plain_paragraph_is_flushed_at_end_of_stream() {
        let mut out = Vec::new();
        let mut session = session(&mut out);
        session.run_blocking("hello world\n".as_bytes()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("hello world"));
    }

    #[test]
    fn setext_underline_promotes_previous_paragraph_to_heading() {
        let mut out = Vec::new();
        let mut session = session(&mut out);
        session.run_blocking("Title\n---\n".as_bytes()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(style::BOLD_ON));
        assert!(text.contains("Title"));
    }

    #[test]
    fn setext_after_a_blank_line_is_a_plain_rule_not_a_promotion() {
        let mut out = Vec::new();
        let mut session = session(&mut out);
        session.run_blocking("Title\n\n---\n".as_bytes()).unwrap();
        let text = String::from_utf8(out).unwrap();
        // A blank line sits between "Title" and "---", so the underline is a
        // plain horizontal rule: the setext rule only promotes a paragraph
        // line directly above it.
        assert!(text.contains('\u{2500}'));
    }
}
