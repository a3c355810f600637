// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Backtrackable Input Streams
//!
//! The parser driver sits on top of a [`Stream`] and needs four things
//! from it:
//!
//! 1. Feed data in as it arrives (`append_*`).
//! 2. Splice data in front of the read position (`prepend_*`).
//! 3. Take data back when the parser backtracks (`undo_consume_*`).
//! 4. Pause cleanly when a source has no data *right now*
//!    ([`InputResult::Eod`]).
//!
//! Ungotten and prepended content queues in [`RunBuf`]s ahead of the
//! underlying source; reads always drain the queue head before
//! consulting the source. The source itself is a sum over kinds —
//! memory buffer, reader, pattern template, constructor template,
//! accumulator — dispatched by `match`.
//!
//! Reads return a window directly into the stream's storage (no copy);
//! [`Stream::get_data`] exists for the scanner's contiguous-block case.

use crate::runbuf::{RUNBUF_SIZE, RunBuf, RunBufKind};
use std::collections::VecDeque;
use std::io::Read;
use weft_core::runtime::{Template, TemplateItem};
use weft_core::{LelId, Location, TreeId};

/// Codes a reader hands the scanner. The values are part of the wire
/// contract with the parser driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum InputResult {
    /// Bytes are available.
    Data = 1,
    /// Nothing right now; more may arrive later (accumulators).
    Eod = 2,
    /// The source just ran out; sent once.
    Eof = 3,
    /// Hard end; everything after the EOF notice.
    Eos = 4,
    /// A named language element is next (template sources).
    LangEl = 5,
    /// A pre-built tree is next.
    Tree = 6,
    /// A pre-built ignore tree is next.
    Ignore = 7,
}

/// A read window: the result code and, for [`InputResult::Data`], bytes
/// directly out of the stream's storage.
#[derive(Debug)]
pub struct ParseBlock<'a> {
    pub result: InputResult,
    pub data: &'a [u8],
}

/// The underlying source of a stream, behind the runbuf queue.
pub enum SourceKind {
    /// A memory buffer served in place.
    Text { data: Box<[u8]>, offset: usize },
    /// An OS-backed reader (file, fd, socket); filled into fresh
    /// runbufs on demand.
    Reader { reader: Box<dyn Read> },
    /// A compiled pattern template.
    Pattern {
        items: Template,
        item: usize,
        data_offset: usize,
    },
    /// A compiled constructor template.
    Cons {
        items: Template,
        item: usize,
        data_offset: usize,
    },
    /// Append-only; everything arrives through `append_*` and the queue
    /// IS the source. Runs dry with [`InputResult::Eod`] until EOF is
    /// latched.
    Accum,
}

impl std::fmt::Debug for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text { data, offset } => f
                .debug_struct("Text")
                .field("len", &data.len())
                .field("offset", offset)
                .finish(),
            Self::Reader { .. } => f.debug_struct("Reader").finish_non_exhaustive(),
            Self::Pattern { item, data_offset, .. } => f
                .debug_struct("Pattern")
                .field("item", item)
                .field("data_offset", data_offset)
                .finish(),
            Self::Cons { item, data_offset, .. } => f
                .debug_struct("Cons")
                .field("item", item)
                .field("data_offset", data_offset)
                .finish(),
            Self::Accum => f.debug_struct("Accum").finish(),
        }
    }
}

/// Where a read position falls, computed without holding borrows so the
/// dispatch can hand out a window afterwards.
#[derive(Debug, Clone, Copy)]
enum Scan {
    Queue { index: usize, skip: usize },
    QueueTree,
    QueueIgnore,
    Nested { index: usize, skip: usize },
    Text { skip: usize },
    TemplateText { item: usize, offset: usize },
    LangEl,
    NeedPull,
    Eod,
    End,
}

/// Newline accounting for position tracking.
#[derive(Debug, Clone, Copy)]
struct LineStats {
    newlines: usize,
    /// Bytes after the last newline.
    tail: usize,
}

fn line_stats(data: &[u8]) -> LineStats {
    let mut newlines = 0;
    let mut tail = 0;
    for &b in data {
        if b == b'\n' {
            newlines += 1;
            tail = 0;
        } else {
            tail += 1;
        }
    }
    LineStats { newlines, tail }
}

/// A backtrackable input source.
#[derive(Debug)]
pub struct Stream {
    /// Prepended and ungotten content; always drained before `kind`.
    queue: VecDeque<Box<RunBuf>>,
    kind: SourceKind,
    line: u64,
    column: u64,
    byte: u64,
    eof: bool,
    eof_sent: bool,
    eos_sent: bool,
}

impl Stream {
    fn with_kind(kind: SourceKind) -> Self {
        Self {
            queue: VecDeque::new(),
            kind,
            line: 1,
            column: 1,
            byte: 0,
            eof: false,
            eof_sent: false,
            eos_sent: false,
        }
    }

    /// A memory-backed stream.
    #[must_use]
    pub fn from_text(data: impl Into<Box<[u8]>>) -> Self {
        Self::with_kind(SourceKind::Text {
            data: data.into(),
            offset: 0,
        })
    }

    /// A stream over any reader: an opened file, a dup'ed fd, a pipe.
    #[must_use]
    pub fn from_reader(reader: Box<dyn Read>) -> Self {
        Self::with_kind(SourceKind::Reader { reader })
    }

    /// A stream walking a pattern template.
    #[must_use]
    pub fn from_pattern(items: Template) -> Self {
        Self::with_kind(SourceKind::Pattern {
            items,
            item: 0,
            data_offset: 0,
        })
    }

    /// A stream walking a constructor template.
    #[must_use]
    pub fn from_cons(items: Template) -> Self {
        Self::with_kind(SourceKind::Cons {
            items,
            item: 0,
            data_offset: 0,
        })
    }

    /// An accumulator: data arrives through `append_*` only.
    #[must_use]
    pub fn accum() -> Self {
        Self::with_kind(SourceKind::Accum)
    }

    /// Current read position, for stamping token locations.
    #[must_use]
    pub fn position(&self) -> Location {
        Location {
            line: self.line,
            column: self.column,
            byte: self.byte,
        }
    }

    // -- scanning ---------------------------------------------------------

    fn scan(&self, mut skip: usize) -> Scan {
        for (index, buf) in self.queue.iter().enumerate() {
            match buf.kind {
                RunBufKind::Data => {
                    let avail = buf.avail();
                    if skip < avail {
                        return Scan::Queue { index, skip };
                    }
                    skip -= avail;
                }
                RunBufKind::Token => return Scan::QueueTree,
                RunBufKind::Ignore => return Scan::QueueIgnore,
                RunBufKind::Source => return Scan::Nested { index, skip },
            }
        }
        match &self.kind {
            SourceKind::Text { data, offset } => {
                if offset + skip < data.len() {
                    Scan::Text { skip }
                } else {
                    Scan::End
                }
            }
            SourceKind::Reader { .. } => {
                if self.eof {
                    Scan::End
                } else {
                    Scan::NeedPull
                }
            }
            SourceKind::Pattern {
                items,
                item,
                data_offset,
            }
            | SourceKind::Cons {
                items,
                item,
                data_offset,
            } => {
                let mut index = *item;
                let mut offset = *data_offset;
                while let Some(entry) = items.get(index) {
                    match entry {
                        TemplateItem::Text(text) => {
                            let avail = text.len() - offset;
                            if skip < avail {
                                return Scan::TemplateText {
                                    item: index,
                                    offset: offset + skip,
                                };
                            }
                            skip -= avail;
                            index += 1;
                            offset = 0;
                        }
                        TemplateItem::Factor { .. } => return Scan::LangEl,
                    }
                }
                Scan::End
            }
            SourceKind::Accum => {
                if self.eof {
                    Scan::End
                } else {
                    Scan::Eod
                }
            }
        }
    }

    /// Pull one buffer from a reader source onto the queue tail. Always
    /// either enqueues data or latches EOF, so a rescan makes progress.
    fn pull_source(&mut self) {
        let SourceKind::Reader { reader } = &mut self.kind else {
            self.eof = true;
            return;
        };
        let mut buf = RunBuf::new();
        match reader.read(&mut buf.data) {
            Ok(0) => self.eof = true,
            Ok(n) => {
                buf.length = n;
                self.queue.push_back(buf);
            }
            Err(e) => {
                log::error!("read error on input stream: {e}");
                self.eof = true;
            }
        }
    }

    /// End-of-source code with the send-once latch: the first exhaustion
    /// reports [`InputResult::Eof`], every later one
    /// [`InputResult::Eos`].
    fn end_code(&mut self) -> InputResult {
        if self.eof_sent {
            self.eos_sent = true;
            InputResult::Eos
        } else {
            self.eof_sent = true;
            InputResult::Eof
        }
    }

    /// The scanner's read: a window past `skip` bytes, or the code that
    /// says why there is none. The window points into the stream's own
    /// storage.
    pub fn get_parse_block(&mut self, skip: usize) -> ParseBlock<'_> {
        let decision = loop {
            match self.scan(skip) {
                Scan::NeedPull => self.pull_source(),
                other => break other,
            }
        };

        match decision {
            Scan::Queue { index, skip } => {
                let buf = &self.queue[index];
                let start = buf.offset + skip;
                ParseBlock {
                    result: InputResult::Data,
                    data: &buf.data[start..buf.length],
                }
            }
            Scan::QueueTree => ParseBlock {
                result: InputResult::Tree,
                data: &[],
            },
            Scan::QueueIgnore => ParseBlock {
                result: InputResult::Ignore,
                data: &[],
            },
            Scan::Nested { index, skip } => self.queue[index]
                .stream
                .as_mut()
                .expect("source runbuf without stream")
                .get_parse_block(skip),
            Scan::Text { skip } => {
                let SourceKind::Text { data, offset } = &self.kind else {
                    unreachable!("scan returned Text for a non-text source");
                };
                ParseBlock {
                    result: InputResult::Data,
                    data: &data[*offset + skip..],
                }
            }
            Scan::TemplateText { item, offset } => {
                let (SourceKind::Pattern { items, .. } | SourceKind::Cons { items, .. }) =
                    &self.kind
                else {
                    unreachable!("scan returned TemplateText for a non-template source");
                };
                let TemplateItem::Text(text) = &items[item] else {
                    unreachable!("template text scan landed on a factor");
                };
                ParseBlock {
                    result: InputResult::Data,
                    data: &text[offset..],
                }
            }
            Scan::LangEl => ParseBlock {
                result: InputResult::LangEl,
                data: &[],
            },
            Scan::Eod => ParseBlock {
                result: InputResult::Eod,
                data: &[],
            },
            Scan::End => ParseBlock {
                result: self.end_code(),
                data: &[],
            },
            Scan::NeedPull => unreachable!("pull loop exited on NeedPull"),
        }
    }

    /// Copy up to `dest.len()` bytes starting `offset` past the read
    /// position, without consuming. Returns the number copied.
    pub fn get_data(&mut self, offset: usize, dest: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < dest.len() {
            match self.scan(offset + copied) {
                Scan::Queue { index, skip } => {
                    let buf = &self.queue[index];
                    let start = buf.offset + skip;
                    let n = (buf.length - start).min(dest.len() - copied);
                    dest[copied..copied + n].copy_from_slice(&buf.data[start..start + n]);
                    copied += n;
                }
                Scan::Text { skip } => {
                    let SourceKind::Text { data, offset: src } = &self.kind else {
                        unreachable!("scan returned Text for a non-text source");
                    };
                    let start = *src + skip;
                    let n = (data.len() - start).min(dest.len() - copied);
                    dest[copied..copied + n].copy_from_slice(&data[start..start + n]);
                    copied += n;
                }
                Scan::TemplateText { item, offset: start } => {
                    let (SourceKind::Pattern { items, .. } | SourceKind::Cons { items, .. }) =
                        &self.kind
                    else {
                        unreachable!("scan returned TemplateText for a non-template source");
                    };
                    let TemplateItem::Text(text) = &items[item] else {
                        unreachable!("template text scan landed on a factor");
                    };
                    let n = (text.len() - start).min(dest.len() - copied);
                    dest[copied..copied + n].copy_from_slice(&text[start..start + n]);
                    copied += n;
                }
                Scan::Nested { index, skip } => {
                    let n = self.queue[index]
                        .stream
                        .as_mut()
                        .expect("source runbuf without stream")
                        .get_data(skip, &mut dest[copied..]);
                    if n == 0 {
                        break;
                    }
                    copied += n;
                }
                Scan::NeedPull => self.pull_source(),
                _ => break,
            }
        }
        copied
    }

    // -- consuming --------------------------------------------------------

    fn advance_position(&mut self, take: usize, stats: LineStats) {
        self.byte += take as u64;
        if stats.newlines > 0 {
            self.line += stats.newlines as u64;
            self.column = stats.tail as u64 + 1;
        } else {
            self.column += take as u64;
        }
    }

    /// Advance by exactly `length` byte positions where possible; stops
    /// early at a tree boundary or a dry source. Returns the advance.
    pub fn consume_data(&mut self, length: usize) -> usize {
        let mut consumed = 0;
        while consumed < length {
            let want = length - consumed;
            // one step: either from the queue head or from the source
            let step = if let Some(buf) = self.queue.front_mut() {
                match buf.kind {
                    RunBufKind::Data => {
                        if buf.avail() == 0 {
                            self.queue.pop_front();
                            continue;
                        }
                        let take = buf.avail().min(want);
                        let stats = line_stats(&buf.data[buf.offset..buf.offset + take]);
                        buf.offset += take;
                        let drained = buf.avail() == 0;
                        if drained {
                            self.queue.pop_front();
                        }
                        Some((take, Some(stats)))
                    }
                    RunBufKind::Source => {
                        let nested = buf.stream.as_mut().expect("source runbuf without stream");
                        let n = nested.consume_data(want);
                        if n == 0 {
                            None
                        } else {
                            // nested streams track their own positions
                            Some((n, None))
                        }
                    }
                    RunBufKind::Token | RunBufKind::Ignore => None,
                }
            } else if matches!(self.kind, SourceKind::Reader { .. }) {
                self.pull_source();
                if self.queue.is_empty() {
                    None
                } else {
                    continue;
                }
            } else {
                match &mut self.kind {
                    SourceKind::Text { data, offset } => {
                        let avail = data.len() - *offset;
                        if avail == 0 {
                            None
                        } else {
                            let take = avail.min(want);
                            let stats = line_stats(&data[*offset..*offset + take]);
                            *offset += take;
                            Some((take, Some(stats)))
                        }
                    }
                    SourceKind::Reader { .. } => unreachable!("reader handled above"),
                    SourceKind::Pattern {
                        items,
                        item,
                        data_offset,
                    }
                    | SourceKind::Cons {
                        items,
                        item,
                        data_offset,
                    } => match items.get(*item) {
                        Some(TemplateItem::Text(text)) => {
                            let avail = text.len() - *data_offset;
                            if avail == 0 {
                                *item += 1;
                                *data_offset = 0;
                                continue;
                            }
                            let take = avail.min(want);
                            let stats =
                                line_stats(&text[*data_offset..*data_offset + take]);
                            *data_offset += take;
                            if *data_offset == text.len() {
                                *item += 1;
                                *data_offset = 0;
                            }
                            Some((take, Some(stats)))
                        }
                        _ => None,
                    },
                    SourceKind::Accum => None,
                }
            };

            match step {
                Some((take, stats)) => {
                    if let Some(stats) = stats {
                        self.advance_position(take, stats);
                    }
                    consumed += take;
                }
                None => break,
            }
        }
        consumed
    }

    /// Push consumed bytes back so the next read re-yields them. The
    /// caller supplies the exact bytes it took; position counters
    /// rewind accordingly (column is re-derived at the next newline
    /// when the undo spans one).
    pub fn undo_consume_data(&mut self, data: &[u8]) -> usize {
        let length = data.len();
        let stats = line_stats(data);
        self.byte = self.byte.saturating_sub(length as u64);
        if stats.newlines > 0 {
            self.line -= stats.newlines as u64;
            self.column = 1;
        } else {
            self.column = self.column.saturating_sub(length as u64);
        }
        self.eof_sent = false;
        self.eos_sent = false;

        // Fast path: rewind in place when the bytes are still where they
        // were read from.
        if let Some(front) = self.queue.front_mut() {
            if front.kind == RunBufKind::Data && front.offset >= length {
                front.offset -= length;
                debug_assert_eq!(
                    &front.data[front.offset..front.offset + length],
                    data,
                    "undo does not match the consumed bytes"
                );
                return length;
            }
        } else if let SourceKind::Text { data: src, offset } = &mut self.kind {
            if *offset >= length {
                *offset -= length;
                debug_assert_eq!(
                    &src[*offset..*offset + length],
                    data,
                    "undo does not match the consumed bytes"
                );
                return length;
            }
        }

        self.prepend_data(data);
        length
    }

    // -- trees and language elements --------------------------------------

    /// Take the pre-built tree at the head of the queue, if one is next.
    pub fn consume_tree(&mut self) -> Option<TreeId> {
        match self.queue.front() {
            Some(buf) if matches!(buf.kind, RunBufKind::Token | RunBufKind::Ignore) => {
                let buf = self.queue.pop_front().expect("front checked above");
                buf.tree
            }
            _ => None,
        }
    }

    /// Put a consumed tree back in front.
    pub fn undo_consume_tree(&mut self, tree: TreeId, ignore: bool) {
        self.queue.push_front(RunBuf::from_tree(tree, ignore));
        self.eof_sent = false;
        self.eos_sent = false;
    }

    /// Take the language element a template source is positioned at.
    pub fn consume_lang_el(&mut self) -> Option<(LelId, u32)> {
        let (SourceKind::Pattern {
            items,
            item,
            data_offset,
        }
        | SourceKind::Cons {
            items,
            item,
            data_offset,
        }) = &mut self.kind
        else {
            return None;
        };
        match items.get(*item) {
            Some(TemplateItem::Factor { id, bind_id }) => {
                let result = (*id, *bind_id);
                *item += 1;
                *data_offset = 0;
                Some(result)
            }
            _ => None,
        }
    }

    /// Step the template cursor back over the last consumed language
    /// element.
    pub fn undo_consume_lang_el(&mut self) {
        let (SourceKind::Pattern {
            items,
            item,
            data_offset,
        }
        | SourceKind::Cons {
            items,
            item,
            data_offset,
        }) = &mut self.kind
        else {
            panic!("language element undo on a non-template stream");
        };
        assert!(*item > 0, "language element undo at template start");
        *item -= 1;
        *data_offset = 0;
        assert!(
            matches!(items[*item], TemplateItem::Factor { .. }),
            "language element undo over a text item"
        );
    }

    // -- prepending -------------------------------------------------------

    /// Splice bytes in front of the read position. The next reads yield
    /// them before anything queued or sourced.
    pub fn prepend_data(&mut self, data: &[u8]) {
        for chunk in data.chunks(RUNBUF_SIZE).rev() {
            self.queue.push_front(RunBuf::from_bytes(chunk));
        }
    }

    /// Drop up to `length` prepended bytes from the front. Returns the
    /// number dropped.
    pub fn undo_prepend_data(&mut self, length: usize) -> usize {
        let mut dropped = 0;
        while dropped < length {
            let Some(buf) = self.queue.front_mut() else {
                break;
            };
            if buf.kind != RunBufKind::Data {
                break;
            }
            let take = buf.avail().min(length - dropped);
            buf.offset += take;
            dropped += take;
            if buf.avail() == 0 {
                self.queue.pop_front();
            }
        }
        dropped
    }

    /// Splice a pre-built tree in front of the read position.
    pub fn prepend_tree(&mut self, tree: TreeId, ignore: bool) {
        self.queue.push_front(RunBuf::from_tree(tree, ignore));
    }

    pub fn undo_prepend_tree(&mut self) -> Option<TreeId> {
        match self.queue.front() {
            Some(buf) if matches!(buf.kind, RunBufKind::Token | RunBufKind::Ignore) => {
                self.queue.pop_front().expect("front checked above").tree
            }
            _ => None,
        }
    }

    /// Splice a whole stream in front of the read position.
    pub fn prepend_stream(&mut self, stream: Stream) {
        self.queue.push_front(RunBuf::from_stream(stream));
    }

    pub fn undo_prepend_stream(&mut self) -> Option<Stream> {
        match self.queue.front() {
            Some(buf) if buf.kind == RunBufKind::Source => {
                let buf = self.queue.pop_front().expect("front checked above");
                buf.stream.map(|s| *s)
            }
            _ => None,
        }
    }

    // -- appending --------------------------------------------------------

    /// Enqueue bytes at the tail, after everything already queued.
    pub fn append_data(&mut self, data: &[u8]) {
        for chunk in data.chunks(RUNBUF_SIZE) {
            self.queue.push_back(RunBuf::from_bytes(chunk));
        }
    }

    /// Drop up to `length` unread bytes from the tail. Returns the
    /// number dropped.
    pub fn undo_append_data(&mut self, length: usize) -> usize {
        let mut dropped = 0;
        while dropped < length {
            let Some(buf) = self.queue.back_mut() else {
                break;
            };
            if buf.kind != RunBufKind::Data {
                break;
            }
            let take = buf.avail().min(length - dropped);
            buf.length -= take;
            dropped += take;
            if buf.avail() == 0 {
                self.queue.pop_back();
            }
        }
        dropped
    }

    pub fn append_tree(&mut self, tree: TreeId, ignore: bool) {
        self.queue.push_back(RunBuf::from_tree(tree, ignore));
    }

    pub fn undo_append_tree(&mut self) -> Option<TreeId> {
        match self.queue.back() {
            Some(buf) if matches!(buf.kind, RunBufKind::Token | RunBufKind::Ignore) => {
                self.queue.pop_back().expect("back checked above").tree
            }
            _ => None,
        }
    }

    pub fn append_stream(&mut self, stream: Stream) {
        self.queue.push_back(RunBuf::from_stream(stream));
    }

    pub fn undo_append_stream(&mut self) -> Option<Stream> {
        match self.queue.back() {
            Some(buf) if buf.kind == RunBufKind::Source => {
                let buf = self.queue.pop_back().expect("back checked above");
                buf.stream.map(|s| *s)
            }
            _ => None,
        }
    }

    // -- EOF latch --------------------------------------------------------

    pub fn set_eof(&mut self) {
        self.eof = true;
    }

    pub fn unset_eof(&mut self) {
        self.eof = false;
        self.eof_sent = false;
        self.eos_sent = false;
    }

    // -- cleanup ----------------------------------------------------------

    /// Drain every queued tree so the owner can release its references
    /// before dropping the stream. Nested streams are drained too.
    pub fn take_queued_trees(&mut self) -> Vec<TreeId> {
        let mut trees = Vec::new();
        for buf in &mut self.queue {
            if let Some(tree) = buf.tree.take() {
                trees.push(tree);
            }
            if let Some(nested) = buf.stream.as_mut() {
                trees.extend(nested.take_queued_trees());
            }
        }
        trees
    }

    /// Queued buffer count; backtracking tests peek at this.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}
