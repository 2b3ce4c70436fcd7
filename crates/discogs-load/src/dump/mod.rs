//! Discogs dump decoding
//!
//! A dump is one container element (`<artists>`, `<releases>`, ...) holding
//! any number of same-kind record elements. [`DumpReader`] pulls one record
//! at a time off a buffered byte stream; memory use is bounded by the
//! largest single record, never by the file.
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//! use discogs_load::dump::read_labels;
//!
//! let input = BufReader::new(File::open("discogs_labels.xml")?);
//! for label in read_labels(input) {
//!     let label = label?;
//!     println!("{} {:?}", label.id, label.name);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cursor;
pub mod error;
pub mod models;
pub mod parser;

use std::fmt;
use std::io::BufRead;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::str::FromStr;

use self::cursor::{Element, XmlCursor};
pub use self::error::{DecodeError, Result};
pub use self::models::*;
pub use self::parser::DumpRecord;

/// The four dump kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Artist,
    Release,
    Master,
    Label,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Artist,
        EntityKind::Release,
        EntityKind::Master,
        EntityKind::Label,
    ];

    /// Name of the dump's top-level element
    pub fn container_element(self) -> &'static str {
        match self {
            EntityKind::Artist => "artists",
            EntityKind::Release => "releases",
            EntityKind::Master => "masters",
            EntityKind::Label => "labels",
        }
    }

    /// Name of each record element inside the container
    pub fn record_element(self) -> &'static str {
        match self {
            EntityKind::Artist => "artist",
            EntityKind::Release => "release",
            EntityKind::Master => "master",
            EntityKind::Label => "label",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.container_element())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "artists" | "artist" => Ok(EntityKind::Artist),
            "releases" | "release" => Ok(EntityKind::Release),
            "masters" | "master" => Ok(EntityKind::Master),
            "labels" | "label" => Ok(EntityKind::Label),
            other => Err(format!(
                "unknown entity kind '{}', expected one of: artists, releases, masters, labels",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    /// Container element not read yet
    Pending,
    Streaming,
    /// Clean end or aborted; yields nothing further
    Finished,
}

/// Lazy, forward-only sequence of records of one kind
///
/// After the container closes, or after the first error, every further call
/// to `next` returns `None`. The reader cannot be rewound; reopen the stream
/// to read it again.
pub struct DumpReader<R, T> {
    cursor: XmlCursor<R>,
    container: Option<Element>,
    state: ReaderState,
    records: u64,
    _record: PhantomData<fn() -> T>,
}

impl<R: BufRead, T: DumpRecord> DumpReader<R, T> {
    pub fn new(input: R) -> Self {
        Self {
            cursor: XmlCursor::new(input),
            container: None,
            state: ReaderState::Pending,
            records: 0,
            _record: PhantomData,
        }
    }

    pub fn kind(&self) -> EntityKind {
        T::KIND
    }

    /// Records yielded so far
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Bytes of decompressed input consumed so far
    pub fn offset(&self) -> u64 {
        self.cursor.offset()
    }

    fn advance(&mut self) -> Result<Option<T>> {
        if self.state == ReaderState::Pending {
            let expected = T::KIND.container_element();
            let root = self.cursor.root(expected)?;
            if root.name != expected {
                return Err(DecodeError::UnexpectedElement {
                    expected: expected.to_string(),
                    found: root.name,
                    offset: root.offset,
                });
            }
            self.container = Some(root);
            self.state = ReaderState::Streaming;
        }

        let Some(container) = self.container.as_ref() else {
            return Ok(None);
        };

        let Some(element) = self.cursor.next_child(container)? else {
            return Ok(None);
        };

        let expected = T::KIND.record_element();
        if element.name != expected {
            return Err(DecodeError::UnexpectedElement {
                expected: expected.to_string(),
                found: element.name,
                offset: element.offset,
            });
        }

        let record = T::decode(&mut self.cursor, &element)?;
        self.records += 1;
        Ok(Some(record))
    }
}

impl<R: BufRead, T: DumpRecord> Iterator for DumpReader<R, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == ReaderState::Finished {
            return None;
        }

        match self.advance() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.state = ReaderState::Finished;
                None
            },
            Err(e) => {
                self.state = ReaderState::Finished;
                Some(Err(e))
            },
        }
    }
}

impl<R: BufRead, T: DumpRecord> FusedIterator for DumpReader<R, T> {}

impl<R, T> fmt::Debug for DumpReader<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DumpReader")
            .field("state", &self.state)
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

pub fn read_artists<R: BufRead>(input: R) -> DumpReader<R, Artist> {
    DumpReader::new(input)
}

pub fn read_releases<R: BufRead>(input: R) -> DumpReader<R, Release> {
    DumpReader::new(input)
}

pub fn read_masters<R: BufRead>(input: R) -> DumpReader<R, Master> {
    DumpReader::new(input)
}

pub fn read_labels<R: BufRead>(input: R) -> DumpReader<R, Label> {
    DumpReader::new(input)
}
