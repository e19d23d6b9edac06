//! Iterators for scanning a collection.
//!
//! 1. [`PageIterator`] - Yields decoded pages, continuing while the engine
//!    reports more entries
//! 2. [`EntryIterator`] - Flattens pages into individual entries
//!
//! # Example
//! ```no_run
//! # use nif_codec::{CollectionReader, ScanOptions, ReadMask};
//! # fn scan<S: nif_codec::EntrySource>(source: S) -> nif_codec::Result<()> {
//! let options = ScanOptions::default()
//!     .with_read_mask(ReadMask::NOTE_ID | ReadMask::INDEX_POSITION);
//! let mut reader = CollectionReader::new(source, options);
//! for entry in reader.entries() {
//!     println!("{:?}", entry?.note_id);
//! }
//! # Ok(())
//! # }
//! ```

use std::vec::IntoIter;

use super::format::collection::{CollectionEntry, CollectionLookupPage};
use super::reader::CollectionReader;
use super::transport::{EntrySource, ReadRequest};
use super::types::error::Result;

/// Iterator over decoded pages.
///
/// Stops after the first error, when the engine clears `MORE_TO_DO`, or when
/// the reader's `max_pages` is reached.
///
/// Created by [`CollectionReader::pages()`].
pub struct PageIterator<'a, S: EntrySource> {
    reader: &'a mut CollectionReader<S>,
    next_request: Option<ReadRequest>,
    pages_read: usize,
}

impl<'a, S: EntrySource> PageIterator<'a, S> {
    pub(super) fn new(reader: &'a mut CollectionReader<S>, first: ReadRequest) -> Self {
        Self {
            reader,
            next_request: Some(first),
            pages_read: 0,
        }
    }

    pub fn pages_read(&self) -> usize {
        self.pages_read
    }

    /// Transforms this iterator to yield entries instead of pages.
    pub fn into_entries(self) -> EntryIterator<'a, S> {
        EntryIterator {
            pages: self,
            current_entries: Vec::new().into_iter(),
        }
    }
}

impl<S: EntrySource> Iterator for PageIterator<'_, S> {
    type Item = Result<CollectionLookupPage<'static>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(max_pages) = self.reader.options().max_pages
            && self.pages_read >= max_pages
        {
            return None;
        }

        let request = self.next_request.take()?;
        match self.reader.read_page(&request) {
            Ok(page) => {
                self.pages_read += 1;
                self.next_request = self.reader.continuation(&request, &page);
                Some(Ok(page))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Iterator over individual entries across pages.
///
/// Created by [`CollectionReader::entries()`] or [`PageIterator::into_entries()`].
pub struct EntryIterator<'a, S: EntrySource> {
    pages: PageIterator<'a, S>,
    current_entries: IntoIter<CollectionEntry<'static>>,
}

impl<S: EntrySource> Iterator for EntryIterator<'_, S> {
    type Item = Result<CollectionEntry<'static>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.current_entries.next() {
                return Some(Ok(entry));
            }

            // Fetch the next page; an empty page simply loops again
            match self.pages.next()? {
                Ok(page) => self.current_entries = page.entries.into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
