use log::{debug, info, warn};

use super::codec::time::NotesTime;
use super::format::collection::{CollectionEntry, CollectionLookupPage, decode_page};
use super::format::search_key::{SearchKey, encode_search_keys};
use super::format::view_format::{ViewFormat, encode_view_format};
use super::iter::{EntryIterator, PageIterator};
use super::transport::{EntrySource, FormatSink, KeyLookup, KeyMatch, ReadRequest};
use super::types::error::Result;
use super::types::models::{ReadMask, TableVariant};

/// Largest page the engine hands out in one read.
pub const MAX_PAGE_SIZE: u32 = 0xFFFF;

/// Settings for scanning a collection page by page.
///
/// The default starts before the first entry (`"0"` skipping one) and reads
/// note ids only.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    pub read_mask: ReadMask,
    pub page_size: u32,
    pub start_position: String,
    pub skip_first: u32,
    pub summary_variant: TableVariant,
    pub diff_time: Option<NotesTime>,
    /// Stop after this many pages even if the engine has more.
    pub max_pages: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            read_mask: ReadMask::NOTE_ID,
            page_size: MAX_PAGE_SIZE,
            start_position: "0".to_string(),
            skip_first: 1,
            summary_variant: TableVariant::Standard,
            diff_time: None,
            max_pages: None,
        }
    }
}

impl ScanOptions {
    pub fn with_read_mask(mut self, read_mask: ReadMask) -> Self {
        self.read_mask = read_mask;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn starting_at(mut self, position: impl Into<String>, skip_first: u32) -> Self {
        self.start_position = position.into();
        self.skip_first = skip_first;
        self
    }

    pub fn with_summary_variant(mut self, variant: TableVariant) -> Self {
        self.summary_variant = variant;
        self
    }

    pub fn modified_since(mut self, diff_time: NotesTime) -> Self {
        self.diff_time = Some(diff_time);
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    pub(crate) fn first_request(&self) -> ReadRequest {
        ReadRequest {
            position: self.start_position.clone(),
            skip: self.skip_first,
            max_entries: self.page_size,
            read_mask: self.read_mask,
            diff_time: self.diff_time,
        }
    }
}

/// Reads collection pages from a transport and decodes them.
///
/// Every page is copied out of its transport buffer and the buffer is
/// released before the page is returned, so pages outlive the transport's
/// memory.
#[derive(Debug)]
pub struct CollectionReader<S> {
    source: S,
    options: ScanOptions,
}

impl<S> CollectionReader<S> {
    pub fn new(source: S, options: ScanOptions) -> Self {
        Self { source, options }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: EntrySource> CollectionReader<S> {
    /// Reads and decodes one page.
    ///
    /// The transport buffer is released whether or not decoding succeeds.
    ///
    /// # Errors
    /// Returns the transport's error, or a corruption error from the page decoder.
    pub fn read_page(&mut self, request: &ReadRequest) -> Result<CollectionLookupPage<'static>> {
        debug!(
            "Reading entries from '{}' (skip {}, max {})",
            request.position, request.skip, request.max_entries
        );
        let response = self.source.read_entries(request)?;
        let page = decode_page(
            response.buffer.as_slice(),
            request.read_mask,
            &response.info,
            self.options.summary_variant,
        )
        .map(CollectionLookupPage::into_owned);
        self.source.release(response.buffer);
        page
    }

    /// The request that continues after `page`, or `None` when the scan is complete.
    pub(crate) fn continuation(
        &self,
        request: &ReadRequest,
        page: &CollectionLookupPage<'_>,
    ) -> Option<ReadRequest> {
        if !page.has_more_to_do() {
            return None;
        }
        if page.is_empty() {
            warn!("Engine reported more entries but returned an empty page; stopping");
            return None;
        }
        let position = match (&page.cursor_position, page.last_position()) {
            (Some(position), _) => position.clone(),
            (None, Some(position)) => position.to_string(),
            (None, None) => {
                warn!("Cannot continue the scan: no cursor position and INDEX_POSITION was not requested");
                return None;
            }
        };
        Some(ReadRequest {
            position,
            skip: 1,
            ..request.clone()
        })
    }

    /// Iterates pages until the engine has no more entries or `max_pages` is reached.
    pub fn pages(&mut self) -> PageIterator<'_, S> {
        let first = self.options.first_request();
        PageIterator::new(self, first)
    }

    /// Iterates entries across all pages.
    pub fn entries(&mut self) -> EntryIterator<'_, S> {
        self.pages().into_entries()
    }
}

impl<S: EntrySource + KeyLookup> CollectionReader<S> {
    /// Finds the first entry matching `keys`.
    ///
    /// # Errors
    /// Returns an invalid-argument error for malformed keys, before the transport is called.
    pub fn lookup_by_key(&mut self, keys: &[Option<SearchKey>]) -> Result<Option<KeyMatch>> {
        let key_buffer = encode_search_keys(keys)?;
        let found = self.source.find_by_key(&key_buffer)?;
        match &found {
            Some(m) => info!("Key lookup matched {} entries at '{}'", m.match_count, m.position),
            None => info!("Key lookup found no match"),
        }
        Ok(found)
    }

    /// Reads every entry matching `keys`.
    pub fn read_by_key(&mut self, keys: &[Option<SearchKey>]) -> Result<Vec<CollectionEntry<'static>>> {
        let Some(found) = self.lookup_by_key(keys)? else {
            return Ok(Vec::new());
        };

        let wanted = found.match_count as usize;
        let mut request = ReadRequest {
            position: found.position,
            skip: 0,
            max_entries: found.match_count.min(self.options.page_size),
            read_mask: self.options.read_mask,
            diff_time: None,
        };
        let mut entries = Vec::with_capacity(wanted);
        loop {
            let page = self.read_page(&request)?;
            let next = self.continuation(&request, &page);
            entries.extend(page.entries);
            if entries.len() >= wanted {
                entries.truncate(wanted);
                break;
            }
            match next {
                Some(next) => request = next,
                None => break,
            }
        }
        Ok(entries)
    }
}

impl<S: FormatSink> CollectionReader<S> {
    /// Encodes `format` and hands it to the transport.
    pub fn save_view_format(&mut self, format: &ViewFormat) -> Result<()> {
        let buffer = encode_view_format(format)?;
        self.source.save_view_format(&buffer)
    }
}
