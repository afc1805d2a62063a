//! Resource directory lookup
//!
//! The resource tree has three fixed levels: type, name and language. Each
//! level is an `IMAGE_RESOURCE_DIRECTORY` followed by its entries, named
//! entries first. Offsets inside the tree are relative to the start of the
//! resource directory, not to the file.

use thiserror::Error;

use crate::formats::pe::types::*;
use crate::formats::pe::utils::{check_bounds, read_counted_utf16, u16_at, u32_at};

const DIRECTORY_HEADER_SIZE: usize = 16;
const DIRECTORY_ENTRY_SIZE: usize = 8;
const DATA_ENTRY_SIZE: usize = 16;
const HIGH_BIT: u32 = 0x8000_0000;

/// Key used to match an entry at the type or name level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKey<'a> {
    Id(u16),
    Name(&'a str),
}

impl ResourceKey<'_> {
    fn matches(&self, label: &EntryLabel) -> bool {
        match (self, label) {
            (ResourceKey::Id(want), EntryLabel::Id(have)) => want == have,
            // The resource compiler stores names upper-cased and lookups fold case
            (ResourceKey::Name(want), EntryLabel::Name(have)) => want.eq_ignore_ascii_case(have),
            _ => false,
        }
    }
}

/// Why a lookup did not produce a data entry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("image has no resource directory")]
    NoResourceDirectory,
    #[error("resource type not found")]
    TypeNotFound,
    #[error("resource name not found")]
    NameNotFound,
    #[error("resource language not found")]
    LangNotFound,
    #[error(transparent)]
    Malformed(#[from] PeError),
}

/// Leaf of the resource tree (`IMAGE_RESOURCE_DATA_ENTRY`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDataEntry {
    /// RVA of the resource bytes
    pub rva: u32,
    /// Size of the resource bytes
    pub size: u32,
    pub code_page: u32,
    /// Language ID the entry was found under
    pub language: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EntryLabel {
    Id(u16),
    Name(String),
}

#[derive(Debug, Clone, Copy)]
enum EntryTarget {
    Table(usize),
    Data(usize),
}

/// Resource directory view over the bytes of the section holding it
#[derive(Debug, Clone, Copy)]
pub struct ResourceDirectory<'data> {
    /// Bytes from the directory root to the end of its section's raw data
    data: &'data [u8],
    max_entries: usize,
}

impl<'data> ResourceDirectory<'data> {
    pub fn new(data: &'data [u8], options: &ParseOptions) -> Self {
        Self {
            data,
            max_entries: options.max_resource_entries,
        }
    }

    /// Find the data entry for `name` under resource type `kind`.
    ///
    /// The first language entry under the name is returned.
    pub fn find(
        &self,
        kind: ResourceKey<'_>,
        name: ResourceKey<'_>,
    ) -> std::result::Result<ResourceDataEntry, LookupError> {
        let types = self.subtable(0, kind)?.ok_or(LookupError::TypeNotFound)?;
        let langs = self.subtable(types, name)?.ok_or(LookupError::NameNotFound)?;

        let (label, target) = self
            .entries(langs)?
            .next()
            .transpose()?
            .ok_or(LookupError::LangNotFound)?;

        let language = match label {
            EntryLabel::Id(id) => id,
            EntryLabel::Name(_) => 0,
        };

        match target {
            EntryTarget::Data(offset) => Ok(self.data_entry(offset, language)?),
            EntryTarget::Table(_) => Err(PeError::MalformedResourceDirectory.into()),
        }
    }

    /// Locate the table an entry matching `key` points at
    fn subtable(
        &self,
        table: usize,
        key: ResourceKey<'_>,
    ) -> std::result::Result<Option<usize>, LookupError> {
        for entry in self.entries(table)? {
            let (label, target) = entry?;
            if key.matches(&label) {
                return match target {
                    EntryTarget::Table(offset) => Ok(Some(offset)),
                    EntryTarget::Data(_) => Err(PeError::MalformedResourceDirectory.into()),
                };
            }
        }
        Ok(None)
    }

    fn entries(
        &self,
        table: usize,
    ) -> Result<impl Iterator<Item = Result<(EntryLabel, EntryTarget)>> + '_> {
        check_bounds(table, DIRECTORY_HEADER_SIZE, self.data.len())
            .map_err(|_| PeError::MalformedResourceDirectory)?;

        let named = u16_at(self.data, table + 12)? as usize;
        let ids = u16_at(self.data, table + 14)? as usize;
        let count = named + ids;
        if count > self.max_entries {
            return Err(PeError::LimitExceeded("resource directory entries"));
        }

        let first = table + DIRECTORY_HEADER_SIZE;
        check_bounds(first, count * DIRECTORY_ENTRY_SIZE, self.data.len())
            .map_err(|_| PeError::MalformedResourceDirectory)?;

        Ok((0..count).map(move |i| self.entry(first + i * DIRECTORY_ENTRY_SIZE)))
    }

    fn entry(&self, offset: usize) -> Result<(EntryLabel, EntryTarget)> {
        let name = u32_at(self.data, offset)?;
        let target = u32_at(self.data, offset + 4)?;

        let label = if name & HIGH_BIT != 0 {
            let at = (name & !HIGH_BIT) as usize;
            EntryLabel::Name(read_counted_utf16(self.data, at)?)
        } else {
            EntryLabel::Id(name as u16)
        };

        let target = if target & HIGH_BIT != 0 {
            EntryTarget::Table((target & !HIGH_BIT) as usize)
        } else {
            EntryTarget::Data(target as usize)
        };

        Ok((label, target))
    }

    fn data_entry(&self, offset: usize, language: u16) -> Result<ResourceDataEntry> {
        check_bounds(offset, DATA_ENTRY_SIZE, self.data.len())
            .map_err(|_| PeError::MalformedResourceDirectory)?;

        Ok(ResourceDataEntry {
            rva: u32_at(self.data, offset)?,
            size: u32_at(self.data, offset + 4)?,
            code_page: u32_at(self.data, offset + 8)?,
            language,
        })
    }
}
