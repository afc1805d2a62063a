//! Minimal PE32+ writer for images that carry RCDATA resources.
//!
//! The output is a headers-plus-`.rsrc` image in file layout: no code, no
//! imports, no relocations. It is enough for resource lookup and for any
//! independent PE reader to walk the resource tree.

use crate::formats::pe::types::*;
use crate::formats::pe::utils::align_up;

const E_LFANEW: u32 = 0x40;
const OPTIONAL_HEADER_SIZE: u16 = 112 + (IMAGE_NUMBEROF_DIRECTORY_ENTRIES as u16) * 8;
const FILE_ALIGNMENT: u32 = 0x200;
const SECTION_ALIGNMENT: u32 = 0x1000;
const RSRC_RVA: u32 = SECTION_ALIGNMENT;
const IMAGE_BASE: u64 = 0x1_4000_0000;
const LANG_NEUTRAL: u32 = 0;

#[derive(Debug, Clone)]
enum EntryName {
    Id(u16),
    Name(String),
}

/// Builds an image with one `.rsrc` section holding RCDATA entries
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    machine: Machine,
    entries: Vec<(EntryName, Vec<u8>)>,
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self {
            machine: Machine::X86_64,
            entries: Vec::new(),
        }
    }

    pub fn machine(mut self, machine: Machine) -> Self {
        self.machine = machine;
        self
    }

    /// Add an RCDATA resource with an integer ID
    pub fn rcdata_id(mut self, id: u16, bytes: impl Into<Vec<u8>>) -> Self {
        self.entries.push((EntryName::Id(id), bytes.into()));
        self
    }

    /// Add an RCDATA resource with a string name (stored upper-cased)
    pub fn rcdata_named(mut self, name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.entries
            .push((EntryName::Name(name.to_ascii_uppercase()), bytes.into()));
        self
    }

    /// Serialize the image
    pub fn build(&self) -> Vec<u8> {
        let rsrc = if self.entries.is_empty() {
            None
        } else {
            Some(self.resource_section())
        };
        let number_of_sections: u16 = if rsrc.is_some() { 1 } else { 0 };

        let section_table = E_LFANEW as usize + 24 + OPTIONAL_HEADER_SIZE as usize;
        let size_of_headers = align_up(
            (section_table + 40 * number_of_sections as usize) as u32,
            FILE_ALIGNMENT,
        );
        let rsrc_len = rsrc.as_ref().map_or(0, |s| s.len() as u32);
        let raw_size = align_up(rsrc_len, FILE_ALIGNMENT);
        let size_of_image = align_up(RSRC_RVA + rsrc_len, SECTION_ALIGNMENT);

        let mut out = vec![0u8; (size_of_headers + raw_size) as usize];

        // DOS header
        put16(&mut out, 0, DOS_SIGNATURE);
        put32(&mut out, 60, E_LFANEW);

        // NT headers
        let nt = E_LFANEW as usize;
        out[nt..nt + 4].copy_from_slice(&PE_SIGNATURE);
        let coff = nt + 4;
        put16(&mut out, coff, self.machine.into());
        put16(&mut out, coff + 2, number_of_sections);
        put16(&mut out, coff + 16, OPTIONAL_HEADER_SIZE);
        put16(&mut out, coff + 18, 0x0022); // EXECUTABLE_IMAGE | LARGE_ADDRESS_AWARE

        let opt = coff + 20;
        put16(&mut out, opt, PE32PLUS_MAGIC);
        put64(&mut out, opt + 24, IMAGE_BASE);
        put32(&mut out, opt + 32, SECTION_ALIGNMENT);
        put32(&mut out, opt + 36, FILE_ALIGNMENT);
        put16(&mut out, opt + 40, 6); // MajorOperatingSystemVersion
        put16(&mut out, opt + 48, 6); // MajorSubsystemVersion
        put32(&mut out, opt + 56, size_of_image);
        put32(&mut out, opt + 60, size_of_headers);
        put16(&mut out, opt + 68, 3); // IMAGE_SUBSYSTEM_WINDOWS_CUI
        put32(&mut out, opt + 108, IMAGE_NUMBEROF_DIRECTORY_ENTRIES as u32);

        if let Some(rsrc) = rsrc {
            let dir = opt + 112 + IMAGE_DIRECTORY_ENTRY_RESOURCE * 8;
            put32(&mut out, dir, RSRC_RVA);
            put32(&mut out, dir + 4, rsrc.len() as u32);

            let sh = section_table;
            out[sh..sh + 5].copy_from_slice(b".rsrc");
            put32(&mut out, sh + 8, rsrc.len() as u32);
            put32(&mut out, sh + 12, RSRC_RVA);
            put32(&mut out, sh + 16, raw_size);
            put32(&mut out, sh + 20, size_of_headers);
            put32(&mut out, sh + 36, IMAGE_SCN_CNT_INITIALIZED_DATA | IMAGE_SCN_MEM_READ);

            let start = size_of_headers as usize;
            out[start..start + rsrc.len()].copy_from_slice(&rsrc);
        }

        out
    }

    /// Lay out root, RCDATA name table, language tables, data entries,
    /// name strings and finally the payload bytes.
    fn resource_section(&self) -> Vec<u8> {
        // Named entries first, each group sorted, as the loader expects
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        order.sort_by(|&a, &b| match (&self.entries[a].0, &self.entries[b].0) {
            (EntryName::Name(x), EntryName::Name(y)) => x.cmp(y),
            (EntryName::Name(_), EntryName::Id(_)) => std::cmp::Ordering::Less,
            (EntryName::Id(_), EntryName::Name(_)) => std::cmp::Ordering::Greater,
            (EntryName::Id(x), EntryName::Id(y)) => x.cmp(y),
        });
        let named = order
            .iter()
            .filter(|&&i| matches!(self.entries[i].0, EntryName::Name(_)))
            .count();
        let n = order.len();

        let root = 0usize;
        let names_table = root + 16 + 8;
        let lang_tables = names_table + 16 + 8 * n;
        let data_entries = lang_tables + 24 * n;
        let mut cursor = data_entries + 16 * n;

        let mut string_offsets = vec![0usize; n];
        for (slot, &i) in order.iter().enumerate() {
            if let EntryName::Name(name) = &self.entries[i].0 {
                string_offsets[slot] = cursor;
                cursor += 2 + 2 * name.encode_utf16().count();
            }
        }

        let mut blob_offsets = vec![0usize; n];
        for (slot, &i) in order.iter().enumerate() {
            cursor = align_up(cursor as u32, 8) as usize;
            blob_offsets[slot] = cursor;
            cursor += self.entries[i].1.len();
        }

        let mut out = vec![0u8; cursor];

        // Root: a single ID entry for RT_RCDATA
        put16(&mut out, root + 14, 1);
        put32(&mut out, root + 16, RT_RCDATA as u32);
        put32(&mut out, root + 20, 0x8000_0000 | names_table as u32);

        put16(&mut out, names_table + 12, named as u16);
        put16(&mut out, names_table + 14, (n - named) as u16);

        for (slot, &i) in order.iter().enumerate() {
            let (name, bytes) = &self.entries[i];

            let entry = names_table + 16 + slot * 8;
            match name {
                EntryName::Id(id) => put32(&mut out, entry, *id as u32),
                EntryName::Name(s) => {
                    let at = string_offsets[slot];
                    put32(&mut out, entry, 0x8000_0000 | at as u32);
                    let units: Vec<u16> = s.encode_utf16().collect();
                    put16(&mut out, at, units.len() as u16);
                    for (k, unit) in units.iter().enumerate() {
                        put16(&mut out, at + 2 + k * 2, *unit);
                    }
                }
            }
            let lang = lang_tables + slot * 24;
            put32(&mut out, entry + 4, 0x8000_0000 | lang as u32);

            let data = data_entries + slot * 16;
            put16(&mut out, lang + 14, 1);
            put32(&mut out, lang + 16, LANG_NEUTRAL);
            put32(&mut out, lang + 20, data as u32);

            let blob = blob_offsets[slot];
            put32(&mut out, data, RSRC_RVA + blob as u32);
            put32(&mut out, data + 4, bytes.len() as u32);
            out[blob..blob + bytes.len()].copy_from_slice(bytes);
        }

        out
    }
}

fn put16(out: &mut [u8], at: usize, v: u16) {
    out[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put32(out: &mut [u8], at: usize, v: u32) {
    out[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

fn put64(out: &mut [u8], at: usize, v: u64) {
    out[at..at + 8].copy_from_slice(&v.to_le_bytes());
}
