//! Section management for PE files

use crate::formats::pe::types::*;
use crate::formats::pe::utils::u32_at;

/// Section table for efficient RVA resolution
#[derive(Debug, Clone, Default)]
pub struct SectionTable {
    sections: Vec<Section>,
}

impl SectionTable {
    /// Create a new section table
    pub fn new(sections: Vec<Section>) -> Self {
        // Sort by virtual address for binary search
        let mut sections = sections;
        sections.sort_by_key(|s| s.header.virtual_address);
        Self { sections }
    }

    /// Get all sections
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Find section containing RVA
    pub fn section_containing_rva(&self, rva: u32) -> Option<&Section> {
        self.sections.iter().find(|s| s.header.contains_rva(rva))
    }

    /// Convert RVA to file offset - O(log n) with binary search
    #[inline]
    pub fn rva_to_offset(&self, rva: u32) -> Option<usize> {
        let idx = self
            .sections
            .binary_search_by(|s| {
                let size = s.header.virtual_size.max(s.header.size_of_raw_data);
                if rva < s.header.virtual_address {
                    std::cmp::Ordering::Greater
                } else if rva >= s.header.virtual_address.saturating_add(size) {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .ok()?;

        let section = &self.sections[idx];
        let delta = rva - section.header.virtual_address;
        // Bytes past SizeOfRawData exist only in memory (zero fill), not in the file
        if delta >= section.header.size_of_raw_data {
            return None;
        }
        Some(section.header.pointer_to_raw_data as usize + delta as usize)
    }
}

/// Parse section headers
pub fn parse_section_headers(data: &[u8], offset: usize, count: u16) -> Result<Vec<SectionHeader>> {
    let mut sections = Vec::with_capacity(count as usize);

    for i in 0..count {
        let section_offset = offset + (i as usize * 40);
        if section_offset + 40 > data.len() {
            return Err(PeError::TruncatedHeader {
                expected: section_offset + 40,
                actual: data.len(),
            });
        }

        let mut name = [0u8; 8];
        name.copy_from_slice(&data[section_offset..section_offset + 8]);

        let header = SectionHeader {
            name,
            virtual_size: u32_at(data, section_offset + 8)?,
            virtual_address: u32_at(data, section_offset + 12)?,
            size_of_raw_data: u32_at(data, section_offset + 16)?,
            pointer_to_raw_data: u32_at(data, section_offset + 20)?,
            characteristics: u32_at(data, section_offset + 36)?,
        };

        sections.push(header);
    }

    Ok(sections)
}

/// Create section objects with data ranges
pub fn create_sections(headers: Vec<SectionHeader>) -> Vec<Section> {
    headers
        .into_iter()
        .map(|header| {
            let start = header.pointer_to_raw_data as usize;
            let end = start + header.size_of_raw_data as usize;
            Section {
                header,
                data: start..end,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_section(name: &str, va: u32, vsize: u32, raw: u32, rsize: u32) -> Section {
        let mut name_bytes = [0u8; 8];
        name_bytes[..name.len()].copy_from_slice(name.as_bytes());
        let header = SectionHeader {
            name: name_bytes,
            virtual_size: vsize,
            virtual_address: va,
            size_of_raw_data: rsize,
            pointer_to_raw_data: raw,
            characteristics: IMAGE_SCN_CNT_INITIALIZED_DATA | IMAGE_SCN_MEM_READ,
        };
        Section {
            data: raw as usize..(raw + rsize) as usize,
            header,
        }
    }

    #[test]
    fn test_section_table_rva_to_offset() {
        let table = SectionTable::new(vec![
            create_test_section(".rsrc", 0x3000, 0x800, 0x1000, 0x800),
            create_test_section(".text", 0x1000, 0x1000, 0x400, 0x1000),
        ]);

        assert_eq!(table.rva_to_offset(0x1000), Some(0x400));
        assert_eq!(table.rva_to_offset(0x1010), Some(0x410));
        assert_eq!(table.rva_to_offset(0x3100), Some(0x1100));
        assert_eq!(table.rva_to_offset(0x2800), None);
        assert_eq!(table.rva_to_offset(0x0), None);
    }

    #[test]
    fn test_rva_in_zero_fill_has_no_offset() {
        // 0x400 bytes on disk, 0x1000 in memory
        let table = SectionTable::new(vec![create_test_section(".data", 0x2000, 0x1000, 0x600, 0x400)]);
        assert_eq!(table.rva_to_offset(0x23ff), Some(0x9ff));
        assert_eq!(table.rva_to_offset(0x2400), None);
    }

    #[test]
    fn test_section_containing_rva() {
        let table = SectionTable::new(vec![
            create_test_section(".text", 0x1000, 0x1000, 0x400, 0x1000),
            create_test_section(".rsrc", 0x3000, 0x800, 0x1400, 0x800),
        ]);
        assert!(table.section_containing_rva(0x2800).is_none());
        assert_eq!(
            table.section_containing_rva(0x3004).map(|s| s.header.name()),
            Some(".rsrc".to_string())
        );
    }

    #[test]
    fn test_parse_section_headers_truncated() {
        let data = vec![0u8; 60];
        assert!(matches!(
            parse_section_headers(&data, 0, 2),
            Err(PeError::TruncatedHeader { .. })
        ));
        assert_eq!(parse_section_headers(&data, 0, 1).unwrap().len(), 1);
    }
}
