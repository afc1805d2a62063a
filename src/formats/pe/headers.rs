//! PE header parsing

use crate::formats::pe::types::*;
use crate::formats::pe::utils::{u16_at, u32_at, ReadExt};

/// Size of the fixed part of the PE32 optional header, before the data directories
const PE32_FIXED_SIZE: usize = 96;
/// Size of the fixed part of the PE32+ optional header, before the data directories
const PE32PLUS_FIXED_SIZE: usize = 112;

/// Parse DOS header from data
pub fn parse_dos_header(data: &[u8]) -> Result<DosHeader> {
    if data.len() < 64 {
        return Err(PeError::TruncatedHeader {
            expected: 64,
            actual: data.len(),
        });
    }

    let e_magic = u16_at(data, 0)?;
    if e_magic != DOS_SIGNATURE {
        return Err(PeError::InvalidDosSignature);
    }

    Ok(DosHeader {
        e_magic,
        e_lfanew: u32_at(data, 60)?,
    })
}

/// Parse COFF header from data at offset
pub fn parse_coff_header(data: &[u8], offset: usize) -> Result<CoffHeader> {
    if offset + 20 > data.len() {
        return Err(PeError::TruncatedHeader {
            expected: offset + 20,
            actual: data.len(),
        });
    }

    Ok(CoffHeader {
        machine: Machine::from(u16_at(data, offset)?),
        number_of_sections: u16_at(data, offset + 2)?,
        time_date_stamp: u32_at(data, offset + 4)?,
        size_of_optional_header: u16_at(data, offset + 16)?,
        characteristics: u16_at(data, offset + 18)?,
    })
}

/// Parse optional header from data at offset
pub fn parse_optional_header(data: &[u8], offset: usize, size: u16) -> Result<OptionalHeader> {
    if offset + size as usize > data.len() {
        return Err(PeError::TruncatedHeader {
            expected: offset + size as usize,
            actual: data.len(),
        });
    }

    let magic = data
        .read_u16_le_at(offset)
        .ok_or(PeError::TruncatedHeader {
            expected: offset + 2,
            actual: data.len(),
        })?;

    let (fixed, image_base, rva_count_offset) = match magic {
        PE32_MAGIC => (
            PE32_FIXED_SIZE,
            u64::from(u32_at(data, offset + 28)?),
            offset + 92,
        ),
        PE32PLUS_MAGIC => (
            PE32PLUS_FIXED_SIZE,
            data.read_u64_le_at(offset + 24)
                .ok_or(PeError::InvalidOffset {
                    offset: offset + 24,
                })?,
            offset + 108,
        ),
        _ => return Err(PeError::InvalidMagic(magic)),
    };

    if (size as usize) < fixed {
        return Err(PeError::TruncatedHeader {
            expected: offset + fixed,
            actual: offset + size as usize,
        });
    }

    Ok(OptionalHeader {
        magic,
        address_of_entry_point: u32_at(data, offset + 16)?,
        image_base,
        section_alignment: u32_at(data, offset + 32)?,
        file_alignment: u32_at(data, offset + 36)?,
        size_of_image: u32_at(data, offset + 56)?,
        number_of_rva_and_sizes: u32_at(data, rva_count_offset)?,
    })
}

/// Parse data directories from data at offset.
///
/// Only directories that fit inside the optional header are read; the rest
/// are reported as empty so callers can index all sixteen slots.
pub fn parse_data_directories(
    data: &[u8],
    offset: usize,
    count: u32,
    available: usize,
) -> Vec<DataDirectory> {
    let count = (count as usize)
        .min(IMAGE_NUMBEROF_DIRECTORY_ENTRIES)
        .min(available / 8);

    let mut directories: Vec<DataDirectory> = (0..count)
        .map_while(|i| {
            let dir_offset = offset + i * 8;
            Some(DataDirectory {
                virtual_address: data.read_u32_le_at(dir_offset)?,
                size: data.read_u32_le_at(dir_offset + 4)?,
            })
        })
        .collect();

    // Pad with empty directories if needed
    directories.resize(IMAGE_NUMBEROF_DIRECTORY_ENTRIES, DataDirectory::default());
    directories
}

/// Parse NT headers (PE signature + COFF + Optional)
pub fn parse_nt_headers(data: &[u8], offset: usize) -> Result<(NtHeaders, Vec<DataDirectory>)> {
    // Check PE signature
    let signature = data.read_slice_at(offset, 4).ok_or(PeError::TruncatedHeader {
        expected: offset.saturating_add(4),
        actual: data.len(),
    })?;

    if signature != PE_SIGNATURE {
        return Err(PeError::InvalidPeSignature);
    }

    // Parse COFF header
    let file_header = parse_coff_header(data, offset + 4)?;

    // Parse optional header
    let opt_offset = offset + 24; // 4 (signature) + 20 (COFF)
    let optional_header =
        parse_optional_header(data, opt_offset, file_header.size_of_optional_header)?;

    // Parse data directories
    let fixed = if optional_header.is_64bit() {
        PE32PLUS_FIXED_SIZE
    } else {
        PE32_FIXED_SIZE
    };
    let directories = parse_data_directories(
        data,
        opt_offset + fixed,
        optional_header.number_of_rva_and_sizes,
        file_header.size_of_optional_header as usize - fixed,
    );

    let nt_headers = NtHeaders {
        file_header,
        optional_header,
    };

    Ok((nt_headers, directories))
}
