//! Core PE data types and structures

use std::ops::Range;

use thiserror::Error;

// PE constants
pub const DOS_SIGNATURE: u16 = 0x5A4D; // MZ
pub const PE_SIGNATURE: [u8; 4] = *b"PE\0\0";
pub const PE32_MAGIC: u16 = 0x10B;
pub const PE32PLUS_MAGIC: u16 = 0x20B;

// Data directory indices
pub const IMAGE_DIRECTORY_ENTRY_RESOURCE: usize = 2;
pub const IMAGE_NUMBEROF_DIRECTORY_ENTRIES: usize = 16;

// Section characteristics
pub const IMAGE_SCN_CNT_INITIALIZED_DATA: u32 = 0x00000040;
pub const IMAGE_SCN_MEM_READ: u32 = 0x40000000;

// Resource types
pub const RT_RCDATA: u16 = 10;

/// PE parsing error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeError {
    #[error("Invalid DOS signature")]
    InvalidDosSignature,
    #[error("Invalid PE signature")]
    InvalidPeSignature,
    #[error("Invalid optional header magic: 0x{0:04x}")]
    InvalidMagic(u16),
    #[error("Truncated header: expected {expected} bytes, got {actual}")]
    TruncatedHeader { expected: usize, actual: usize },
    #[error("Invalid RVA: 0x{rva:08x}")]
    InvalidRva { rva: u32 },
    #[error("Invalid file offset: 0x{offset:x}")]
    InvalidOffset { offset: usize },
    #[error("Malformed resource directory")]
    MalformedResourceDirectory,
    #[error("Data directory {index} not found")]
    DataDirectoryNotFound { index: usize },
    #[error("Limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("Invalid string encoding")]
    InvalidString,
}

pub type Result<T> = std::result::Result<T, PeError>;

/// Machine types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Machine {
    I386,
    X86_64,
    Arm64,
    Other(u16),
}

impl From<u16> for Machine {
    fn from(value: u16) -> Self {
        match value {
            0x014c => Machine::I386,
            0x8664 => Machine::X86_64,
            0xaa64 => Machine::Arm64,
            other => Machine::Other(other),
        }
    }
}

impl From<Machine> for u16 {
    fn from(machine: Machine) -> Self {
        match machine {
            Machine::I386 => 0x014c,
            Machine::X86_64 => 0x8664,
            Machine::Arm64 => 0xaa64,
            Machine::Other(v) => v,
        }
    }
}

/// DOS header fields needed to locate the NT headers
#[derive(Debug, Clone, Copy)]
pub struct DosHeader {
    pub e_magic: u16,  // Magic number (MZ)
    pub e_lfanew: u32, // File address of PE header
}

/// COFF header (20 bytes)
#[derive(Debug, Clone, Copy)]
pub struct CoffHeader {
    pub machine: Machine,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub size_of_optional_header: u16,
    pub characteristics: u16,
}

/// Data directory entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataDirectory {
    pub virtual_address: u32,
    pub size: u32,
}

impl DataDirectory {
    /// A directory is present when both its RVA and size are non-zero
    pub fn is_present(&self) -> bool {
        self.virtual_address != 0 && self.size != 0
    }
}

/// Optional header fields shared by PE32 and PE32+
#[derive(Debug, Clone, Copy)]
pub struct OptionalHeader {
    pub magic: u16,
    pub address_of_entry_point: u32,
    pub image_base: u64,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub size_of_image: u32,
    pub number_of_rva_and_sizes: u32,
}

impl OptionalHeader {
    pub fn is_64bit(&self) -> bool {
        self.magic == PE32PLUS_MAGIC
    }
}

/// NT headers (PE signature + COFF + Optional)
#[derive(Debug, Clone, Copy)]
pub struct NtHeaders {
    pub file_header: CoffHeader,
    pub optional_header: OptionalHeader,
}

/// Section header
#[derive(Debug, Clone)]
pub struct SectionHeader {
    pub name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub characteristics: u32,
}

impl SectionHeader {
    pub fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(8);
        String::from_utf8_lossy(&self.name[..end]).to_string()
    }

    pub fn contains_rva(&self, rva: u32) -> bool {
        let size = self.virtual_size.max(self.size_of_raw_data);
        rva >= self.virtual_address && rva < self.virtual_address.saturating_add(size)
    }
}

/// Section with data reference
#[derive(Debug, Clone)]
pub struct Section {
    pub header: SectionHeader,
    pub data: Range<usize>, // Range in file
}

/// Parse options
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Upper bound on entries read from a single resource directory table
    pub max_resource_entries: usize,
    /// Upper bound on section headers
    pub max_sections: u16,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_resource_entries: 4096,
            max_sections: 96,
        }
    }
}
