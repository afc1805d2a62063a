//! PE image parser with resource lookup

pub mod builder;
pub mod directories;
pub mod headers;
pub mod sections;
pub mod types;
pub mod utils;

use directories::*;
use headers::*;
use sections::*;
pub use types::*;

/// A parsed PE image in file layout.
///
/// The image owns (or borrows, for `D = &[u8]`) its bytes; parsed metadata
/// only stores offsets into them, so the same parser serves slices, vectors
/// and memory maps.
pub struct PeImage<D> {
    data: D,
    nt_headers: NtHeaders,
    data_directories: Vec<DataDirectory>,
    section_table: SectionTable,
    options: ParseOptions,
}

impl<D> std::fmt::Debug for PeImage<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeImage")
            .field("machine", &self.nt_headers.file_header.machine)
            .field("is_64bit", &self.nt_headers.optional_header.is_64bit())
            .field("sections", &self.section_table.sections().len())
            .finish_non_exhaustive()
    }
}

impl<D: AsRef<[u8]>> PeImage<D> {
    /// Create parser with default options
    pub fn parse(data: D) -> Result<Self> {
        Self::with_options(data, ParseOptions::default())
    }

    /// Create parser with custom options
    pub fn with_options(data: D, options: ParseOptions) -> Result<Self> {
        let bytes = data.as_ref();

        let dos_header = parse_dos_header(bytes)?;
        let (nt_headers, data_directories) =
            parse_nt_headers(bytes, dos_header.e_lfanew as usize)?;

        let count = nt_headers.file_header.number_of_sections;
        if count > options.max_sections {
            return Err(PeError::LimitExceeded("section count"));
        }

        let section_offset = dos_header.e_lfanew as usize
            + 24
            + nt_headers.file_header.size_of_optional_header as usize;
        let section_headers = parse_section_headers(bytes, section_offset, count)?;
        let section_table = SectionTable::new(create_sections(section_headers));

        Ok(Self {
            data,
            nt_headers,
            data_directories,
            section_table,
            options,
        })
    }

    /// Raw image bytes
    pub fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Get NT headers
    pub fn nt_headers(&self) -> &NtHeaders {
        &self.nt_headers
    }

    /// Check if PE is 64-bit
    pub fn is_64bit(&self) -> bool {
        self.nt_headers.optional_header.is_64bit()
    }

    /// Get machine type
    pub fn machine(&self) -> Machine {
        self.nt_headers.file_header.machine
    }

    /// Get all sections
    pub fn sections(&self) -> &[Section] {
        self.section_table.sections()
    }

    /// Convert RVA to file offset
    pub fn rva_to_offset(&self, rva: u32) -> Option<usize> {
        self.section_table.rva_to_offset(rva)
    }

    /// Get data directory by index
    pub fn data_directory(&self, index: usize) -> Result<&DataDirectory> {
        self.data_directories
            .get(index)
            .ok_or(PeError::DataDirectoryNotFound { index })
    }

    /// Check if file has resources
    pub fn has_resources(&self) -> bool {
        self.data_directory(IMAGE_DIRECTORY_ENTRY_RESOURCE)
            .map(DataDirectory::is_present)
            .unwrap_or(false)
    }

    /// Resource directory, if the image has one
    pub fn resource_directory(&self) -> Result<Option<ResourceDirectory<'_>>> {
        let dir = *self.data_directory(IMAGE_DIRECTORY_ENTRY_RESOURCE)?;
        if !dir.is_present() {
            return Ok(None);
        }

        let rva = dir.virtual_address;
        let section = self
            .section_table
            .section_containing_rva(rva)
            .ok_or(PeError::InvalidRva { rva })?;
        let start = self.rva_to_offset(rva).ok_or(PeError::InvalidRva { rva })?;
        let end = section.data.end.min(self.bytes().len());
        let tree = self
            .bytes()
            .get(start..end)
            .ok_or(PeError::InvalidOffset { offset: start })?;

        Ok(Some(ResourceDirectory::new(tree, &self.options)))
    }

    /// Look up an RCDATA entry
    pub fn find_rcdata(
        &self,
        name: ResourceKey<'_>,
    ) -> std::result::Result<ResourceDataEntry, LookupError> {
        let directory = self
            .resource_directory()?
            .ok_or(LookupError::NoResourceDirectory)?;
        directory.find(ResourceKey::Id(RT_RCDATA), name)
    }

    /// File bytes a data entry points at
    pub fn entry_bytes(&self, entry: &ResourceDataEntry) -> Result<&[u8]> {
        let offset = self
            .rva_to_offset(entry.rva)
            .ok_or(PeError::InvalidRva { rva: entry.rva })?;
        utils::check_bounds(offset, entry.size as usize, self.bytes().len())?;
        Ok(&self.bytes()[offset..offset + entry.size as usize])
    }
}
