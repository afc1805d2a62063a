//! Cross-check synthesized images and our lookups against `object`'s PE reader.

mod common;

use common::*;
use object::pe::{IMAGE_FILE_MACHINE_AMD64, RT_RCDATA};
use object::read::pe::{PeFile64, ResourceDirectoryEntryData, ResourceNameOrId};
use object::{LittleEndian as LE, Object, ObjectSection};
use rsrc_extract::{ResourceId, ResourceView};

/// Every RCDATA entry as (label, bytes), read with `object`.
fn rcdata_entries(data: &[u8]) -> Vec<(String, Vec<u8>)> {
    let file = PeFile64::parse(data).unwrap();
    let sections = file.section_table();
    let rsrc = file
        .data_directories()
        .resource_directory(data, &sections)
        .unwrap()
        .expect("resource directory present");

    let mut out = Vec::new();
    for type_entry in rsrc.root().unwrap().entries {
        match type_entry.name_or_id() {
            ResourceNameOrId::Id(id) if id == RT_RCDATA => {}
            _ => continue,
        }
        let ResourceDirectoryEntryData::Table(names) = type_entry.data(rsrc).unwrap() else {
            panic!("type entry is not a table");
        };
        for name_entry in names.entries {
            let label = match name_entry.name_or_id() {
                ResourceNameOrId::Id(id) => format!("#{id}"),
                ResourceNameOrId::Name(name) => name.to_string_lossy(rsrc).unwrap(),
            };
            let ResourceDirectoryEntryData::Table(langs) = name_entry.data(rsrc).unwrap() else {
                panic!("name entry is not a table");
            };
            let ResourceDirectoryEntryData::Data(leaf) = langs.entries[0].data(rsrc).unwrap()
            else {
                panic!("language entry is not a leaf");
            };
            let rva = leaf.offset_to_data.get(LE);
            let size = leaf.size.get(LE) as usize;
            let bytes = sections.pe_data_at(data, rva).unwrap()[..size].to_vec();
            out.push((label, bytes));
        }
    }
    out
}

#[test]
fn test_headers_agree() {
    let data = host_image_bytes();
    let file = PeFile64::parse(data.as_slice()).unwrap();
    assert_eq!(
        file.nt_headers().file_header.machine.get(LE),
        IMAGE_FILE_MACHINE_AMD64
    );

    let names: Vec<&str> = file.sections().map(|s| s.name().unwrap()).collect();
    assert_eq!(names, [".rsrc"]);
}

#[test]
fn test_rcdata_entries_agree() {
    let data = host_image_bytes();
    let image = host_image();
    let entries = rcdata_entries(&data);
    assert_eq!(entries.len(), 3);

    for (label, bytes) in &entries {
        let view = ResourceView::open(&ResourceId::from(label.as_str()), &image).unwrap();
        assert_eq!(view.as_bytes(), bytes.as_slice(), "entry {label}");
    }

    // Named entries sort ahead of IDs, IDs ascend.
    let labels: Vec<&str> = entries.iter().map(|(label, _)| label.as_str()).collect();
    assert_eq!(labels, ["MANIFEST", "#1", "#101"]);
}
