#![no_main]
use libfuzzer_sys::fuzz_target;
use rsrc_extract::formats::pe::PeImage;

fuzz_target!(|data: &[u8]| {
    if let Ok(image) = PeImage::parse(data) {
        let _ = image.resource_directory();
        for section in image.sections() {
            let _ = image.rva_to_offset(section.header.virtual_address);
        }
    }
});
