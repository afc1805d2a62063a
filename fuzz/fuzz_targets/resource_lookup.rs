#![no_main]
use libfuzzer_sys::fuzz_target;
use rsrc_extract::formats::pe::PeImage;
use rsrc_extract::{ResourceId, ResourceView};

fuzz_target!(|data: &[u8]| {
    let Ok(image) = PeImage::parse(data) else {
        return;
    };
    for id in [ResourceId::Id(1), ResourceId::Id(101), ResourceId::from("PAYLOAD")] {
        if let Ok(view) = ResourceView::open(&id, &image) {
            assert!(view.size() > 0);
            assert_eq!(view.iter().count(), view.size());
        }
    }
});
