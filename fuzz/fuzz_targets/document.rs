#![no_main]
use collatable::Document;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut input = data;
    if let Ok(doc) = Document::read_from(&mut input) {
        let mut buf = Vec::new();
        doc.write_to(&mut buf);
        assert!(data.starts_with(&buf));
    }
});
