#![no_main]
use collatable::{read_all, Collatable, CollatableReader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Some(value) = read_all(data) {
        // Anything that decodes must re-encode to a prefix of the input
        let encoded = Collatable::from(&value).into_bytes();
        assert!(data.starts_with(&encoded));
    }
    let mut reader = CollatableReader::new(data);
    let _ = reader.skip_value();
    for elem in CollatableReader::new(data) {
        if elem.is_err() {
            break;
        }
    }
});
