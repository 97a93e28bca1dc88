#![no_main]

use libfuzzer_sys::fuzz_target;
use argroup::grouping::GroupingKey;
use argroup::pipeline::PipelineTemplate;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Neither parser may panic on arbitrary text
        let _ = PipelineTemplate::from_toml_str(input);
        let _ = input.parse::<GroupingKey>();
    }
});
