#![no_main]
use libfuzzer_sys::fuzz_target;
use lpsgen_mc::{load, ExploreConfig, Explorer, NullSink};
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(model) = load::from_json(s) {
            let config = ExploreConfig {
                max_states: 200,
                detect_deadlock: true,
                seed: Some(0),
                ..ExploreConfig::default()
            };
            let mut sink = NullSink;
            let _ = Explorer::new(Arc::new(model), config, &mut sink).run();
        }
    }
});
