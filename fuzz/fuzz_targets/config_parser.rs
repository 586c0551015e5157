#![no_main]

use libfuzzer_sys::fuzz_target;
use rtstats::config::SamplerConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Any accepted configuration must also pass validation
        if let Ok(config) = SamplerConfig::from_toml_str(input) {
            assert!(config.validate().is_ok());
        }
    }
});
