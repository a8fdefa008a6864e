#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Anything that loads must survive a save/load cycle unchanged.
    let Ok(t) = carousel_config::load_thresholds_toml(data) else {
        return;
    };
    let text = carousel_config::thresholds_to_toml(&t).expect("serialize valid thresholds");
    let back = carousel_config::load_thresholds_toml(&text).expect("reload saved thresholds");
    assert_eq!(t, back);
});
