#![no_main]

//! Decodes arbitrary bytes as a host-bound message and replays any decoded
//! batch into an arena page. Decode and replay errors are expected; panics
//! are not.

use libfuzzer_sys::fuzz_target;
use renderer::{ArenaPage, StageBindings, apply_record};

fuzz_target!(|data: &[u8]| {
    let Ok(message) = proto::decode_to_host(data) else {
        return;
    };
    let (proto::ToHost::Mutate { mutations, .. } | proto::ToHost::Hydrate { mutations, .. }) =
        message
    else {
        return;
    };
    let mut page = ArenaPage::new();
    let mut bindings = StageBindings::new();
    for record in &mutations {
        if apply_record(&mut page, &mut bindings, record).is_err() {
            break;
        }
    }
});
