#![no_main]

use iopmp_core::{
    evaluate, AccessKind, AccessRequest, Iopmp, IopmpConfig, SimRam, MAX_ENTRIES,
    MAX_TRANSFER_BYTES,
};
use libfuzzer_sys::fuzz_target;

const ENTRY_BYTES: usize = 9;

fuzz_target!(|data: &[u8]| {
    if data.len() < 12 {
        return;
    }
    let (header, body) = data.split_at(12);
    let address = u64::from_le_bytes([
        header[0], header[1], header[2], header[3], header[4], header[5], header[6], header[7],
    ]);
    let length = usize::from(u16::from_le_bytes([header[8], header[9]]));
    let kind = match header[10] % 3 {
        0 => AccessKind::Read,
        1 => AccessKind::Write,
        _ => AccessKind::Execute,
    };
    let granularity_log2 = 2 + u32::from(header[11] % 20);

    let config = IopmpConfig {
        granularity_log2,
        ..IopmpConfig::default()
    };
    let Ok(mut iopmp) = Iopmp::new(config, SimRam::default()) else {
        return;
    };

    for (index, chunk) in body.chunks_exact(ENTRY_BYTES).take(MAX_ENTRIES).enumerate() {
        let field = u64::from_le_bytes([
            chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
        ]);
        let _ = iopmp.config_write(index as u64 * 8, &field.to_le_bytes());
        let _ = iopmp.config_write(0x80 + index as u64, &[chunk[8]]);
    }

    let decision = evaluate(
        iopmp.table(),
        &AccessRequest::new(address, length as u64, kind),
    );
    if let Some(entry) = decision.entry() {
        assert!(entry < MAX_ENTRIES);
    }

    let read = iopmp.read(address, length);
    if length <= MAX_TRANSFER_BYTES {
        assert_eq!(read.data.len(), length);
    } else {
        assert!(read.data.is_empty());
    }
    if !read.code.is_okay() {
        assert!(read.data.iter().all(|&byte| byte == 0));
    }
    let before = iopmp.memory().peek(address, 16);
    let write = iopmp.write(address, &vec![0xA5; length.min(64)]);
    if !write.code.is_okay() {
        assert_eq!(iopmp.memory().peek(address, 16), before);
    }
});
