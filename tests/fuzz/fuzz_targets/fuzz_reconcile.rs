#![no_main]
use libfuzzer_sys::fuzz_target;

use covrec::model::{BlockCoverage, CoverageType, FileCoverage};
use covrec::reconcile::to_line_coverages;

/// Small counts most of the time, counts next to `u64::MAX` otherwise.
fn wide(selector: u8, low: u8) -> u64 {
    if selector & 0x80 != 0 {
        u64::MAX - u64::from(low)
    } else {
        u64::from(low)
    }
}

fuzz_target!(|data: &[u8]| {
    // Every 8 bytes describe one block. Only blocks that pass the model's
    // consistency check reach the engine, as with parsed input.
    let blocks: Vec<BlockCoverage> = data
        .chunks_exact(8)
        .map(|c| {
            let start_line = u32::from(c[0] % 16) + 1;
            let end_line = start_line + u32::from(c[1] % 4);
            let count = wide(c[7], c[2]);
            if c[3] % 2 == 0 {
                BlockCoverage::loc(start_line, count)
            } else {
                BlockCoverage::statement(
                    start_line,
                    u32::from(c[4]),
                    end_line,
                    u32::from(c[5]),
                    wide(c[7] << 1, c[6]),
                    count,
                )
            }
        })
        .filter(|b| b.check().is_ok())
        .collect();

    for line in to_line_coverages(&blocks) {
        assert!(line.pos_coverages.iter().all(|p| p.count <= line.count));
    }

    let mut file = FileCoverage::with_blocks("fuzz.go", blocks);
    for kind in [CoverageType::Statement, CoverageType::Merged] {
        file.recompute(kind);
        assert!(file.covered <= file.total);
    }
});
