/// Render a block count as `N blocks (size)` using the disc set's block
/// size.
pub(crate) fn format_blocks(blocks: i64, block_size: u64) -> String {
    let bytes = blocks.max(0) as u64 * block_size;
    format!("{blocks} blocks ({})", format_bytes(bytes))
}

fn format_bytes(bytes: u64) -> String {
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    const KIB: f64 = 1024.0;

    let b = bytes as f64;
    if b >= GIB {
        format!("{:.2} GiB", b / GIB)
    } else if b >= MIB {
        format!("{:.2} MiB", b / MIB)
    } else {
        format!("{:.2} KiB", b / KIB)
    }
}

/// A `used/limit` percentage bar for the human-readable info output.
pub(crate) fn usage_bar(used: i64, limit: i64) -> String {
    const WIDTH: usize = 24;
    if limit <= 0 {
        return String::new();
    }
    let filled = ((used.max(0) as f64 / limit as f64) * WIDTH as f64).round() as usize;
    let filled = filled.min(WIDTH);
    let pct = used.max(0) as f64 / limit as f64 * 100.0;
    format!("[{}{}] {pct:.0}%", "*".repeat(filled), ".".repeat(WIDTH - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_render_with_byte_size() {
        assert_eq!(format_blocks(256, 4096), "256 blocks (1.00 MiB)");
    }

    #[test]
    fn bar_is_clamped() {
        let over = usage_bar(300, 100);
        assert!(over.contains("300%"));
        assert!(over.contains('*'));
        assert!(!over.contains('.'));
        assert_eq!(usage_bar(0, 0), "");
    }
}
