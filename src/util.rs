use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static MESSAGE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
static TOOL_USE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
const HEX: &[u8; 16] = b"0123456789abcdef";

#[inline]
fn process_seed() -> u64 {
    static SEED: std::sync::LazyLock<u64> = std::sync::LazyLock::new(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_secs())
    });
    *SEED
}

/// Generate a Claude-style message id (`msg_…`).
#[inline]
pub(crate) fn next_message_id() -> String {
    next_generated_id("msg_", &MESSAGE_ID_COUNTER)
}

/// Generate a tool-use id for backends that omit one (`toolu_…`).
#[inline]
pub(crate) fn next_tool_use_id() -> String {
    next_generated_id("toolu_", &TOOL_USE_ID_COUNTER)
}

fn next_generated_id(prefix: &str, counter: &AtomicU64) -> String {
    let seq = counter.fetch_add(1, Ordering::Relaxed);
    let mut out = String::with_capacity(prefix.len() + 24);
    out.push_str(prefix);
    push_u64_hex(&mut out, process_seed(), 8);
    push_u64_hex(&mut out, seq, 16);
    out
}

#[inline]
fn push_u64_hex(out: &mut String, mut value: u64, width: usize) {
    let mut buf = [b'0'; 16];
    let width = width.min(16);
    let mut idx = 16;
    while idx > 16 - width {
        idx -= 1;
        let nibble = usize::try_from(value & 0x0f).unwrap_or(0);
        buf[idx] = HEX[nibble];
        value >>= 4;
    }
    for &byte in &buf[16 - width..] {
        out.push(char::from(byte));
    }
}
