//! Logging helpers for raw traffic so byte dumps stay single-line and bounded.

/// Render at most `max` bytes as lowercase hex, with an ellipsis and the total
/// length when the input is longer.
pub fn hex_snippet(data: &[u8], max: usize) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(data.len().min(max) * 3 + 16);
    for (i, b) in data.iter().take(max).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(&mut out, "{:02x}", b);
    }
    if data.len() > max {
        let _ = write!(&mut out, " … ({} bytes)", data.len());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::hex_snippet;

    #[test]
    fn renders_short_input_fully() {
        assert_eq!(hex_snippet(&[0xff, 0xfa, 0x2c], 8), "ff fa 2c");
    }

    #[test]
    fn truncates_long_input() {
        let data = [0u8; 10];
        assert_eq!(hex_snippet(&data, 2), "00 00 … (10 bytes)");
    }

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(hex_snippet(&[], 4), "");
    }
}
