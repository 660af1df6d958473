//! Hex Dump Rendering

/// Bytes shown per dump line
const BYTES_PER_LINE: usize = 8;

/// Render a buffer as hex dump lines: eight two-digit hex values followed by
/// a printable-ASCII column, non-printables shown as dots.
pub fn render(data: &[u8]) -> Vec<String> {
    data.chunks(BYTES_PER_LINE)
        .map(|chunk| {
            let hex = chunk
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ");
            let ascii: String = chunk.iter().map(|&b| printable(b)).collect();
            // pad short final lines so the ascii column stays aligned
            format!("{:<width$} | {}", hex, ascii, width = BYTES_PER_LINE * 3 - 1)
        })
        .collect()
}

fn printable(byte: u8) -> char {
    if (0x20..0x7f).contains(&byte) {
        byte as char
    } else {
        '.'
    }
}
