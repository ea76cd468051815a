/// Parse a hexadecimal byte, with or without a `0x` prefix.
pub(crate) fn u8_from_hex(value: &str) -> Result<u8, std::num::ParseIntError> {
    let s = if value.to_ascii_lowercase().starts_with("0x") {
        &value[2..]
    } else {
        value
    };
    u8::from_str_radix(s, 16)
}

/// Parse a date and time given as `YYYY-MM-DDTHH:MM:SS`.
pub(crate) fn parse_datetime(value: &str) -> Result<chrono::NaiveDateTime, chrono::ParseError> {
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
}

/// Format a port value as binary, pin 8 (or 16) first.
pub(crate) fn port_bits(value: u8) -> String {
    format!("{value:#010b} ({value:#04X})")
}
