//! IPv4 CIDR containment over 32-bit integers.
//!
//! Conversion is lenient: a malformed address or prefix yields a wrong but
//! well-defined number instead of an error. An unparseable octet collapses
//! the whole address to `0`; an unparseable or oversized prefix length
//! collapses the block to its single base address.

/// Known ISP allocations inside the service territory.
pub const TERRITORY_RANGES: &[&str] = &[
    "41.138.128.0/17",  // Mauritel
    "41.202.192.0/18",  // Chinguitel
    "41.221.128.0/17",  // Mattel
    "196.200.96.0/19",  // various ISPs
    "154.73.0.0/16",
    "41.188.128.0/17",
];

/// Convert dotted-quad text to a 32-bit integer.
pub fn ip_to_number(ip: &str) -> u32 {
    let mut acc: u32 = 0;
    for octet in ip.split('.') {
        match leading_int(octet) {
            Some(value) => acc = acc.wrapping_shl(8).wrapping_add(value),
            None => return 0,
        }
    }
    acc
}

/// Parse the leading decimal digits of `s`, ignoring anything after them.
fn leading_int(s: &str) -> Option<u32> {
    let digits: String = s.trim_start().chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    Some(digits.parse::<u64>().map_or(u32::MAX, |v| v as u32))
}

fn prefix_mask(bits: Option<u32>) -> u32 {
    match bits {
        Some(0) => 0,
        Some(b @ 1..=32) => u32::MAX << (32 - b),
        _ => u32::MAX,
    }
}

/// An inclusive address range `[base & mask, base | !mask]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrRange {
    pub start: u32,
    pub end: u32,
}

impl CidrRange {
    /// Compile a CIDR string such as `"41.138.128.0/17"`.
    pub fn parse(cidr: &str) -> Self {
        let (ip, bits) = match cidr.split_once('/') {
            Some((ip, bits)) => (ip, leading_int(bits)),
            None => (cidr, None),
        };
        let mask = prefix_mask(bits);
        let base = ip_to_number(ip);
        Self {
            start: base & mask,
            end: base | !mask,
        }
    }

    pub fn contains(&self, ip: u32) -> bool {
        ip >= self.start && ip <= self.end
    }

    pub fn contains_str(&self, ip: &str) -> bool {
        self.contains(ip_to_number(ip))
    }
}

/// Compile the fixed territory table.
pub fn territory_ranges() -> Vec<CidrRange> {
    TERRITORY_RANGES.iter().map(|c| CidrRange::parse(c)).collect()
}
