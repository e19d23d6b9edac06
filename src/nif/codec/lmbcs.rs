//! LMBCS (Lotus Multi-Byte Character Set) text conversion.
//!
//! LMBCS stores ASCII and code page 850 characters as single bytes. Any other
//! character is introduced by a group byte naming the code page it belongs to:
//!
//! | Group | Character set |
//! |-------|---------------|
//! | 0x01 | code page 850 |
//! | 0x03 | windows-1255 (Hebrew) |
//! | 0x04 | windows-1256 (Arabic) |
//! | 0x05 | windows-1251 (Cyrillic) |
//! | 0x08 | windows-1254 (Turkish) |
//! | 0x0B | windows-874 (Thai) |
//! | 0x0F | escaped C0 control |
//! | 0x10 | Shift_JIS |
//! | 0x11 | EUC-KR |
//! | 0x12 | Big5 |
//! | 0x13 | GBK |
//! | 0x14 | UTF-16 code unit (big-endian) |
//!
//! Groups 0x02 (Greek) and 0x06 (Central European) have no mapping here and
//! decode to U+FFFD.

use encoding_rs::{
    BIG5, EUC_KR, Encoding, GBK, SHIFT_JIS, WINDOWS_874, WINDOWS_1251, WINDOWS_1254, WINDOWS_1255,
    WINDOWS_1256,
};

const GROUP_CP850: u8 = 0x01;
const GROUP_GREEK: u8 = 0x02;
const GROUP_HEBREW: u8 = 0x03;
const GROUP_ARABIC: u8 = 0x04;
const GROUP_CYRILLIC: u8 = 0x05;
const GROUP_CENTRAL_EUROPE: u8 = 0x06;
const GROUP_TURKISH: u8 = 0x08;
const GROUP_THAI: u8 = 0x0B;
const GROUP_CONTROL: u8 = 0x0F;
const GROUP_JAPANESE: u8 = 0x10;
const GROUP_KOREAN: u8 = 0x11;
const GROUP_TRADITIONAL_CHINESE: u8 = 0x12;
const GROUP_SIMPLIFIED_CHINESE: u8 = 0x13;
const GROUP_UNICODE: u8 = 0x14;

/// Offset added to a C0 control character when it is escaped with [`GROUP_CONTROL`].
const CONTROL_ESCAPE_OFFSET: u8 = 0x20;

/// Code page 850, bytes 0x80..=0xFF.
const CP850_HIGH: [char; 128] = [
    '\u{00C7}', '\u{00FC}', '\u{00E9}', '\u{00E2}', '\u{00E4}', '\u{00E0}', '\u{00E5}', '\u{00E7}',
    '\u{00EA}', '\u{00EB}', '\u{00E8}', '\u{00EF}', '\u{00EE}', '\u{00EC}', '\u{00C4}', '\u{00C5}',
    '\u{00C9}', '\u{00E6}', '\u{00C6}', '\u{00F4}', '\u{00F6}', '\u{00F2}', '\u{00FB}', '\u{00F9}',
    '\u{00FF}', '\u{00D6}', '\u{00DC}', '\u{00F8}', '\u{00A3}', '\u{00D8}', '\u{00D7}', '\u{0192}',
    '\u{00E1}', '\u{00ED}', '\u{00F3}', '\u{00FA}', '\u{00F1}', '\u{00D1}', '\u{00AA}', '\u{00BA}',
    '\u{00BF}', '\u{00AE}', '\u{00AC}', '\u{00BD}', '\u{00BC}', '\u{00A1}', '\u{00AB}', '\u{00BB}',
    '\u{2591}', '\u{2592}', '\u{2593}', '\u{2502}', '\u{2524}', '\u{00C1}', '\u{00C2}', '\u{00C0}',
    '\u{00A9}', '\u{2563}', '\u{2551}', '\u{2557}', '\u{255D}', '\u{00A2}', '\u{00A5}', '\u{2510}',
    '\u{2514}', '\u{2534}', '\u{252C}', '\u{251C}', '\u{2500}', '\u{253C}', '\u{00E3}', '\u{00C3}',
    '\u{255A}', '\u{2554}', '\u{2569}', '\u{2566}', '\u{2560}', '\u{2550}', '\u{256C}', '\u{00A4}',
    '\u{00F0}', '\u{00D0}', '\u{00CA}', '\u{00CB}', '\u{00C8}', '\u{0131}', '\u{00CD}', '\u{00CE}',
    '\u{00CF}', '\u{2518}', '\u{250C}', '\u{2588}', '\u{2584}', '\u{00A6}', '\u{00CC}', '\u{2580}',
    '\u{00D3}', '\u{00DF}', '\u{00D4}', '\u{00D2}', '\u{00F5}', '\u{00D5}', '\u{00B5}', '\u{00FE}',
    '\u{00DE}', '\u{00DA}', '\u{00DB}', '\u{00D9}', '\u{00FD}', '\u{00DD}', '\u{00AF}', '\u{00B4}',
    '\u{00AD}', '\u{00B1}', '\u{2017}', '\u{00BE}', '\u{00B6}', '\u{00A7}', '\u{00F7}', '\u{00B8}',
    '\u{00B0}', '\u{00A8}', '\u{00B7}', '\u{00B9}', '\u{00B3}', '\u{00B2}', '\u{25A0}', '\u{00A0}',
];

fn is_group_byte(byte: u8) -> bool {
    matches!(
        byte,
        GROUP_CP850..=GROUP_CENTRAL_EUROPE
            | GROUP_TURKISH
            | GROUP_THAI
            | GROUP_CONTROL..=GROUP_UNICODE
    )
}

fn single_byte_encoding(group: u8) -> Option<&'static Encoding> {
    match group {
        GROUP_HEBREW => Some(WINDOWS_1255),
        GROUP_ARABIC => Some(WINDOWS_1256),
        GROUP_CYRILLIC => Some(WINDOWS_1251),
        GROUP_TURKISH => Some(WINDOWS_1254),
        GROUP_THAI => Some(WINDOWS_874),
        _ => None,
    }
}

fn double_byte_encoding(group: u8) -> Option<&'static Encoding> {
    match group {
        GROUP_JAPANESE => Some(SHIFT_JIS),
        GROUP_KOREAN => Some(EUC_KR),
        GROUP_TRADITIONAL_CHINESE => Some(BIG5),
        GROUP_SIMPLIFIED_CHINESE => Some(GBK),
        _ => None,
    }
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8], out: &mut String) {
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    out.push_str(&text);
}

/// Converts LMBCS bytes to a `String`.
///
/// Decoding never fails: truncated groups and unmapped characters become U+FFFD.
pub fn decode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut pending_units: Vec<u16> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];

        // UTF-16 units may form surrogate pairs across two groups, so they
        // are collected first and flushed on the next non-unicode byte.
        if byte == GROUP_UNICODE {
            if let Some(unit) = bytes.get(i + 1..i + 3) {
                pending_units.push(u16::from_be_bytes([unit[0], unit[1]]));
            } else {
                flush_units(&mut pending_units, &mut out);
                out.push(char::REPLACEMENT_CHARACTER);
            }
            i += 3;
            continue;
        }
        flush_units(&mut pending_units, &mut out);

        match byte {
            0x20..=0x7F => {
                out.push(byte as char);
                i += 1;
            }
            0x80..=0xFF => {
                out.push(CP850_HIGH[(byte - 0x80) as usize]);
                i += 1;
            }
            GROUP_CP850 => {
                match bytes.get(i + 1) {
                    Some(&next) if next >= 0x80 => out.push(CP850_HIGH[(next - 0x80) as usize]),
                    Some(&next) => out.push(next as char),
                    None => out.push(char::REPLACEMENT_CHARACTER),
                }
                i += 2;
            }
            GROUP_GREEK | GROUP_CENTRAL_EUROPE => {
                out.push(char::REPLACEMENT_CHARACTER);
                i += 2;
            }
            GROUP_CONTROL => {
                match bytes.get(i + 1) {
                    Some(&next) if (CONTROL_ESCAPE_OFFSET..CONTROL_ESCAPE_OFFSET * 2).contains(&next) => {
                        out.push((next - CONTROL_ESCAPE_OFFSET) as char)
                    }
                    _ => out.push(char::REPLACEMENT_CHARACTER),
                }
                i += 2;
            }
            group if single_byte_encoding(group).is_some() => {
                match (single_byte_encoding(group), bytes.get(i + 1)) {
                    (Some(encoding), Some(next)) => decode_with(encoding, &[*next], &mut out),
                    _ => out.push(char::REPLACEMENT_CHARACTER),
                }
                i += 2;
            }
            group if double_byte_encoding(group).is_some() => {
                match (double_byte_encoding(group), bytes.get(i + 1..i + 3)) {
                    (Some(encoding), Some(pair)) => decode_with(encoding, pair, &mut out),
                    _ => out.push(char::REPLACEMENT_CHARACTER),
                }
                i += 3;
            }
            _ => {
                // Remaining C0 controls (NUL, TAB, LF, CR, ...) are stored as-is.
                out.push(byte as char);
                i += 1;
            }
        }
    }
    flush_units(&mut pending_units, &mut out);
    out
}

fn flush_units(units: &mut Vec<u16>, out: &mut String) {
    if units.is_empty() {
        return;
    }
    out.extend(char::decode_utf16(units.drain(..)).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)));
}

/// Converts a string to LMBCS bytes.
///
/// Characters outside ASCII and code page 850 are written as UTF-16 groups,
/// so every `&str` round-trips through [`decode`].
pub fn encode(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let code = ch as u32;
        if (0x20..=0x7F).contains(&code) {
            out.push(code as u8);
        } else if code < 0x20 {
            let byte = code as u8;
            if is_group_byte(byte) {
                out.push(GROUP_CONTROL);
                out.push(byte + CONTROL_ESCAPE_OFFSET);
            } else {
                out.push(byte);
            }
        } else if let Some(index) = CP850_HIGH.iter().position(|&c| c == ch) {
            out.push(0x80 + index as u8);
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                out.push(GROUP_UNICODE);
                out.extend_from_slice(&unit.to_be_bytes());
            }
        }
    }
    out
}
