//! Argument checks shared by the [super::Lcd] operations.
//!
//! Each check runs to completion before an operation touches any pin.

use crate::lcd::hd44780::{LcdError, LcdResult};

/// Number of CGRAM character slots.
pub const GLYPH_SLOTS: u8 = 8;

/// A 5x8 custom character, one byte per pixel row, top to bottom. Bit 4 is the leftmost pixel.
pub type Glyph = [u8; 8];

/// Gets the character code of `c`.
///
/// Codes `0x20`-`0x7D` match ASCII on the common ROM variants. Codes `0x00`-`0x07` display the
/// custom characters. Anything up to `0xFF` is passed through to the character ROM as is.
pub fn encode_char(c: char) -> LcdResult<u8> {
    u8::try_from(u32::from(c)).map_err(|_| LcdError::UnencodableChar(c))
}

/// Gets the character codes of the whole text, or fails on the first unencodable character.
pub fn encode_str(text: &str) -> LcdResult<Vec<u8>> {
    text.chars().map(encode_char).collect()
}

pub fn check_glyph(slot: u8, glyph: &Glyph) -> LcdResult<()> {
    if slot >= GLYPH_SLOTS {
        return Err(LcdError::SlotOutOfRange(slot));
    }
    if let Some((row, &value)) = glyph.iter().enumerate().find(|&(_, &value)| value > 0b11111) {
        return Err(LcdError::GlyphRowOutOfRange { row, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcd::hd44780::LcdErrorKind;

    #[test]
    fn latin1_characters_encode_to_their_code_point() {
        assert_eq!(encode_char('A'), Ok(0x41));
        assert_eq!(encode_char('\u{3}'), Ok(0x03));
        assert_eq!(encode_char('\u{FF}'), Ok(0xFF));
    }

    #[test]
    fn wider_characters_are_argument_errors() {
        let error = encode_char('€').unwrap_err();
        assert_eq!(error, LcdError::UnencodableChar('€'));
        assert_eq!(error.kind(), LcdErrorKind::Argument);
        assert_eq!(
            encode_str("ok → no"),
            Err(LcdError::UnencodableChar('→'))
        );
    }

    #[test]
    fn glyph_checks_slot_then_rows() {
        assert!(check_glyph(7, &[0x1F; 8]).is_ok());
        assert_eq!(
            check_glyph(8, &[0x00; 8]),
            Err(LcdError::SlotOutOfRange(8))
        );
        let mut glyph = [0x0A; 8];
        glyph[5] = 0x20;
        assert_eq!(
            check_glyph(0, &glyph),
            Err(LcdError::GlyphRowOutOfRange { row: 5, value: 0x20 })
        );
    }
}
