use std::{fs, path::Path};

use super::error::CartridgeError;
use super::mapper::{Mirroring, is_supported};

const HEADER_LEN: usize = 16;
const TRAINER_LEN: usize = 512;
const PRG_UNIT: usize = 16 * 1024;
const CHR_UNIT: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub struct Cartridge {
    pub mapper_id: u16,
    pub submapper_id: u8,
    pub mirroring: Mirroring,
    pub prg_rom: Vec<u8>,
    pub chr_data: Vec<u8>,
    pub chr_is_ram: bool,
    pub prg_ram_size: usize,
}

#[derive(Debug, Clone, Copy)]
struct Header {
    mapper_id: u16,
    submapper_id: u8,
    mirroring: Mirroring,
    trainer: bool,
    prg_rom_size: usize,
    chr_rom_size: usize,
    prg_ram_size: usize,
}

impl Header {
    fn parse(bytes: &[u8]) -> Result<Self, CartridgeError> {
        if bytes.len() < HEADER_LEN {
            return Err(CartridgeError::TooSmall { len: bytes.len() });
        }
        if &bytes[0..4] != b"NES\x1A" {
            return Err(CartridgeError::BadMagic);
        }

        let flags6 = bytes[6];
        let flags7 = bytes[7];
        let nes2 = (flags7 & 0x0C) == 0x08;

        let mut mapper_id = ((flags6 as u16) >> 4) | ((flags7 as u16) & 0xF0);
        let mut submapper_id = 0;
        if nes2 {
            mapper_id |= ((bytes[8] as u16) & 0x0F) << 8;
            submapper_id = bytes[8] >> 4;
        }

        let mirroring = match (flags6 & 0x08 != 0, flags6 & 0x01 != 0) {
            (true, _) => Mirroring::FourScreen,
            (false, true) => Mirroring::Vertical,
            (false, false) => Mirroring::Horizontal,
        };

        let (prg_units, chr_units, prg_ram_size) = if nes2 {
            let prg_msb = (bytes[9] & 0x0F) as usize;
            let chr_msb = (bytes[9] >> 4) as usize;
            if prg_msb == 0x0F || chr_msb == 0x0F {
                return Err(CartridgeError::ExponentSize);
            }
            let ram_shift = bytes[10] & 0x0F;
            let prg_ram = if ram_shift == 0 { 0 } else { 64usize << ram_shift };
            (
                (prg_msb << 8) | bytes[4] as usize,
                (chr_msb << 8) | bytes[5] as usize,
                prg_ram,
            )
        } else {
            let ram_units = (bytes[8] as usize).max(1);
            (bytes[4] as usize, bytes[5] as usize, ram_units * 8 * 1024)
        };

        Ok(Self {
            mapper_id,
            submapper_id,
            mirroring,
            trainer: (flags6 & 0x04) != 0,
            prg_rom_size: prg_units.max(1) * PRG_UNIT,
            chr_rom_size: chr_units * CHR_UNIT,
            prg_ram_size,
        })
    }
}

fn take<'a>(
    bytes: &'a [u8],
    cursor: &mut usize,
    len: usize,
    section: &'static str,
) -> Result<&'a [u8], CartridgeError> {
    let left = bytes.len().saturating_sub(*cursor);
    if left < len {
        return Err(CartridgeError::Truncated {
            section,
            expected: len,
            found: left,
        });
    }
    let chunk = &bytes[*cursor..*cursor + len];
    *cursor += len;
    Ok(chunk)
}

impl Cartridge {
    pub fn from_file(path: &Path) -> Result<Self, CartridgeError> {
        let bytes = fs::read(path).map_err(|source| CartridgeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CartridgeError> {
        let header = Header::parse(bytes)?;
        if !is_supported(header.mapper_id) {
            return Err(CartridgeError::UnsupportedMapper {
                id: header.mapper_id,
            });
        }

        let mut cursor = HEADER_LEN;
        if header.trainer {
            take(bytes, &mut cursor, TRAINER_LEN, "trainer")?;
        }
        let prg_rom = take(bytes, &mut cursor, header.prg_rom_size, "PRG ROM")?.to_vec();

        // No CHR ROM means the board carries 8 KiB of CHR RAM.
        let chr_is_ram = header.chr_rom_size == 0;
        let chr_data = if chr_is_ram {
            vec![0; CHR_UNIT]
        } else {
            take(bytes, &mut cursor, header.chr_rom_size, "CHR ROM")?.to_vec()
        };

        log::debug!(
            "cartridge: mapper {}.{} PRG {} KiB CHR {} KiB{} {:?}",
            header.mapper_id,
            header.submapper_id,
            prg_rom.len() / 1024,
            chr_data.len() / 1024,
            if chr_is_ram { " (RAM)" } else { "" },
            header.mirroring
        );

        Ok(Self {
            mapper_id: header.mapper_id,
            submapper_id: header.submapper_id,
            mirroring: header.mirroring,
            prg_rom,
            chr_data,
            chr_is_ram,
            prg_ram_size: header.prg_ram_size,
        })
    }

    // Every 8 KiB PRG bank and 1 KiB CHR bank holds its own index.
    pub fn blank(mapper_id: u16, submapper_id: u8, prg_banks_8k: usize, chr_banks_1k: usize) -> Self {
        Self {
            mapper_id,
            submapper_id,
            mirroring: Mirroring::Vertical,
            prg_rom: patterned_banks(prg_banks_8k.max(1) * 0x2000, 0x2000),
            chr_data: patterned_banks(chr_banks_1k.max(1) * 0x0400, 0x0400),
            chr_is_ram: false,
            prg_ram_size: 8 * 1024,
        }
    }
}

fn patterned_banks(total_size: usize, bank_size: usize) -> Vec<u8> {
    let mut data = vec![0u8; total_size];
    for (bank, chunk) in data.chunks_mut(bank_size).enumerate() {
        chunk.fill(bank as u8);
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(prg_16k: u8, chr_8k: u8, flags6: u8, flags7: u8) -> Vec<u8> {
        let mut bytes = vec![0u8; 16];
        bytes[0..4].copy_from_slice(b"NES\x1A");
        bytes[4] = prg_16k;
        bytes[5] = chr_8k;
        bytes[6] = flags6;
        bytes[7] = flags7;
        bytes
    }

    #[test]
    fn parses_ines_mapper_222() {
        let mut rom = header(2, 1, 0xE1, 0xD0);
        rom.extend(vec![0xEA; 2 * 0x4000 + 0x2000]);
        let cart = Cartridge::from_bytes(&rom).unwrap();
        assert_eq!(cart.mapper_id, 222);
        assert_eq!(cart.mirroring, Mirroring::Vertical);
        assert_eq!(cart.prg_rom.len(), 0x8000);
        assert_eq!(cart.chr_data.len(), 0x2000);
        assert!(!cart.chr_is_ram);
    }

    #[test]
    fn parses_nes2_submapper() {
        let mut rom = header(2, 0, 0x40, 0x08);
        rom[8] = 0x40;
        rom.extend(vec![0; 2 * 0x4000]);
        let cart = Cartridge::from_bytes(&rom).unwrap();
        assert_eq!(cart.mapper_id, 4);
        assert_eq!(cart.submapper_id, 4);
        assert!(cart.chr_is_ram);
        assert_eq!(cart.chr_data.len(), 0x2000);
    }

    #[test]
    fn skips_trainer_before_prg() {
        let mut rom = header(1, 1, 0x44, 0x00);
        rom.extend(vec![0xFF; 512]);
        rom.extend(vec![0x11; 0x4000]);
        rom.extend(vec![0x22; 0x2000]);
        let cart = Cartridge::from_bytes(&rom).unwrap();
        assert_eq!(cart.prg_rom[0], 0x11);
        assert_eq!(cart.chr_data[0], 0x22);
        assert_eq!(cart.mirroring, Mirroring::Horizontal);
    }

    #[test]
    fn four_screen_flag_wins_over_mirroring_bit() {
        let mut rom = header(1, 1, 0x49, 0x00);
        rom.extend(vec![0; 0x4000 + 0x2000]);
        assert_eq!(
            Cartridge::from_bytes(&rom).unwrap().mirroring,
            Mirroring::FourScreen
        );
    }

    #[test]
    fn rejects_truncated_prg() {
        let mut rom = header(2, 0, 0x40, 0x00);
        rom.extend(vec![0; 0x4000]);
        assert!(matches!(
            Cartridge::from_bytes(&rom),
            Err(CartridgeError::Truncated {
                section: "PRG ROM",
                expected: 0x8000,
                found: 0x4000
            })
        ));
    }

    #[test]
    fn rejects_truncated_chr() {
        let mut rom = header(1, 1, 0x40, 0x00);
        rom.extend(vec![0; 0x4000 + 0x100]);
        assert!(matches!(
            Cartridge::from_bytes(&rom),
            Err(CartridgeError::Truncated {
                section: "CHR ROM",
                ..
            })
        ));
    }

    #[test]
    fn rejects_bad_magic_and_short_files() {
        let mut rom = header(1, 0, 0x40, 0);
        rom[3] = 0;
        assert!(matches!(
            Cartridge::from_bytes(&rom),
            Err(CartridgeError::BadMagic)
        ));
        assert!(matches!(
            Cartridge::from_bytes(&rom[..8]),
            Err(CartridgeError::TooSmall { len: 8 })
        ));
    }

    #[test]
    fn rejects_mapper_without_irq_chip() {
        let mut rom = header(1, 1, 0x10, 0x00);
        rom.extend(vec![0; 0x4000 + 0x2000]);
        assert!(matches!(
            Cartridge::from_bytes(&rom),
            Err(CartridgeError::UnsupportedMapper { id: 1 })
        ));
    }

    #[test]
    fn blank_board_tags_each_bank() {
        let cart = Cartridge::blank(4, 0, 8, 16);
        assert_eq!(cart.prg_rom.len(), 8 * 0x2000);
        assert_eq!(cart.prg_rom[3 * 0x2000 + 17], 3);
        assert_eq!(cart.chr_data[15 * 0x0400], 15);
    }
}
