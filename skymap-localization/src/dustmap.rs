//! File-backed E(B−V) lookup on a HEALPix grid.
//!
//! Layout: a 16-byte header (magic `SKYD`, version, order, reserved) followed
//! by `12 · 4^order` little-endian `f32` reddening values in nested order.
//! NaN marks cells without data.

use std::fs::{File, OpenOptions};
use std::path::Path;

use anyhow::{bail, Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use memmap2::{Mmap, MmapMut};
use skymap_coords::ICRSPosition;
use skymap_healpix::{ang2pix_nest, npix};

use crate::errors::ExtinctionError;
use crate::summary::ExtinctionLookup;

const DUST_MAGIC: &[u8; 4] = b"SKYD";
const DUST_VERSION: u32 = 1;
const HEADER_SIZE: usize = 16;
const VALUE_SIZE: usize = 4;
const MAX_DUST_ORDER: u32 = 16;

pub struct HealpixDustMap {
    mmap: Mmap,
    order: u32,
}

impl HealpixDustMap {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("Failed to open dust map: {:?}", path))?;
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to memory-map dust map: {:?}", path))?;

        if mmap.len() < HEADER_SIZE {
            bail!("Dust map too small: {} bytes", mmap.len());
        }
        let magic = &mmap[0..4];
        if magic != DUST_MAGIC {
            bail!(
                "Invalid dust map magic: expected {:?}, got {:?}",
                DUST_MAGIC,
                magic
            );
        }
        let version = LittleEndian::read_u32(&mmap[4..8]);
        if version != DUST_VERSION {
            bail!(
                "Unsupported dust map version: expected {}, got {}",
                DUST_VERSION,
                version
            );
        }
        let order = LittleEndian::read_u32(&mmap[8..12]);
        if order > MAX_DUST_ORDER {
            bail!("Dust map order {} is not supported", order);
        }
        let expected = npix(order)
            .checked_mul(VALUE_SIZE as u64)
            .and_then(|bytes| bytes.checked_add(HEADER_SIZE as u64))
            .with_context(|| format!("Dust map order {} overflows the file size", order))?;
        if (mmap.len() as u64) < expected {
            bail!(
                "Dust map too small for order {}: {} bytes, expected {}",
                order,
                mmap.len(),
                expected
            );
        }

        log::debug!("opened dust map {:?} at order {}", path, order);
        Ok(Self { mmap, order })
    }

    /// Writes a full-sky grid of E(B−V) values in nested order.
    pub fn write(path: impl AsRef<Path>, order: u32, values: &[f32]) -> Result<()> {
        let path = path.as_ref();
        if order > MAX_DUST_ORDER {
            bail!("Dust map order {} is not supported", order);
        }
        if values.len() as u64 != npix(order) {
            bail!(
                "Dust map at order {} needs {} values, got {}",
                order,
                npix(order),
                values.len()
            );
        }

        let size = HEADER_SIZE + values.len() * VALUE_SIZE;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Failed to create dust map: {:?}", path))?;
        file.set_len(size as u64)?;
        let mut mmap = unsafe { MmapMut::map_mut(&file) }
            .with_context(|| format!("Failed to memory-map dust map: {:?}", path))?;

        mmap[0..4].copy_from_slice(DUST_MAGIC);
        LittleEndian::write_u32(&mut mmap[4..8], DUST_VERSION);
        LittleEndian::write_u32(&mut mmap[8..12], order);
        LittleEndian::write_u32(&mut mmap[12..16], 0);
        LittleEndian::write_f32_into(values, &mut mmap[HEADER_SIZE..size]);
        mmap.flush()?;
        Ok(())
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    /// Stored value of one nested pixel.
    pub fn value(&self, ipix: u64) -> Option<f32> {
        if ipix >= npix(self.order) {
            return None;
        }
        let at = HEADER_SIZE + ipix as usize * VALUE_SIZE;
        Some(LittleEndian::read_f32(&self.mmap[at..at + VALUE_SIZE]))
    }
}

impl ExtinctionLookup for HealpixDustMap {
    fn ebv(&self, position: &ICRSPosition) -> Result<f64, ExtinctionError> {
        let (ra, dec) = (position.ra_degrees(), position.dec_degrees());
        let ipix = ang2pix_nest(self.order, ra, dec);
        match self.value(ipix) {
            Some(v) if v.is_finite() => Ok(f64::from(v)),
            _ => Err(ExtinctionError::OutOfRange { ra, dec }),
        }
    }
}
