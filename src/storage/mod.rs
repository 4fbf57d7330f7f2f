//! Removable storage: the SD card contract, the mount step and file name helpers.

#[cfg(any(test, feature = "std"))]
pub mod host;
pub mod sd_clock;

use crate::config::{BusWidth, MountConfig, PinId, Pull, SdHostConfig, SdSlotConfig};
use core::fmt;
use heapless::{consts, String};

/// Errors shared by storage backends. `E` is the backend's own device error.
#[derive(Debug, Eq, PartialEq)]
pub enum StorageError<E> {
    /// No card answered, or the card holds no usable FAT volume.
    NoCard,
    /// File operation before a successful mount.
    NotMounted,
    /// `max_files` handles are already open.
    TooManyOpenFiles,
    /// Path outside the mount point or not representable on the card.
    BadPath,
    /// Error from the card or filesystem.
    Device(E),
}

/// SD card kind reported after identification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CardKind {
    /// Standard capacity, byte addressed.
    Sdsc,
    /// High or extended capacity, block addressed.
    Sdhc,
    Mmc,
}

/// What the card told us about itself during mount.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CardInfo {
    /// Product name from the CID register.
    pub name: String<consts::U8>,
    pub kind: CardKind,
    pub capacity_bytes: u64,
    pub bus_width: BusWidth,
    pub freq_khz: u32,
}

impl fmt::Display for CardInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            CardKind::Sdsc => "SDSC",
            CardKind::Sdhc => "SDHC/SDXC",
            CardKind::Mmc => "MMC",
        };
        write!(
            f,
            "Name: {}, Type: {}, Speed: {} kHz, Size: {}MB, Bus width: {}",
            self.name,
            kind,
            self.freq_khz,
            self.capacity_bytes / (1024 * 1024),
            self.bus_width.lines()
        )
    }
}

/// Any storage device that implements this trait can hold the captured images. Files are
/// handles owned by the caller and written through the device, so a file can't outlive a
/// `close`.
pub trait Storage {
    type Error: fmt::Debug;
    type File;

    /// Set the bias of one bus signal line.
    fn set_pull(&mut self, pin: PinId, pull: Pull) -> Result<(), Self::Error>;

    /// Bring up the card and attach its filesystem at `mount.base_path`.
    fn mount(
        &mut self,
        host: &SdHostConfig,
        slot: &SdSlotConfig,
        mount: &MountConfig,
    ) -> Result<CardInfo, Self::Error>;

    fn is_mounted(&self) -> bool;

    /// Create or truncate `path` for writing.
    fn open_write(&mut self, path: &str) -> Result<Self::File, Self::Error>;

    /// Write `data`, returning how many bytes were accepted.
    fn write(&mut self, file: &mut Self::File, data: &[u8]) -> Result<usize, Self::Error>;

    /// Flush and release the handle.
    fn close(&mut self, file: Self::File) -> Result<(), Self::Error>;
}

/// Bias the slot's signal lines, then mount the card. No retry, and never a format.
pub fn mount_storage<S: Storage>(
    storage: &mut S,
    host: &SdHostConfig,
    slot: &SdSlotConfig,
    mount: &MountConfig,
) -> Result<CardInfo, S::Error> {
    for &pin in slot.signal_pins().iter() {
        if let Err(e) = storage.set_pull(pin, slot.pull) {
            log_warn!("SD Card", "Failed to set pull on {} ({:?})", pin, e);
        }
    }

    match storage.mount(host, slot, mount) {
        Ok(card) => {
            log_info!("SD Card", "{}", card);
            log_info!("SD Card", "SD card mounted successfully");
            Ok(card)
        }
        Err(e) => {
            log_error!("SD Card", "Failed to mount filesystem ({:?})", e);
            Err(e)
        }
    }
}

/// Path of `path` relative to the mount point `base`, `None` if it lies outside.
pub fn relative_path<'a>(base: &str, path: &'a str) -> Option<&'a str> {
    let rest = path.strip_prefix(base)?;
    let rest = rest.strip_prefix('/')?;
    if rest.is_empty() || rest.contains('/') {
        None
    } else {
        Some(rest)
    }
}

/// Map a file name onto FAT 8.3. Stems longer than eight characters lose their underscores,
/// so `image_000.jpg` becomes `IMAGE000.JPG`. `None` if it still doesn't fit.
pub fn short_name(name: &str) -> Option<String<consts::U12>> {
    let (stem, ext) = match name.rfind('.') {
        Some(dot) => (&name[..dot], &name[dot + 1..]),
        None => (name, ""),
    };

    let squeeze = stem.len() > 8;
    let mut out: String<consts::U12> = String::new();
    let mut stem_len = 0;
    for c in stem.chars().filter(|&c| !(squeeze && c == '_')) {
        if !c.is_ascii_alphanumeric() && c != '_' && c != '-' {
            return None;
        }
        stem_len += 1;
        if stem_len > 8 {
            return None;
        }
        out.push(c.to_ascii_uppercase()).ok()?;
    }
    if stem_len == 0 || ext.len() > 3 {
        return None;
    }

    if !ext.is_empty() {
        out.push('.').ok()?;
        for c in ext.chars() {
            if !c.is_ascii_alphanumeric() {
                return None;
            }
            out.push(c.to_ascii_uppercase()).ok()?;
        }
    }

    Some(out)
}
