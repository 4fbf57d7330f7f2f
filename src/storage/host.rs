//! Directory-backed storage for running the capture flow on a development host. The mount
//! point maps onto a directory, so `/sdcard/image_000.jpg` lands in `<root>/image_000.jpg`.

use super::{relative_path, CardInfo, CardKind, Storage, StorageError};
use crate::config::{MountConfig, PinId, Pull, SdHostConfig, SdSlotConfig};
use heapless::String;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::vec::Vec;

/// Storage rooted at a host directory.
pub struct HostStorage {
    root: PathBuf,
    base_path: &'static str,
    mounted: bool,
    open_files: usize,
    max_files: usize,
    /// Pulls requested through `set_pull`, in order.
    pub pulls: Vec<(PinId, Pull)>,
}

impl HostStorage {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        HostStorage {
            root: root.into(),
            base_path: "",
            mounted: false,
            open_files: 0,
            max_files: 0,
            pulls: Vec::new(),
        }
    }
}

impl Storage for HostStorage {
    type Error = StorageError<io::ErrorKind>;
    type File = File;

    fn set_pull(&mut self, pin: PinId, pull: Pull) -> Result<(), Self::Error> {
        self.pulls.push((pin, pull));
        Ok(())
    }

    fn mount(
        &mut self,
        host: &SdHostConfig,
        _slot: &SdSlotConfig,
        mount: &MountConfig,
    ) -> Result<CardInfo, Self::Error> {
        // A missing directory is the host's version of an empty slot
        if !self.root.is_dir() {
            return Err(StorageError::NoCard);
        }

        self.base_path = mount.base_path;
        self.max_files = mount.max_files;
        self.mounted = true;

        Ok(CardInfo {
            name: String::from("HOST"),
            kind: CardKind::Sdhc,
            capacity_bytes: 0,
            bus_width: host.bus_width,
            freq_khz: host.max_freq_khz,
        })
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn open_write(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        if self.open_files >= self.max_files {
            return Err(StorageError::TooManyOpenFiles);
        }

        let name = relative_path(self.base_path, path).ok_or(StorageError::BadPath)?;
        let file = File::create(self.root.join(name)).map_err(|e| StorageError::Device(e.kind()))?;
        self.open_files += 1;
        Ok(file)
    }

    fn write(&mut self, file: &mut Self::File, data: &[u8]) -> Result<usize, Self::Error> {
        file.write_all(data)
            .map_err(|e| StorageError::Device(e.kind()))?;
        Ok(data.len())
    }

    fn close(&mut self, file: Self::File) -> Result<(), Self::Error> {
        self.open_files -= 1;
        file.sync_all().map_err(|e| StorageError::Device(e.kind()))
    }
}
