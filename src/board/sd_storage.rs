//! `Storage` backed by the microSD card: `SdmmcDriver` for the blocks, `embedded-sdmmc` for
//! FAT. The library only knows 8.3 names, so file names go through `storage::short_name`.

use super::sdmmc::{SdmmcDriver, SdmmcError};
use crate::config::{MountConfig, PinId, Pull, SdHostConfig, SdSlotConfig};
use crate::storage::{relative_path, short_name, CardInfo, Storage, StorageError};
use embedded_sdmmc::{
    Controller, Directory, File, Mode, TimeSource, Timestamp, Volume, VolumeIdx,
};

/// The board has no battery backed clock, every file gets the same timestamp.
pub struct FixedClock;

impl TimeSource for FixedClock {
    fn get_timestamp(&self) -> Timestamp {
        // 2021-01-01 00:00:00
        Timestamp {
            year_since_1970: 51,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

type SdError = embedded_sdmmc::Error<SdmmcError>;

/// An open FAT volume and its root directory.
struct Mounted {
    volume: Volume,
    root: Directory,
}

pub struct SdStorage {
    controller: Controller<SdmmcDriver, FixedClock>,
    fs: Option<Mounted>,
    base_path: &'static str,
    max_files: usize,
    open_files: usize,
}

impl SdStorage {
    pub fn new(driver: SdmmcDriver) -> Self {
        SdStorage {
            controller: Controller::new(driver, FixedClock),
            fs: None,
            base_path: "",
            max_files: 0,
            open_files: 0,
        }
    }
}

impl Storage for SdStorage {
    type Error = StorageError<SdError>;
    type File = File;

    fn set_pull(&mut self, pin: PinId, pull: Pull) -> Result<(), Self::Error> {
        super::set_pull(pin, pull).map_err(|_| StorageError::BadPath)
    }

    fn mount(
        &mut self,
        host: &SdHostConfig,
        _slot: &SdSlotConfig,
        mount: &MountConfig,
    ) -> Result<CardInfo, Self::Error> {
        self.fs = None;

        let card = self.controller.device().init(host).map_err(|e| match e {
            SdmmcError::CmdTimeout(_) => StorageError::NoCard,
            e => StorageError::Device(embedded_sdmmc::Error::DeviceError(e)),
        })?;

        let volume = self.controller.get_volume(VolumeIdx(0));
        let opened = match volume {
            Ok(volume) => self
                .controller
                .open_root_dir(&volume)
                .map(|root| Mounted { volume, root }),
            Err(e) => Err(e),
        };

        match opened {
            Ok(fs) => {
                self.fs = Some(fs);
                self.base_path = mount.base_path;
                self.max_files = mount.max_files;
                Ok(card)
            }
            Err(e) => {
                if mount.format_if_mount_failed {
                    log_warn!("SD Card", "Formatting is not supported, leaving the card as is");
                }
                Err(StorageError::Device(e))
            }
        }
    }

    fn is_mounted(&self) -> bool {
        self.fs.is_some()
    }

    fn open_write(&mut self, path: &str) -> Result<File, Self::Error> {
        let fs = self.fs.as_mut().ok_or(StorageError::NotMounted)?;
        if self.open_files >= self.max_files {
            return Err(StorageError::TooManyOpenFiles);
        }

        let name = relative_path(self.base_path, path)
            .and_then(short_name)
            .ok_or(StorageError::BadPath)?;

        let file = self
            .controller
            .open_file_in_dir(
                &mut fs.volume,
                &fs.root,
                &name,
                Mode::ReadWriteCreateOrTruncate,
            )
            .map_err(StorageError::Device)?;
        self.open_files += 1;
        Ok(file)
    }

    fn write(&mut self, file: &mut File, data: &[u8]) -> Result<usize, Self::Error> {
        let fs = self.fs.as_mut().ok_or(StorageError::NotMounted)?;
        self.controller
            .write(&mut fs.volume, file, data)
            .map_err(StorageError::Device)
    }

    fn close(&mut self, file: File) -> Result<(), Self::Error> {
        let fs = self.fs.as_mut().ok_or(StorageError::NotMounted)?;
        self.open_files = self.open_files.saturating_sub(1);
        self.controller
            .close_file(&fs.volume, file)
            .map_err(StorageError::Device)
    }
}
