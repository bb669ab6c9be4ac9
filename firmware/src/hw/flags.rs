//! Persistent update-request marker in the last flash page.

#![cfg(target_os = "none")]

use embassy_stm32::flash::Flash;
use embassy_stm32::mode::Blocking;

use node_core::command::{FlagError, FlagStore};

/// Byte offset of the marker page: the last 2 KiB page of the 512 KiB bank.
const MARKER_OFFSET: u32 = 512 * 1024 - PAGE_SIZE;
const PAGE_SIZE: u32 = 2048;

/// Double-word written into the marker page. The boot loader only checks the
/// page's presence-of-marker, not its contents.
const MARKER: [u8; 8] = *b"OTA-REQ\0";

pub struct OtaFlagStore {
    flash: Flash<'static, Blocking>,
}

impl OtaFlagStore {
    pub fn new(flash: Flash<'static, Blocking>) -> Self {
        Self { flash }
    }
}

impl FlagStore for OtaFlagStore {
    fn write_update_marker(&mut self) -> Result<(), FlagError> {
        self.flash
            .blocking_erase(MARKER_OFFSET, MARKER_OFFSET + PAGE_SIZE)
            .map_err(|_| FlagError::WriteFailed)?;
        self.flash
            .blocking_write(MARKER_OFFSET, &MARKER)
            .map_err(|_| FlagError::WriteFailed)
    }
}
