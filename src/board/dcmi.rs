//! Parallel pixel bus from the OV2640 using the STM32F7 DCMI peripheral and DMA2. The DCMI
//! runs in snapshot mode with JPEG enabled: one frame per capture, moved into memory by the
//! DMA one 32-bit word at a time. Assumes the DCMI GPIOs are configured before `setup`.

use stm32f7xx_hal::pac::{DCMI, DMA2, RCC};

// DMA2-Stream 1-Channel 1 is used to interface with DCMI
const DMA_STREAM: usize = 1;
const DMA_CHANNEL: u8 = 1;

// DCMI data register address
const DCMI_DR_ADDR: u32 = 0x5005_0000 + 0x28;

// DCMI RIS bits
const RIS_FRAME: u32 = 1 << 0;
const RIS_OVR: u32 = 1 << 1;
const RIS_ERR: u32 = 1 << 2;

// DMA2 LISR bits for stream 1
const LISR_TEIF1: u32 = 1 << 9;
const LISR_TCIF1: u32 = 1 << 11;
const LISR_STREAM1: u32 = 0xF40;

/// Largest DMA transfer in 32-bit words (NDTR is 16 bits).
pub const MAX_WORDS: usize = 0xFFFF;

/// DCMI errors.
#[derive(Debug, Eq, PartialEq)]
pub enum DcmiError {
    /// No complete frame before the timeout.
    Timeout,
    /// The DCMI FIFO overflowed.
    Overrun,
    /// Embedded sync error.
    Sync,
    /// DMA transfer error.
    Dma,
    /// The frame filled the whole buffer.
    BufferFull,
}

/// Setup the DCMI peripheral for JPEG snapshots.
pub fn setup() {
    let dcmi_regs = unsafe { &(*DCMI::ptr()) };
    let rcc_regs = unsafe { &(*RCC::ptr()) };

    // Enable peripheral clocks
    rcc_regs.ahb2enr.modify(|_, w| w.dcmien().set_bit());
    rcc_regs.ahb1enr.modify(|_, w| w.dma2en().set_bit());

    // Sync polarity, snapshot capture and JPEG (HREF ignored, every byte is data)
    dcmi_regs.cr.write(|w| {
        w.vspol()
            .set_bit()
            .hspol()
            .clear_bit()
            .pckpol()
            .set_bit()
            .cm()
            .set_bit()
            .jpeg()
            .set_bit()
    });

    // Polled, no interrupts
    dcmi_regs.ier.write(|w| unsafe { w.bits(0) });
}

/// Point DMA2 at `dest_addr` for up to `words` 32-bit words and arm a single snapshot.
pub fn start_snapshot(dest_addr: u32, words: u16) {
    let dma2_regs = unsafe { &(*DMA2::ptr()) };
    let dcmi_regs = unsafe { &(*DCMI::ptr()) };

    // The stream must be off before it can be reprogrammed
    dma2_regs.st[DMA_STREAM]
        .cr
        .modify(|_, w| w.en().clear_bit());
    while dma2_regs.st[DMA_STREAM].cr.read().en().bit_is_set() {}

    unsafe {
        // Clear any stale interrupts
        let dma2_int_status_lo = dma2_regs.lisr.read().bits();
        dma2_regs.lifcr.write(|w| w.bits(dma2_int_status_lo & LISR_STREAM1));
        dcmi_regs.icr.write(|w| w.bits(RIS_FRAME | RIS_OVR | RIS_ERR));

        // Configure DMA
        dma2_regs.st[DMA_STREAM].cr.write(|w| {
            w
                // Flow controller (0 = DMA, 1 = peripheral)
                .pfctrl()
                .clear_bit()
                // Direction
                .dir()
                .peripheral_to_memory()
                // One shot, the frame length is unknown until the DCMI says it is done
                .circ()
                .clear_bit()
                // Peripheral address increment
                .pinc()
                .clear_bit()
                // Memory address increment
                .minc()
                .set_bit()
                // Peripheral transfer size
                .psize()
                .bits32()
                // Memory transfer size
                .msize()
                .bits32()
                // Priority level
                .pl()
                .high()
                // Double buffer mode
                .dbm()
                .clear_bit()
                // Peripheral burst
                .pburst()
                .single()
                // Memory burst
                .mburst()
                .single()
                // Channel
                .chsel()
                .bits(DMA_CHANNEL)
        });
    }

    // Configure address and size
    dma2_regs.st[DMA_STREAM]
        .ndtr
        .write(|w| w.ndt().bits(words));
    dma2_regs.st[DMA_STREAM]
        .par
        .write(|w| w.pa().bits(DCMI_DR_ADDR));
    dma2_regs.st[DMA_STREAM]
        .m0ar
        .write(|w| w.m0a().bits(dest_addr));

    // Enable DMA2
    dma2_regs.st[DMA_STREAM].cr.modify(|_, w| w.en().set_bit());

    // Enable the DCMI peripheral and start capture
    dcmi_regs
        .cr
        .modify(|_, w| w.enable().set_bit().capture().set_bit());
}

/// Poll until the snapshot completes. Returns the number of bytes moved into memory.
pub fn wait_frame(words: u16, timeout: u32) -> Result<usize, DcmiError> {
    let dma2_regs = unsafe { &(*DMA2::ptr()) };
    let dcmi_regs = unsafe { &(*DCMI::ptr()) };

    let mut cnt: u32 = 0;
    let result = loop {
        let ris = dcmi_regs.ris.read().bits();
        let lisr = dma2_regs.lisr.read().bits();

        if ris & RIS_OVR != 0 {
            break Err(DcmiError::Overrun);
        } else if ris & RIS_ERR != 0 {
            break Err(DcmiError::Sync);
        } else if lisr & LISR_TEIF1 != 0 {
            break Err(DcmiError::Dma);
        } else if ris & RIS_FRAME != 0 {
            let remaining = dma2_regs.st[DMA_STREAM].ndtr.read().ndt().bits();
            break Ok((usize::from(words) - usize::from(remaining)) * 4);
        } else if lisr & LISR_TCIF1 != 0 {
            break Err(DcmiError::BufferFull);
        }

        cnt += 1;
        if cnt == timeout {
            break Err(DcmiError::Timeout);
        }
    };

    stop_capture();
    result
}

/// Stop DCMI capture.
pub fn stop_capture() {
    let dma2_regs = unsafe { &(*DMA2::ptr()) };
    let dcmi_regs = unsafe { &(*DCMI::ptr()) };

    // Disable the DCMI peripheral and stop capture
    dcmi_regs
        .cr
        .modify(|_, w| w.enable().clear_bit().capture().clear_bit());

    // Disable DMA2
    dma2_regs.st[DMA_STREAM]
        .cr
        .modify(|_, w| w.en().clear_bit());

    unsafe {
        dcmi_regs.icr.write(|w| w.bits(RIS_FRAME | RIS_OVR | RIS_ERR));
    }
}
