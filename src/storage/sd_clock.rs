//! SD bus clock arithmetic for an SDMMC host with an 8-bit divider, where
//! `SDMMC_CK = kernel / (CLKDIV + 2)`.

/// 48 MHz domain clock produced by the main PLL's Q output, from a raw RCC_PLLCFGR value.
pub fn pll48_freq(pllcfgr: u32, hse_hz: u32) -> u32 {
    let pllm = pllcfgr & 0x3F;
    let plln = (pllcfgr >> 6) & 0x1FF;
    let pllq = (pllcfgr >> 24) & 0xF;
    // PLLSRC: 1 = HSE, 0 = HSI
    let src_hz = if pllcfgr & (1 << 22) != 0 {
        hse_hz
    } else {
        16_000_000
    };
    if pllm == 0 || pllq < 2 {
        return 0;
    }
    ((u64::from(src_hz) / u64::from(pllm)) * u64::from(plln) / u64::from(pllq)) as u32
}

/// CLKDIV for at most `khz` from `kernel_hz`. Saturates at 255, so a fast kernel clock can
/// still end up above `khz`; check with `bus_khz`.
pub fn clock_divider(kernel_hz: u32, khz: u32) -> u8 {
    let target = khz.max(1) * 1000;
    let div = (kernel_hz + target - 1) / target;
    div.saturating_sub(2).min(0xFF) as u8
}

/// Bus clock in kHz for divider `div`.
pub fn bus_khz(kernel_hz: u32, div: u8) -> u32 {
    kernel_hz / (u32::from(div) + 2) / 1000
}
