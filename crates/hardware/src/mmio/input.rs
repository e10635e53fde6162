//! Key and touch-screen registers (`press_key`/
//! `release_key`/`press_screen`/`release_screen`, exposed to the guest
//! the way the real hardware's HID and touch-panel controllers are: a
//! bitmask register and a pair of ADC sample registers).

use super::Register;

const KEYS: u32 = 0x00;
const TOUCH_X: u32 = 0x04;
const TOUCH_Y: u32 = 0x08;
const TOUCH_STATUS: u32 = 0x0C;

const TOUCH_PRESSED_BIT: u32 = 1;

/// Number of distinct key indices the input register layout defines
/// (`idx ∈ {0..11}`).
pub const KEY_COUNT: u32 = 12;

/// ADC sample range for the touch panel (12-bit ADC, matching the real
/// touch-screen controller this register layout stands in for).
const TOUCH_ADC_MAX: u32 = 0xFFF;

/// Key and touch-panel register file.
pub struct InputController {
    /// Bit `n` set means key `n` is *not* pressed (active-low, matching
    /// the real HID register polarity so `0xFFF` is the idle state).
    keys: Register,
    touch_x: Register,
    touch_y: Register,
    touch_status: Register,
}

impl InputController {
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: Register::read_only((1 << KEY_COUNT) - 1),
            touch_x: Register::read_only(0),
            touch_y: Register::read_only(0),
            touch_status: Register::read_only(0),
        }
    }

    /// Clears key `idx`'s active-low bit (`press_key`).
    pub fn press_key(&mut self, idx: u32) {
        if idx < KEY_COUNT {
            self.keys.value &= !(1 << idx);
        }
    }

    /// Sets key `idx`'s active-low bit back (`release_key`).
    pub fn release_key(&mut self, idx: u32) {
        if idx < KEY_COUNT {
            self.keys.value |= 1 << idx;
        }
    }

    /// Translates normalized screen coordinates (`0.0..=1.0` on each
    /// axis) to the touch controller's 12-bit ADC range and marks the
    /// panel pressed.
    pub fn press_screen(&mut self, x: f32, y: f32) {
        self.touch_x.value = (x.clamp(0.0, 1.0) * TOUCH_ADC_MAX as f32) as u32;
        self.touch_y.value = (y.clamp(0.0, 1.0) * TOUCH_ADC_MAX as f32) as u32;
        self.touch_status.value |= TOUCH_PRESSED_BIT;
    }

    /// Marks the touch panel released; ADC registers hold their last
    /// sample (matches real touch controllers, which do not reset to
    /// zero on release).
    pub fn release_screen(&mut self) {
        self.touch_status.value &= !TOUCH_PRESSED_BIT;
    }

    #[must_use]
    pub fn read(&self, offset: u32) -> u32 {
        match offset & !3 {
            KEYS => self.keys.value,
            TOUCH_X => self.touch_x.value,
            TOUCH_Y => self.touch_y.value,
            TOUCH_STATUS => self.touch_status.value,
            _ => 0,
        }
    }

    /// Guest writes to the input registers are ignored: they are
    /// host-driven only (has no guest-writable input path).
    pub fn write(&mut self, _offset: u32, _mask: u32, _value: u32) {}
}

impl Default for InputController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pressing_a_key_clears_its_active_low_bit() {
        let mut ic = InputController::new();
        ic.press_key(2);
        assert_eq!(ic.read(KEYS) & (1 << 2), 0);
        ic.release_key(2);
        assert_eq!(ic.read(KEYS) & (1 << 2), 1 << 2);
    }

    #[test]
    fn press_screen_scales_into_adc_range_and_sets_pressed() {
        let mut ic = InputController::new();
        ic.press_screen(1.0, 0.0);
        assert_eq!(ic.read(TOUCH_X), TOUCH_ADC_MAX);
        assert_eq!(ic.read(TOUCH_Y), 0);
        assert_eq!(ic.read(TOUCH_STATUS) & TOUCH_PRESSED_BIT, TOUCH_PRESSED_BIT);
        ic.release_screen();
        assert_eq!(ic.read(TOUCH_STATUS) & TOUCH_PRESSED_BIT, 0);
    }
}
