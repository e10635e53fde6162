//! SD/MMC media register surface: command/argument/response registers
//! and a block-address counter. The filesystem and block-device backing
//! are host collaborators; this models only the register interface
//! guest code pokes.

use super::Register;

const COMMAND: u32 = 0x00;
const ARGUMENT: u32 = 0x04;
const RESPONSE: u32 = 0x08;
const BLOCK_ADDR: u32 = 0x0C;
const STATUS: u32 = 0x10;

const READY_BIT: u32 = 1;

/// SD/MMC-like storage controller register file.
pub struct Storage {
    command: Register,
    argument: Register,
    response: Register,
    block_addr: Register,
    status: Register,
}

impl Storage {
    #[must_use]
    pub fn new() -> Self {
        Self {
            command: Register::new(0, 0xFF),
            argument: Register::new(0, 0xFFFF_FFFF),
            response: Register::read_only(0),
            block_addr: Register::new(0, 0xFFFF_FFFF),
            status: Register::new(READY_BIT, 0),
        }
    }

    /// Sets the response register, e.g. after a host-driven block read
    /// completes; `command` indicates which command this responds to
    /// (unused by this minimal model, kept for callers that log it).
    pub fn set_response(&mut self, _command: u32, value: u32) {
        self.response.value = value;
    }

    #[must_use]
    pub fn read(&self, offset: u32) -> u32 {
        match offset & !3 {
            COMMAND => self.command.value,
            ARGUMENT => self.argument.value,
            RESPONSE => self.response.value,
            BLOCK_ADDR => self.block_addr.value,
            STATUS => self.status.value,
            _ => 0,
        }
    }

    pub fn write(&mut self, offset: u32, mask: u32, value: u32) {
        match offset & !3 {
            COMMAND => self.command.write_masked(mask, value),
            ARGUMENT => self.argument.write_masked(mask, value),
            BLOCK_ADDR => self.block_addr.write_masked(mask, value),
            _ => {}
        }
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}
