//! We use this mocking module in unit tests to emulate PMBus controllers on an I2C bus.

use std::{collections::HashMap, vec::Vec};

use embedded_hal::{
    delay::DelayNs,
    i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation},
};

/// `PAGE` command byte.
const PAGE: u8 = 0x00;

/// Simulated bus error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockI2cError(pub ErrorKind);

impl embedded_hal::i2c::Error for MockI2cError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// One simulated controller with banked registers.
///
/// Writes are echoed into the register on the currently selected page, reads past the end of
/// the stored bytes return `0xFF` like a floating bus.
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    page: u8,
    registers: HashMap<(u8, u8), Vec<u8>>,
    /// Commands whose byte is not acknowledged
    nacked: Vec<u8>,
    /// Commands that acknowledge writes but keep their value
    read_only: Vec<u8>,
    /// Commands whose reads are not acknowledged
    nacked_reads: Vec<u8>,
    /// Send-byte commands that store bytes into `(page, command)`
    send_effects: Vec<(u8, (u8, u8), Vec<u8>)>,
    /// Number of upcoming transactions that fail with a bus error
    flaky: u8,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload `bytes` (wire order) into `command` on `page`.
    pub fn with_register(mut self, page: u8, command: u8, bytes: &[u8]) -> Self {
        self.registers.insert((page, command), bytes.to_vec());
        self
    }

    /// NACK every access to `command`.
    pub fn nack_command(mut self, command: u8) -> Self {
        self.nacked.push(command);
        self
    }

    /// Acknowledge writes to `command` without storing them.
    pub fn ignore_writes(mut self, command: u8) -> Self {
        self.read_only.push(command);
        self
    }

    /// NACK reads of `command`, writes still land.
    pub fn nack_reads(mut self, command: u8) -> Self {
        self.nacked_reads.push(command);
        self
    }

    /// Sending `command` alone stores `bytes` into `target` on `page`.
    pub fn on_send_byte(mut self, command: u8, page: u8, target: u8, bytes: &[u8]) -> Self {
        self.send_effects
            .push((command, (page, target), bytes.to_vec()));
        self
    }

    /// Fail the next `count` transactions with a bus error.
    pub fn fail_next(mut self, count: u8) -> Self {
        self.flaky = count;
        self
    }

    /// Currently selected page.
    pub fn page(&self) -> u8 {
        self.page
    }

    /// Stored bytes of `command` on `page`.
    pub fn register(&self, page: u8, command: u8) -> Option<&[u8]> {
        self.registers.get(&(page, command)).map(Vec::as_slice)
    }

    /// A PXE1610C with ICC_MAX at 150A and the given raw attempt counter word.
    pub fn pxe1610c(attempt_counter: [u8; 2]) -> Self {
        Self::new()
            .with_register(0x00, 0xFD, &[0xB3])
            .with_register(0x4F, 0x1A, &[0x00])
            .with_register(0x4F, 0x32, &[0x15, 0x04])
            .with_register(0x20, 0x73, &[0x96, 0x00])
            .with_register(0x50, 0x82, &attempt_counter)
    }

    /// An MP2955A with ICC_MAX at 140A.
    pub fn mp2955a() -> Self {
        Self::new()
            .with_register(0x00, 0xBF, &[0x55, 0x25])
            .with_register(0x00, 0xEF, &[0x8C])
    }

    /// A write protected TPS53679 with ICC_MAX at 140A.
    pub fn tps53679() -> Self {
        Self::ti(0x79)
    }

    pub fn tps53678() -> Self {
        Self::ti(0x78)
    }

    fn ti(id: u8) -> Self {
        Self::new()
            .with_register(0x00, 0xAD, &[0x01, id])
            .with_register(0x00, 0x10, &[0x80])
            .with_register(0x00, 0xDA, &[0x8C, 0x00])
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), MockI2cError> {
        let Some((&command, data)) = bytes.split_first() else {
            return Ok(());
        };
        if self.nacked.contains(&command) {
            return Err(MockI2cError(ErrorKind::NoAcknowledge(
                NoAcknowledgeSource::Data,
            )));
        }
        if command == PAGE {
            if let Some(&page) = data.first() {
                self.page = page;
            }
        } else if !data.is_empty() && !self.read_only.contains(&command) {
            self.registers.insert((self.page, command), data.to_vec());
        }
        Ok(())
    }

    fn send_byte(&mut self, command: u8) {
        for (trigger, register, bytes) in &self.send_effects {
            if *trigger == command {
                self.registers.insert(*register, bytes.clone());
            }
        }
    }

    fn read(&self, command: Option<u8>, buffer: &mut [u8]) -> Result<(), MockI2cError> {
        if command.is_some_and(|command| self.nacked_reads.contains(&command)) {
            return Err(MockI2cError(ErrorKind::NoAcknowledge(
                NoAcknowledgeSource::Data,
            )));
        }
        buffer.fill(0xFF);
        match command {
            Some(PAGE) => {
                if let Some(first) = buffer.first_mut() {
                    *first = self.page;
                }
            }
            Some(command) => {
                if let Some(data) = self.registers.get(&(self.page, command)) {
                    let len = data.len().min(buffer.len());
                    buffer[..len].copy_from_slice(&data[..len]);
                }
            }
            None => {}
        }
        Ok(())
    }
}

/// Our mock type used to emulate an I2C bus with controllers attached.
#[derive(Debug, Default)]
pub struct MockBus {
    devices: Vec<(u8, MockDevice)>,
    /// Every write-only transaction as `(address, bytes)`
    writes: Vec<(u8, Vec<u8>)>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `device` at 7-bit `address`.
    pub fn with_device(mut self, address: u8, device: MockDevice) -> Self {
        self.devices.push((address, device));
        self
    }

    pub fn device(&self, address: u8) -> Option<&MockDevice> {
        self.devices
            .iter()
            .find(|(a, _)| *a == address)
            .map(|(_, device)| device)
    }

    /// All write-only transactions in bus order. Command bytes of reads are not logged.
    pub fn writes(&self) -> &[(u8, Vec<u8>)] {
        &self.writes
    }

    /// Writes addressed to one device.
    pub fn writes_to(&self, address: u8) -> Vec<Vec<u8>> {
        self.writes
            .iter()
            .filter(|(a, _)| *a == address)
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }

    /// Whether exactly `bytes` was written to `address`.
    pub fn wrote(&self, address: u8, bytes: &[u8]) -> bool {
        self.writes
            .iter()
            .any(|(a, written)| *a == address && written == bytes)
    }
}

impl ErrorType for MockBus {
    type Error = MockI2cError;
}

impl I2c for MockBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let Some(device) = self
            .devices
            .iter_mut()
            .find(|(a, _)| *a == address)
            .map(|(_, device)| device)
        else {
            return Err(MockI2cError(ErrorKind::NoAcknowledge(
                NoAcknowledgeSource::Address,
            )));
        };

        if device.flaky > 0 {
            device.flaky -= 1;
            return Err(MockI2cError(ErrorKind::Bus));
        }

        let reads = operations
            .iter()
            .any(|operation| matches!(operation, Operation::Read(_)));
        let mut command = None;
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    if !reads {
                        self.writes.push((address, bytes.to_vec()));
                    }
                    device.write(bytes)?;
                    command = bytes.first().copied();
                    if let [send] = **bytes {
                        if !reads {
                            device.send_byte(send);
                        }
                    }
                }
                Operation::Read(buffer) => device.read(command, buffer)?,
            }
        }
        Ok(())
    }
}

/// Delay that only adds up the requested time.
#[derive(Debug, Default)]
pub struct MockDelay {
    pub elapsed_ns: u64,
}

impl MockDelay {
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::Error;

    #[test]
    fn absent_address_is_nacked() {
        let mut bus = MockBus::new();
        let err = bus.write(0x5A, &[0x00, 0x20]).unwrap_err();
        assert_eq!(
            err.kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
        );
    }

    #[test]
    fn page_selects_register_bank() {
        let mut bus = MockBus::new().with_device(0x5A, MockDevice::pxe1610c([0xC0, 0x00]));
        let mut reply = [0u8; 2];

        bus.write(0x5A, &[0x00, 0x4F]).unwrap();
        bus.write_read(0x5A, &[0x32], &mut reply).unwrap();
        assert_eq!(reply, [0x15, 0x04]);

        bus.write(0x5A, &[0x00, 0x20]).unwrap();
        bus.write_read(0x5A, &[0x32], &mut reply).unwrap();
        assert_eq!(reply, [0xFF, 0xFF]);

        let mut page = [0u8; 1];
        bus.write_read(0x5A, &[0x00], &mut page).unwrap();
        assert_eq!(page, [0x20]);
        assert_eq!(bus.device(0x5A).unwrap().page(), 0x20);
    }

    #[test]
    fn writes_are_echoed() {
        let mut bus = MockBus::new().with_device(0x70, MockDevice::tps53679());
        bus.write(0x70, &[0xDA, 0xFF, 0x00]).unwrap();
        assert_eq!(
            bus.device(0x70).unwrap().register(0x00, 0xDA),
            Some(&[0xFF, 0x00][..])
        );
        assert!(bus.wrote(0x70, &[0xDA, 0xFF, 0x00]));
        assert_eq!(bus.writes_to(0x70).len(), 1);
    }

    #[test]
    fn ignored_writes_keep_value() {
        let mut bus =
            MockBus::new().with_device(0x60, MockDevice::mp2955a().ignore_writes(0xEF));
        bus.write(0x60, &[0xEF, 0xFF]).unwrap();
        assert_eq!(
            bus.device(0x60).unwrap().register(0x00, 0xEF),
            Some(&[0x8C][..])
        );
    }

    #[test]
    fn nacked_command() {
        let mut bus = MockBus::new().with_device(0x70, MockDevice::tps53679().nack_command(0x10));
        let err = bus.write(0x70, &[0x10, 0x00]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
        assert_eq!(
            bus.device(0x70).unwrap().register(0x00, 0x10),
            Some(&[0x80][..])
        );
    }

    #[test]
    fn read_nack_keeps_writes() {
        let mut bus = MockBus::new().with_device(0x70, MockDevice::tps53679().nack_reads(0xDA));
        bus.write(0x70, &[0xDA, 0xFF, 0x00]).unwrap();
        let mut reply = [0u8; 2];
        assert_eq!(
            bus.write_read(0x70, &[0xDA], &mut reply).unwrap_err().kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)
        );
        assert_eq!(
            bus.device(0x70).unwrap().register(0x00, 0xDA),
            Some(&[0xFF, 0x00][..])
        );
    }

    #[test]
    fn send_byte_effect() {
        let device =
            MockDevice::pxe1610c([0x40, 0x00]).on_send_byte(0x34, 0x50, 0x82, &[0x00, 0x00]);
        let mut bus = MockBus::new().with_device(0x5A, device);

        // A read of the same command is not a send byte.
        let mut reply = [0u8; 1];
        bus.write_read(0x5A, &[0x34], &mut reply).unwrap();
        assert_eq!(
            bus.device(0x5A).unwrap().register(0x50, 0x82),
            Some(&[0x40, 0x00][..])
        );

        bus.write(0x5A, &[0x34]).unwrap();
        assert_eq!(
            bus.device(0x5A).unwrap().register(0x50, 0x82),
            Some(&[0x00, 0x00][..])
        );
    }

    #[test]
    fn flaky_device_recovers() {
        let mut bus = MockBus::new().with_device(0x60, MockDevice::mp2955a().fail_next(1));
        let mut reply = [0u8; 2];
        assert_eq!(
            bus.write_read(0x60, &[0xBF], &mut reply).unwrap_err().kind(),
            ErrorKind::Bus
        );
        bus.write_read(0x60, &[0xBF], &mut reply).unwrap();
        assert_eq!(reply, [0x55, 0x25]);
    }

    #[test]
    fn delay_adds_up() {
        let mut delay = MockDelay::default();
        delay.delay_ms(1000);
        delay.delay_us(500);
        assert_eq!(delay.elapsed_ms(), 1000);
        assert_eq!(delay.elapsed_ns, 1_000_500_000);
    }
}
