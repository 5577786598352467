//! Wire constants shared with the coprocessor firmware.

/// Number of pins on a module port.
pub const PIN_COUNT: usize = 8;

/// Largest payload a single TX/RX/TXRX command (or UART chunk) carries.
pub const MAX_TRANSFER: usize = 255;

/// Command op-codes (first byte of every command).
pub mod cmd {
    pub const NOP: u8 = 0;
    pub const FLUSH: u8 = 1;
    pub const ECHO: u8 = 2;
    pub const GPIO_IN: u8 = 3;
    pub const GPIO_HIGH: u8 = 4;
    pub const GPIO_LOW: u8 = 5;
    pub const GPIO_CFG: u8 = 6;
    pub const GPIO_WAIT: u8 = 7;
    pub const GPIO_INT: u8 = 8;
    pub const ENABLE_SPI: u8 = 10;
    pub const DISABLE_SPI: u8 = 11;
    pub const ENABLE_I2C: u8 = 12;
    pub const DISABLE_I2C: u8 = 13;
    pub const ENABLE_UART: u8 = 14;
    pub const DISABLE_UART: u8 = 15;
    pub const TX: u8 = 16;
    pub const RX: u8 = 17;
    pub const TXRX: u8 = 18;
    pub const START: u8 = 19;
    pub const STOP: u8 = 20;
    pub const GPIO_TOGGLE: u8 = 21;
    pub const GPIO_INPUT: u8 = 22;
    pub const GPIO_RAW_READ: u8 = 23;
    pub const ANALOG_READ: u8 = 24;
    pub const ANALOG_WRITE: u8 = 25;

    /// Payload byte sent with ECHO to fence a burst.
    pub const ECHO_PROBE: u8 = 0x88;
}

/// Leading bytes of coprocessor replies and events.
pub mod reply {
    pub const ACK: u8 = 0x80;
    pub const NACK: u8 = 0x81;
    pub const HIGH: u8 = 0x82;
    pub const LOW: u8 = 0x83;
    pub const DATA: u8 = 0x84;

    /// Every byte at or above this value is an asynchronous event.
    pub const MIN_ASYNC: u8 = 0xA0;
    /// `0xC0..0xC8`: pin N changed.
    pub const ASYNC_PIN_CHANGE_N: u8 = 0xC0;
    pub const ASYNC_UART_RX: u8 = 0xD0;
}

/// Interrupt trigger armed on a pin.
///
/// `High` and `Low` are level triggers and fire once; the edge triggers stay
/// armed until cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterruptMode {
    Rise,
    Fall,
    Change,
    High,
    Low,
}

impl InterruptMode {
    /// Mode number placed in the upper nibble of `GPIO_INT`'s operand.
    pub fn bits(self) -> u8 {
        match self {
            InterruptMode::Rise => 1,
            InterruptMode::Fall => 2,
            InterruptMode::Change => 3,
            InterruptMode::High => 4,
            InterruptMode::Low => 5,
        }
    }

    pub fn is_one_shot(self) -> bool {
        matches!(self, InterruptMode::High | InterruptMode::Low)
    }

    pub fn name(self) -> &'static str {
        match self {
            InterruptMode::Rise => "rise",
            InterruptMode::Fall => "fall",
            InterruptMode::Change => "change",
            InterruptMode::High => "high",
            InterruptMode::Low => "low",
        }
    }
}

impl std::fmt::Display for InterruptMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for InterruptMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "rise" => Ok(InterruptMode::Rise),
            "fall" => Ok(InterruptMode::Fall),
            "change" => Ok(InterruptMode::Change),
            "high" => Ok(InterruptMode::High),
            "low" => Ok(InterruptMode::Low),
            other => Err(format!("unknown interrupt mode '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn async_markers_sit_above_threshold() {
        assert!(reply::ASYNC_PIN_CHANGE_N >= reply::MIN_ASYNC);
        assert!(reply::ASYNC_UART_RX >= reply::MIN_ASYNC);
        assert!(reply::DATA < reply::MIN_ASYNC);
        assert!(reply::HIGH < reply::MIN_ASYNC && reply::LOW < reply::MIN_ASYNC);
    }

    #[test]
    fn interrupt_mode_bits_and_names() {
        assert_eq!(InterruptMode::Rise.bits(), 1);
        assert_eq!(InterruptMode::Low.bits(), 5);
        assert!(InterruptMode::High.is_one_shot());
        assert!(!InterruptMode::Change.is_one_shot());
        assert_eq!("fall".parse::<InterruptMode>().unwrap(), InterruptMode::Fall);
        assert!("edge".parse::<InterruptMode>().is_err());
    }
}
