//! IEEE 488.2 enable-register bit packing.
//!
//! | bit | Event Status Enable (`*ESE`) | Service Request Enable (`*SRE`) |
//! |-----|------------------------------|---------------------------------|
//! | 7   | power on                     | standard operation summary      |
//! | 6   | (unused)                     | master summary                  |
//! | 5   | command error                | standard event summary          |
//! | 4   | execution error              | message available               |
//! | 3   | device-specific error        | questionable data summary       |
//! | 2   | query error                  | error queue                     |
//! | 1   | (unused)                     | (unused)                        |
//! | 0   | operation complete           | (unused)                        |

/// Named flags of the Standard Event Status Enable register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventStatusFlags {
    /// Bit 0.
    pub operation_complete: bool,
    /// Bit 2.
    pub query_error: bool,
    /// Bit 3.
    pub device_specific_error: bool,
    /// Bit 4.
    pub execution_error: bool,
    /// Bit 5.
    pub command_error: bool,
    /// Bit 7.
    pub power_on: bool,
}

impl EventStatusFlags {
    /// Bit position of `operation_complete`.
    pub const OPERATION_COMPLETE: u8 = 0;
    /// Bit position of `query_error`.
    pub const QUERY_ERROR: u8 = 2;
    /// Bit position of `device_specific_error`.
    pub const DEVICE_SPECIFIC_ERROR: u8 = 3;
    /// Bit position of `execution_error`.
    pub const EXECUTION_ERROR: u8 = 4;
    /// Bit position of `command_error`.
    pub const COMMAND_ERROR: u8 = 5;
    /// Bit position of `power_on`.
    pub const POWER_ON: u8 = 7;

    /// Packed register value.
    pub fn bits(&self) -> u8 {
        (u8::from(self.power_on) << Self::POWER_ON)
            | (u8::from(self.command_error) << Self::COMMAND_ERROR)
            | (u8::from(self.execution_error) << Self::EXECUTION_ERROR)
            | (u8::from(self.device_specific_error) << Self::DEVICE_SPECIFIC_ERROR)
            | (u8::from(self.query_error) << Self::QUERY_ERROR)
            | (u8::from(self.operation_complete) << Self::OPERATION_COMPLETE)
    }

    /// Unpack a register value, ignoring unused bits.
    pub fn from_bits(bits: u8) -> Self {
        let set = |bit: u8| bits & (1 << bit) != 0;
        Self {
            operation_complete: set(Self::OPERATION_COMPLETE),
            query_error: set(Self::QUERY_ERROR),
            device_specific_error: set(Self::DEVICE_SPECIFIC_ERROR),
            execution_error: set(Self::EXECUTION_ERROR),
            command_error: set(Self::COMMAND_ERROR),
            power_on: set(Self::POWER_ON),
        }
    }
}

/// Named flags of the Service Request Enable register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceRequestFlags {
    /// Bit 2.
    pub error_queue: bool,
    /// Bit 3.
    pub questionable_data_summary: bool,
    /// Bit 4.
    pub message_available: bool,
    /// Bit 5.
    pub standard_event_summary: bool,
    /// Bit 6.
    pub master_summary: bool,
    /// Bit 7.
    pub standard_operation_summary: bool,
}

impl ServiceRequestFlags {
    /// Bit position of `error_queue`.
    pub const ERROR_QUEUE: u8 = 2;
    /// Bit position of `questionable_data_summary`.
    pub const QUESTIONABLE_DATA_SUMMARY: u8 = 3;
    /// Bit position of `message_available`.
    pub const MESSAGE_AVAILABLE: u8 = 4;
    /// Bit position of `standard_event_summary`.
    pub const STANDARD_EVENT_SUMMARY: u8 = 5;
    /// Bit position of `master_summary`.
    pub const MASTER_SUMMARY: u8 = 6;
    /// Bit position of `standard_operation_summary`.
    pub const STANDARD_OPERATION_SUMMARY: u8 = 7;

    /// Packed register value.
    pub fn bits(&self) -> u8 {
        (u8::from(self.standard_operation_summary) << Self::STANDARD_OPERATION_SUMMARY)
            | (u8::from(self.master_summary) << Self::MASTER_SUMMARY)
            | (u8::from(self.standard_event_summary) << Self::STANDARD_EVENT_SUMMARY)
            | (u8::from(self.message_available) << Self::MESSAGE_AVAILABLE)
            | (u8::from(self.questionable_data_summary) << Self::QUESTIONABLE_DATA_SUMMARY)
            | (u8::from(self.error_queue) << Self::ERROR_QUEUE)
    }

    /// Unpack a register value, ignoring unused bits.
    pub fn from_bits(bits: u8) -> Self {
        let set = |bit: u8| bits & (1 << bit) != 0;
        Self {
            error_queue: set(Self::ERROR_QUEUE),
            questionable_data_summary: set(Self::QUESTIONABLE_DATA_SUMMARY),
            message_available: set(Self::MESSAGE_AVAILABLE),
            standard_event_summary: set(Self::STANDARD_EVENT_SUMMARY),
            master_summary: set(Self::MASTER_SUMMARY),
            standard_operation_summary: set(Self::STANDARD_OPERATION_SUMMARY),
        }
    }
}
