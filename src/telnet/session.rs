//! Interpretation of decoded telnet frames for one client connection.

use super::codec::{Command, Frame, TelnetDecoder};
use super::rfc2217::ComPortCommand;
use super::{COM_PORT_OPTION, DO, IAC, OPT_ECHO};
use crate::error::Result;
use crate::logutil::hex_snippet;
use crate::metrics;
use crate::serial::DeviceControl;
use log::{debug, info};

/// Parser state plus command handling for the active connection.
#[derive(Debug, Default)]
pub struct Session {
    decoder: TelnetDecoder,
}

impl Session {
    pub fn new(max_command_len: usize) -> Self {
        Self {
            decoder: TelnetDecoder::new(max_command_len),
        }
    }

    pub fn reset(&mut self) {
        self.decoder.reset();
    }

    /// True while a command or escape from the client is incomplete.
    pub fn is_mid_sequence(&self) -> bool {
        self.decoder.is_mid_sequence()
    }

    /// Decode client bytes: payload goes to `device`, commands are applied to it.
    ///
    /// Returns protocol replies for the client, already framed. Only device
    /// control failures are errors; malformed commands are skipped.
    pub fn process(&mut self, input: &[u8], device: &mut dyn DeviceControl) -> Result<Vec<u8>> {
        let mut replies = Vec::new();
        for frame in self.decoder.feed(input) {
            match frame {
                Frame::Payload(bytes) => {
                    device.write(&bytes);
                }
                Frame::Command(command) => self.apply(command, device, &mut replies)?,
            }
        }
        Ok(replies)
    }

    fn apply(
        &mut self,
        command: Command,
        device: &mut dyn DeviceControl,
        replies: &mut Vec<u8>,
    ) -> Result<()> {
        match command {
            Command::Do(OPT_ECHO) => {
                debug!("DO ECHO -> DO COM-PORT-OPTION");
                replies.extend_from_slice(&[IAC, DO, COM_PORT_OPTION]);
            }
            Command::Do(opt) => debug!("Ignoring DO {}", opt),
            Command::Will(opt) => debug!("Ignoring WILL {}", opt),
            Command::ComPort(request) => {
                let Some(cmd) = request.command() else {
                    debug!(
                        "Skipping unrecognised COM-PORT request: {}",
                        hex_snippet(request.frame(), 16)
                    );
                    metrics::inc_skipped_commands();
                    return Ok(());
                };
                debug!("COM-PORT {:?}", cmd);
                match cmd {
                    // Zero asks for the current rate; nothing to apply.
                    ComPortCommand::SetBaudRate(0) => {
                        debug!("SET-BAUDRATE 0 is a query, device baud left unchanged")
                    }
                    ComPortCommand::SetBaudRate(baud) => device.set_baud(baud)?,
                    ComPortCommand::SetControl(value) => match cmd.boot_mode() {
                        Some(mode) => {
                            info!("{} {} requests {} mode", cmd.name(), value, mode);
                            device.enter_boot_mode(mode)?;
                        }
                        None => debug!("{} {} accepted without effect", cmd.name(), value),
                    },
                    _ => debug!("{} accepted without effect", cmd.name()),
                }
                replies.extend_from_slice(&request.ack());
                metrics::inc_com_port_acks();
            }
            Command::Skipped(raw) => {
                debug!("Skipping command: {}", hex_snippet(&raw, 16));
                metrics::inc_skipped_commands();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::{BootMode, WriteOutcome};
    use crate::telnet::{SB, SE, WILL};

    #[derive(Debug, Default)]
    struct Recorder {
        writes: Vec<Vec<u8>>,
        bauds: Vec<u32>,
        modes: Vec<BootMode>,
        baud: u32,
    }

    impl DeviceControl for Recorder {
        fn open(&mut self) -> Result<()> {
            Ok(())
        }
        fn set_baud(&mut self, baud: u32) -> Result<()> {
            if baud != self.baud {
                self.baud = baud;
                self.bauds.push(baud);
            }
            Ok(())
        }
        fn enter_boot_mode(&mut self, mode: BootMode) -> Result<()> {
            self.modes.push(mode);
            Ok(())
        }
        fn write(&mut self, bytes: &[u8]) -> WriteOutcome {
            self.writes.push(bytes.to_vec());
            WriteOutcome::Complete { attempts: 1 }
        }
    }

    fn recorder() -> Recorder {
        Recorder {
            baud: 115_200,
            ..Default::default()
        }
    }

    fn com_port(body: &[u8]) -> Vec<u8> {
        let mut frame = vec![IAC, SB, COM_PORT_OPTION];
        frame.extend_from_slice(body);
        frame.extend_from_slice(&[IAC, SE]);
        frame
    }

    #[test]
    fn do_echo_gets_exactly_do_com_port() {
        let mut session = Session::default();
        let mut dev = recorder();
        let replies = session.process(&[IAC, DO, OPT_ECHO], &mut dev).unwrap();
        assert_eq!(replies, vec![IAC, DO, COM_PORT_OPTION]);
        assert!(dev.writes.is_empty());
        assert!(dev.bauds.is_empty());
        assert!(dev.modes.is_empty());
    }

    #[test]
    fn other_negotiation_gets_no_reply() {
        let mut session = Session::default();
        let mut dev = recorder();
        let replies = session
            .process(&[IAC, DO, 3, IAC, WILL, COM_PORT_OPTION], &mut dev)
            .unwrap();
        assert!(replies.is_empty());
    }

    #[test]
    fn payload_is_forwarded_in_runs() {
        let mut session = Session::default();
        let mut dev = recorder();
        session.process(b"abc", &mut dev).unwrap();
        session.process(&[b'd', IAC, IAC, b'e'], &mut dev).unwrap();
        assert_eq!(
            dev.writes,
            vec![b"abc".to_vec(), b"d".to_vec(), vec![IAC, b'e']]
        );
    }

    #[test]
    fn default_baud_request_is_acked_without_hardware_call() {
        let mut session = Session::default();
        let mut dev = recorder();
        let replies = session
            .process(&com_port(&[1, 0x00, 0x01, 0xC2, 0x00]), &mut dev)
            .unwrap();
        assert!(dev.bauds.is_empty());
        assert_eq!(replies, com_port(&[101, 0x00, 0x01, 0xC2, 0x00]));
    }

    #[test]
    fn new_baud_is_applied_once() {
        let mut session = Session::default();
        let mut dev = recorder();
        session
            .process(&com_port(&[1, 0x00, 0x00, 0x1C, 0x20]), &mut dev)
            .unwrap();
        assert_eq!(dev.bauds, vec![7_200]);
    }

    #[test]
    fn baud_query_is_acked_but_not_applied() {
        let mut session = Session::default();
        let mut dev = recorder();
        let replies = session.process(&com_port(&[1, 0, 0, 0, 0]), &mut dev).unwrap();
        assert!(dev.bauds.is_empty());
        assert_eq!(replies, com_port(&[101, 0, 0, 0, 0]));
    }

    #[test]
    fn set_control_drives_boot_mode() {
        let mut session = Session::default();
        let mut dev = recorder();
        let replies = session.process(&com_port(&[5, 8]), &mut dev).unwrap();
        assert_eq!(dev.modes, vec![BootMode::Bootloader]);
        assert_eq!(replies, com_port(&[105, 8]));

        session.process(&com_port(&[5, 11]), &mut dev).unwrap();
        assert_eq!(dev.modes, vec![BootMode::Bootloader, BootMode::Reset]);
    }

    #[test]
    fn other_control_values_only_ack() {
        let mut session = Session::default();
        let mut dev = recorder();
        for value in [1u8, 9, 12] {
            let replies = session.process(&com_port(&[5, value]), &mut dev).unwrap();
            assert_eq!(replies, com_port(&[105, value]));
        }
        assert!(dev.modes.is_empty());
    }

    #[test]
    fn no_op_sub_commands_are_acked() {
        let mut session = Session::default();
        let mut dev = recorder();
        for body in [[2u8, 8], [3, 1], [4, 1], [12, 3]] {
            let replies = session.process(&com_port(&body), &mut dev).unwrap();
            assert_eq!(replies, com_port(&[body[0] + 100, body[1]]));
        }
        assert!(dev.bauds.is_empty() && dev.modes.is_empty() && dev.writes.is_empty());
    }

    #[test]
    fn unrecognised_sub_command_is_dropped_silently() {
        let mut session = Session::default();
        let mut dev = recorder();
        let mut input = com_port(&[6, 1]);
        input.extend_from_slice(b"after");
        let replies = session.process(&input, &mut dev).unwrap();
        assert!(replies.is_empty());
        assert_eq!(dev.writes, vec![b"after".to_vec()]);
    }

    #[test]
    fn partial_command_is_reported_until_reset() {
        let mut session = Session::default();
        let mut dev = recorder();
        session.process(&[IAC, SB, COM_PORT_OPTION, 1], &mut dev).unwrap();
        assert!(session.is_mid_sequence());
        session.reset();
        assert!(!session.is_mid_sequence());
        session.process(b"ok", &mut dev).unwrap();
        assert_eq!(dev.writes, vec![b"ok".to_vec()]);
    }

    #[test]
    fn split_command_dispatches_once() {
        let mut session = Session::default();
        let mut dev = recorder();
        let frame = com_port(&[1, 0x00, 0x00, 0x1C, 0x20]);
        let (a, b) = frame.split_at(6);
        assert!(session.process(a, &mut dev).unwrap().is_empty());
        let replies = session.process(b, &mut dev).unwrap();
        assert_eq!(dev.bauds, vec![7_200]);
        assert_eq!(replies, com_port(&[101, 0x00, 0x00, 0x1C, 0x20]));
    }
}
