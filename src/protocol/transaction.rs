use std::io::{self, ErrorKind, Read, Write};
use std::time::Duration;

use tracing::{error, trace, warn};

use super::frame::RawFrame;

/// ASCII EOT, sent by the instrument as the last byte of a reply.
pub const END_OF_PACKET: u8 = 0x04;

/// Carriage return closing every command.
pub const COMMAND_TERMINATOR: u8 = b'\r';

/// A fixed request understood by the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command(&'static [u8]);

impl Command {
    pub const fn new(bytes: &'static [u8]) -> Self {
        assert!(!bytes.is_empty(), "command must not be empty");
        assert!(
            bytes[bytes.len() - 1] == COMMAND_TERMINATOR,
            "command must end with a carriage return"
        );
        Command(bytes)
    }

    pub fn as_bytes(&self) -> &'static [u8] {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct TransactionConfig {
    pub settle: Duration, // wait between command and first read
    pub read_chunk: usize, // bytes requested per read pass
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(250),
            read_chunk: 128,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    AwaitingSettle,
    Reading,
    Complete,
    Aborted,
}

impl State {
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Complete | State::Aborted)
    }
}

/// Input to the state machine: the settle delay elapsing, or the outcome of
/// one read pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event<'a> {
    Settled,
    Data(&'a [u8]),
    Empty,
    Exhausted,
    Failed,
}

impl<'a> Event<'a> {
    /// Classify a read result. Timeouts and similar "nothing more right now"
    /// errors are the expected end of a reply, anything else is a failure.
    pub fn from_read(result: &io::Result<usize>, buf: &'a [u8]) -> Self {
        match result {
            Ok(0) => Event::Empty,
            Ok(n) => Event::Data(&buf[..*n]),
            Err(e) if is_exhausted(e) => Event::Exhausted,
            Err(_) => Event::Failed,
        }
    }
}

fn is_exhausted(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::UnexpectedEof
    )
}

/// Pure transition function of the read cycle.
pub fn advance(state: State, mut frame: RawFrame, event: Event<'_>) -> (State, RawFrame) {
    let next = match (state, event) {
        (State::AwaitingSettle, Event::Settled) => State::Reading,
        (State::AwaitingSettle, _) => State::AwaitingSettle,
        (State::Reading, Event::Settled) => State::Reading,
        (State::Reading, Event::Data(bytes)) => match bytes.last() {
            None => State::Complete,
            Some(&last) => {
                frame.push_batch(bytes);
                if last == END_OF_PACKET {
                    State::Complete
                } else {
                    State::Reading
                }
            }
        },
        (State::Reading, Event::Empty | Event::Exhausted) => State::Complete,
        (State::Reading, Event::Failed) => State::Aborted,
        (terminal, _) => terminal,
    };
    (next, frame)
}

#[derive(Debug)]
pub enum WriteStatus {
    Sent(usize),
    /// The write failed but reads were attempted anyway; the instrument
    /// often answers despite a bad write acknowledgment.
    Failed(io::Error),
}

/// Everything one transaction produced, before decoding.
#[derive(Debug)]
pub struct Exchange {
    pub write: WriteStatus,
    pub state: State,
    pub passes: usize,
    pub frame: RawFrame,
}

impl Exchange {
    /// The accumulated frame, or `None` when nothing was received.
    pub fn into_frame(self) -> Option<RawFrame> {
        if self.frame.is_empty() {
            None
        } else {
            Some(self.frame)
        }
    }
}

/// Send `command` and collect the reply until the end-of-packet marker, an
/// empty read, or a read error. Port faults never escape this function.
pub fn exchange<P: Read + Write>(
    port: &mut P,
    command: Command,
    config: &TransactionConfig,
) -> Exchange {
    trace!("TRX: {:?}", command.as_bytes());

    let write = match port.write_all(command.as_bytes()).and_then(|_| port.flush()) {
        Ok(()) => WriteStatus::Sent(command.as_bytes().len()),
        Err(e) => {
            error!("port.write: {} with command {:?}", e, command.as_bytes());
            WriteStatus::Failed(e)
        }
    };

    let mut state = State::AwaitingSettle;
    let mut frame = RawFrame::new();

    std::thread::sleep(config.settle);
    (state, frame) = advance(state, frame, Event::Settled);

    let mut buf = vec![0_u8; config.read_chunk.max(1)];
    let mut passes = 0;
    while !state.is_terminal() {
        passes += 1;
        let result = port.read(&mut buf);
        if let Err(e) = &result {
            if is_exhausted(e) {
                trace!("Read pass {}: no more data ({})", passes, e);
            } else {
                warn!("Read pass {} failed, ending transaction: {}", passes, e);
            }
        }
        let event = Event::from_read(&result, &buf);
        if let Event::Data(bytes) = event {
            trace!("Read pass {}: {:?}", passes, bytes);
        }
        (state, frame) = advance(state, frame, event);
    }

    Exchange {
        write,
        state,
        passes,
        frame,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// In-memory connection that replays scripted read results.
    #[derive(Default)]
    pub(crate) struct MockPort {
        pub written: Vec<u8>,
        pub reads: VecDeque<io::Result<Vec<u8>>>,
        pub fail_write: bool,
    }

    impl MockPort {
        pub fn replying(reads: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                reads: reads.into(),
                ..Default::default()
            }
        }
    }

    impl Read for MockPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                None => Ok(0),
                Some(Err(e)) => Err(e),
                Some(Ok(data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
            }
        }
    }

    impl Write for MockPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_write {
                return Err(io::Error::new(ErrorKind::BrokenPipe, "write rejected"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    const VAL: Command = Command::new(b"VAL?\r");

    fn no_settle() -> TransactionConfig {
        TransactionConfig {
            settle: Duration::ZERO,
            ..Default::default()
        }
    }

    #[test]
    fn settle_moves_to_reading() {
        let (state, frame) = advance(State::AwaitingSettle, RawFrame::new(), Event::Settled);
        assert_eq!(state, State::Reading);
        assert!(frame.is_empty());
    }

    #[test]
    fn reads_are_ignored_before_settle() {
        let (state, frame) = advance(State::AwaitingSettle, RawFrame::new(), Event::Data(b"U"));
        assert_eq!(state, State::AwaitingSettle);
        assert!(frame.is_empty());
    }

    #[test]
    fn terminator_completes_the_packet() {
        let (state, frame) = advance(State::Reading, RawFrame::new(), Event::Data(b"U=1"));
        assert_eq!(state, State::Reading);
        let (state, frame) = advance(state, frame, Event::Data(&[b'2', END_OF_PACKET]));
        assert_eq!(state, State::Complete);
        assert_eq!(frame.as_str(), "85,61,49,50,4");
    }

    #[test]
    fn empty_and_exhausted_reads_complete() {
        assert_eq!(advance(State::Reading, RawFrame::new(), Event::Empty).0, State::Complete);
        assert_eq!(advance(State::Reading, RawFrame::new(), Event::Exhausted).0, State::Complete);
    }

    #[test]
    fn failed_read_aborts_and_keeps_frame() {
        let frame = RawFrame::from("85");
        let (state, frame) = advance(State::Reading, frame, Event::Failed);
        assert_eq!(state, State::Aborted);
        assert_eq!(frame.as_str(), "85");
    }

    #[test]
    fn terminal_states_absorb_events() {
        for terminal in [State::Complete, State::Aborted] {
            let (state, frame) = advance(terminal, RawFrame::new(), Event::Data(b"x"));
            assert_eq!(state, terminal);
            assert!(frame.is_empty());
        }
    }

    #[test]
    fn read_results_are_classified() {
        let buf = [1_u8, 2, 3];
        assert_eq!(Event::from_read(&Ok(2), &buf), Event::Data(&[1, 2]));
        assert_eq!(Event::from_read(&Ok(0), &buf), Event::Empty);
        let timeout = Err(io::Error::from(ErrorKind::TimedOut));
        assert_eq!(Event::from_read(&timeout, &buf), Event::Exhausted);
        let broken = Err(io::Error::from(ErrorKind::BrokenPipe));
        assert_eq!(Event::from_read(&broken, &buf), Event::Failed);
    }

    #[test]
    fn exchange_collects_multi_pass_reply() {
        let mut port = MockPort::replying(vec![
            Ok(b"U=1E+0 ".to_vec()),
            Ok(vec![b'I', b'\r', END_OF_PACKET]),
            Ok(b"never read".to_vec()),
        ]);
        let exchange = exchange(&mut port, VAL, &no_settle());

        assert_eq!(port.written, b"VAL?\r");
        assert!(matches!(exchange.write, WriteStatus::Sent(5)));
        assert_eq!(exchange.state, State::Complete);
        assert_eq!(exchange.passes, 2);
        assert_eq!(exchange.frame.decode().unwrap(), "U=1E+0 I");
        assert_eq!(port.reads.len(), 1);
    }

    #[test]
    fn exchange_yields_no_frame_when_nothing_arrives() {
        let mut port = MockPort::replying(vec![Ok(Vec::new())]);
        let exchange = exchange(&mut port, VAL, &no_settle());
        assert_eq!(exchange.state, State::Complete);
        assert!(exchange.into_frame().is_none());
    }

    #[test]
    fn exchange_stops_on_timeout() {
        let mut port = MockPort::replying(vec![
            Ok(b"U=".to_vec()),
            Err(io::Error::from(ErrorKind::TimedOut)),
        ]);
        let exchange = exchange(&mut port, VAL, &no_settle());
        assert_eq!(exchange.state, State::Complete);
        assert_eq!(exchange.into_frame().unwrap().as_str(), "85,61");
    }

    #[test]
    fn exchange_aborts_on_hard_read_error() {
        let mut port = MockPort::replying(vec![Err(io::Error::from(ErrorKind::BrokenPipe))]);
        let exchange = exchange(&mut port, VAL, &no_settle());
        assert_eq!(exchange.state, State::Aborted);
        assert_eq!(exchange.passes, 1);
        assert!(exchange.into_frame().is_none());
    }

    #[test]
    fn write_failure_still_reads() {
        let mut port = MockPort::replying(vec![Ok(vec![b'U', END_OF_PACKET])]);
        port.fail_write = true;
        let exchange = exchange(&mut port, VAL, &no_settle());

        assert!(matches!(exchange.write, WriteStatus::Failed(_)));
        assert_eq!(exchange.state, State::Complete);
        assert_eq!(exchange.frame.as_str(), "85,4");
    }
}
