use std::time::Duration;

use serialbridge_frame::FramedChannel;
use serialbridge_transport::{CancelToken, SerialChannel};
use tracing::{info, warn};

use crate::error::{Result, SessionError};
use crate::handshake::{wait_for_ready, HandshakeConfig, HandshakeResult};
use crate::wait::{wait_for_input, DEFAULT_POLL_INTERVAL};

/// Session behavior configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle sleep between "bytes available" probes while awaiting a reply.
    pub poll_interval: Duration,
    /// Drop whatever the peer sent unprompted before each request.
    ///
    /// Off by default: an unsolicited frame is then taken as the reply to the
    /// next request and every later reply shifts by one.
    pub discard_stale_input: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            discard_stale_input: false,
        }
    }
}

/// Request/reply session with at most one outstanding request.
pub struct Session<C> {
    framed: FramedChannel<C>,
    config: SessionConfig,
    awaiting_reply: bool,
    ready: bool,
    exchanges: u64,
}

impl<C: SerialChannel> Session<C> {
    pub fn new(framed: FramedChannel<C>, config: SessionConfig) -> Self {
        Self {
            framed,
            config,
            awaiting_reply: false,
            ready: false,
            exchanges: 0,
        }
    }

    /// Wait for the peer's ready signal. Done once per channel lifetime.
    pub fn handshake(
        &mut self,
        config: &HandshakeConfig,
        cancel: &CancelToken,
    ) -> Result<HandshakeResult> {
        let result = wait_for_ready(&mut self.framed, config, cancel)?;
        self.ready = true;
        Ok(result)
    }

    /// Send one request and block until exactly one reply frame is decoded.
    ///
    /// Assumes the handshake already happened; this is not re-checked here.
    /// If the peer sent more than one frame, only the first is consumed and
    /// the rest answers the next call.
    ///
    /// A cancelled wait leaves the request outstanding, since its reply may
    /// still arrive. Any other failure while waiting clears it.
    pub fn execute(&mut self, payload: &str, cancel: &CancelToken) -> Result<String> {
        if self.awaiting_reply {
            return Err(SessionError::ReplyOutstanding);
        }

        if self.config.discard_stale_input {
            let dropped = self.framed.discard_pending()?;
            if dropped > 0 {
                warn!(bytes = dropped, "dropped unsolicited peer input before request");
            }
        }

        self.framed.send(payload)?;
        self.awaiting_reply = true;
        info!(payload, "sent");

        let reply = match self.await_reply(cancel) {
            Ok(reply) => reply,
            Err(SessionError::Cancelled) => return Err(SessionError::Cancelled),
            Err(err) => {
                self.awaiting_reply = false;
                return Err(err);
            }
        };

        self.awaiting_reply = false;
        self.exchanges += 1;
        info!(reply = %reply, "received");

        Ok(reply)
    }

    fn await_reply(&mut self, cancel: &CancelToken) -> Result<String> {
        wait_for_input(&mut self.framed, cancel, self.config.poll_interval, None)?;
        Ok(self.framed.recv(cancel)?)
    }

    /// True between "frame sent" and "reply decoded".
    pub fn is_awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    /// Whether `handshake()` has completed on this session.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Completed request/reply exchanges.
    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    /// Close the underlying channel.
    pub fn close(&mut self) -> Result<()> {
        Ok(self.framed.close()?)
    }

    pub fn framed(&self) -> &FramedChannel<C> {
        &self.framed
    }

    pub fn framed_mut(&mut self) -> &mut FramedChannel<C> {
        &mut self.framed
    }

    pub fn into_inner(self) -> FramedChannel<C> {
        self.framed
    }
}

impl<C> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("awaiting_reply", &self.awaiting_reply)
            .field("ready", &self.ready)
            .field("exchanges", &self.exchanges)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serialbridge_transport::{MemoryChannel, MemoryPeer, TransportError};

    use super::*;

    fn fast_config() -> SessionConfig {
        SessionConfig {
            poll_interval: Duration::from_millis(1),
            ..SessionConfig::default()
        }
    }

    fn echo_session() -> (Session<MemoryChannel>, MemoryPeer) {
        let (channel, peer) = MemoryChannel::pair();
        let channel = channel.with_responder(|frame| {
            let body = &frame[1..frame.len() - 1];
            let mut reply = b"<ack:".to_vec();
            reply.extend_from_slice(body);
            reply.push(b'>');
            reply
        });
        (Session::new(FramedChannel::new(channel), fast_config()), peer)
    }

    #[test]
    fn execute_sends_frame_and_returns_reply() {
        let (channel, peer) = MemoryChannel::pair();
        let channel = channel.with_responder(|_| b"<OK>".to_vec());
        let mut session = Session::new(FramedChannel::new(channel), fast_config());

        let reply = session
            .execute("3,12,1.23:45:01", &CancelToken::new())
            .unwrap();

        assert_eq!(reply, "OK");
        assert_eq!(peer.written(), b"<3,12,1.23:45:01>");
        assert!(!session.is_awaiting_reply());
        assert_eq!(session.exchanges(), 1);
    }

    #[test]
    fn handshake_then_exchanges() {
        let (mut session, peer) = echo_session();
        peer.send(b"<Arduino is ready>");

        let cancel = CancelToken::new();
        assert!(!session.is_ready());
        session
            .handshake(
                &HandshakeConfig {
                    poll_interval: Duration::from_millis(1),
                    ..HandshakeConfig::default()
                },
                &cancel,
            )
            .unwrap();
        assert!(session.is_ready());

        assert_eq!(session.execute("1", &cancel).unwrap(), "ack:1");
        assert_eq!(session.execute("2", &cancel).unwrap(), "ack:2");
        assert_eq!(peer.written(), b"<1><2>");
        assert_eq!(session.exchanges(), 2);
    }

    #[test]
    fn awaiting_reply_set_after_write_and_blocks_next_request() {
        let (channel, peer) = MemoryChannel::pair();
        let mut session = Session::new(FramedChannel::new(channel), fast_config());

        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            trigger.cancel();
        });

        let err = session.execute("3,0,9.99:99:99", &cancel).unwrap_err();
        handle.join().unwrap();

        assert!(matches!(err, SessionError::Cancelled));
        assert_eq!(peer.written(), b"<3,0,9.99:99:99>");
        assert!(session.is_awaiting_reply());

        let err = session.execute("next", &CancelToken::new()).unwrap_err();
        assert!(matches!(err, SessionError::ReplyOutstanding));
        assert_eq!(peer.written(), b"<3,0,9.99:99:99>");
    }

    #[test]
    fn reply_sent_only_after_request_on_wire() {
        let (channel, peer) = MemoryChannel::pair();
        let mut session = Session::new(FramedChannel::new(channel), fast_config());

        let responder = std::thread::spawn(move || {
            while peer.written().is_empty() {
                std::thread::sleep(Duration::from_millis(1));
            }
            peer.send(b"<done>");
        });

        let reply = session.execute("req", &CancelToken::new()).unwrap();
        responder.join().unwrap();

        assert_eq!(reply, "done");
        assert!(!session.is_awaiting_reply());
    }

    #[test]
    fn unsolicited_frame_shifts_replies() {
        let (mut session, peer) = echo_session();
        peer.send(b"<unsolicited>");

        let cancel = CancelToken::new();
        assert_eq!(session.execute("a", &cancel).unwrap(), "unsolicited");
        assert_eq!(session.execute("b", &cancel).unwrap(), "ack:a");
        assert_eq!(peer.pending(), b"<ack:b>".len());
    }

    #[test]
    fn discard_stale_input_keeps_pairing() {
        let (channel, peer) = MemoryChannel::pair();
        let channel = channel.with_responder(|_| b"<fresh>".to_vec());
        let config = SessionConfig {
            discard_stale_input: true,
            ..fast_config()
        };
        let mut session = Session::new(FramedChannel::new(channel), config);
        peer.send(b"<unsolicited>");

        assert_eq!(session.execute("a", &CancelToken::new()).unwrap(), "fresh");
        assert_eq!(peer.pending(), 0);
    }

    #[test]
    fn reply_split_across_reads() {
        let (channel, peer) = MemoryChannel::pair();
        let mut session = Session::new(FramedChannel::new(channel), fast_config());

        let feeder = std::thread::spawn(move || {
            while peer.written().is_empty() {
                std::thread::sleep(Duration::from_millis(1));
            }
            for chunk in [&b"<O"[..], b"K, got", b" it>"] {
                peer.send(chunk);
                std::thread::sleep(Duration::from_millis(5));
            }
        });

        let reply = session.execute("x", &CancelToken::new()).unwrap();
        feeder.join().unwrap();
        assert_eq!(reply, "OK, got it");
    }

    #[test]
    fn send_failure_leaves_session_idle() {
        let (channel, peer) = MemoryChannel::pair();
        let mut session = Session::new(FramedChannel::new(channel), fast_config());
        peer.hang_up();

        let err = session.execute("x", &CancelToken::new()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transport(TransportError::Disconnected)
        ));
        assert!(!session.is_awaiting_reply());
    }

    #[test]
    fn read_failure_after_send_clears_awaiting_reply() {
        let (channel, peer) = MemoryChannel::pair();
        let mut session = Session::new(FramedChannel::new(channel), fast_config());

        let unplug = {
            let peer = peer.clone();
            std::thread::spawn(move || {
                while peer.written().is_empty() {
                    std::thread::sleep(Duration::from_millis(1));
                }
                peer.hang_up();
            })
        };

        let err = session.execute("1,2,00:00:01", &CancelToken::new()).unwrap_err();
        unplug.join().unwrap();

        assert!(matches!(
            err,
            SessionError::Transport(TransportError::Disconnected)
        ));
        assert_eq!(peer.written(), b"<1,2,00:00:01>");
        assert!(!session.is_awaiting_reply());
        assert_eq!(session.exchanges(), 0);

        let err = session.execute("next", &CancelToken::new()).unwrap_err();
        assert!(!matches!(err, SessionError::ReplyOutstanding));
    }

    #[test]
    fn close_reaches_channel() {
        let (mut session, peer) = echo_session();
        session.close().unwrap();
        assert_eq!(peer.close_calls(), 1);
        assert!(!session.framed().is_open());
    }
}
