use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ahash::AHashMap;
use crossbeam_channel::{unbounded, Receiver, Sender};
use game_runtime::{
    parse_inbound_line, ChatId, InboundLine, Keyboard, MessageId, OutboundFrame, Update,
    UpdateKind,
};
use parking_lot::Mutex;

use crate::transport::{ChatTransport, TransportError};

/// A client that stops reading is dropped after this long.
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

type ClientWriter = Arc<Mutex<TcpStream>>;

/// Something a connected client sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Update(Update),
    AdViewed(String),
}

#[derive(Default)]
struct Shared {
    clients: Mutex<AHashMap<ChatId, ClientWriter>>,
    callbacks: Mutex<AHashMap<String, ChatId>>,
    next_message: AtomicI64,
    next_callback: AtomicU64,
    stopped: AtomicBool,
}

/// Line-protocol chat endpoint. Clients write `<user_id> <payload>` lines and
/// receive one JSON [`OutboundFrame`] per line for the chats they spoke in.
pub struct ChatServer {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
}

impl ChatServer {
    pub fn start(bind_addr: SocketAddr) -> io::Result<(ChatServer, Receiver<ServerEvent>)> {
        let listener = TcpListener::bind(bind_addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let (sender, receiver) = unbounded::<ServerEvent>();
        let shared = Arc::new(Shared::default());
        let accept_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name("chat-accept".to_string())
            .spawn(move || accept_loop(listener, accept_shared, sender))?;

        tracing::info!(target: "tide_pet::network", %local_addr, "chat_server.listening");
        Ok((ChatServer { shared, local_addr }, receiver))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn connected_chats(&self) -> usize {
        self.shared.clients.lock().len()
    }

    pub fn shutdown(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        for (_, writer) in self.shared.clients.lock().drain() {
            let _ = writer.lock().shutdown(std::net::Shutdown::Both);
        }
    }

    fn deliver(&self, chat: ChatId, frame: &OutboundFrame) -> Result<(), TransportError> {
        let line = frame.to_line().map_err(|err| TransportError::Delivery {
            chat,
            message: err.to_string(),
        })?;
        let writer = self
            .shared
            .clients
            .lock()
            .get(&chat)
            .cloned()
            .ok_or(TransportError::NotConnected(chat))?;
        // Only this chat's writer is held while the socket drains.
        let written = writer.lock().write_all(line.as_bytes());
        if let Err(err) = written {
            tracing::warn!(target: "tide_pet::network", %chat, error = %err, "client.dropped");
            let mut clients = self.shared.clients.lock();
            if clients.get(&chat).is_some_and(|current| Arc::ptr_eq(current, &writer)) {
                clients.remove(&chat);
            }
            return Err(TransportError::Delivery {
                chat,
                message: err.to_string(),
            });
        }
        Ok(())
    }
}

impl ChatTransport for ChatServer {
    fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<MessageId, TransportError> {
        let message_id = MessageId(self.shared.next_message.fetch_add(1, Ordering::Relaxed) + 1);
        self.deliver(
            chat,
            &OutboundFrame::Message {
                chat_id: chat,
                message_id,
                text: text.to_string(),
                keyboard: keyboard.clone(),
            },
        )?;
        Ok(message_id)
    }

    fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<(), TransportError> {
        self.deliver(
            chat,
            &OutboundFrame::Edit {
                chat_id: chat,
                message_id: message,
                text: text.to_string(),
                keyboard: keyboard.clone(),
            },
        )
    }

    fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        let Some(chat) = self.shared.callbacks.lock().remove(callback_id) else {
            return Ok(());
        };
        self.deliver(
            chat,
            &OutboundFrame::CallbackAnswer {
                callback_id: callback_id.to_string(),
            },
        )
    }
}

fn accept_loop(listener: TcpListener, shared: Arc<Shared>, sender: Sender<ServerEvent>) {
    while !shared.stopped.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, addr)) => {
                tracing::info!(target: "tide_pet::network", %addr, "client.connected");
                let configured = stream
                    .set_nonblocking(false)
                    .and_then(|()| stream.set_write_timeout(Some(WRITE_TIMEOUT)));
                if let Err(err) = configured {
                    tracing::warn!(target: "tide_pet::network", %addr, error = %err, "client.blocking_failed");
                    continue;
                }
                let shared = Arc::clone(&shared);
                let sender = sender.clone();
                thread::spawn(move || handle_client(stream, shared, sender));
            }
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                tracing::warn!(target: "tide_pet::network", error = %err, "client.accept_failed");
                thread::sleep(Duration::from_millis(200));
            }
        }
    }
}

fn handle_client(stream: TcpStream, shared: Arc<Shared>, sender: Sender<ServerEvent>) {
    let writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(err) => {
            tracing::warn!(target: "tide_pet::network", error = %err, "client.clone_failed");
            return;
        }
    };
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let event = match parse_inbound_line(trimmed) {
                    Ok(inbound) => to_event(inbound, &shared, &writer),
                    Err(err) => {
                        tracing::warn!(target: "tide_pet::network", line = trimmed, error = %err, "line.invalid");
                        continue;
                    }
                };
                if sender.send(event).is_err() {
                    break;
                }
            }
            Err(err) => {
                tracing::warn!(target: "tide_pet::network", error = %err, "client.read_failed");
                break;
            }
        }
    }
}

fn to_event(inbound: InboundLine, shared: &Shared, writer: &TcpStream) -> ServerEvent {
    let (user_id, message_id, payload) = match inbound {
        InboundLine::AdViewed { ad_id } => return ServerEvent::AdViewed(ad_id),
        InboundLine::Player {
            user_id,
            message_id,
            payload,
        } => (user_id, message_id, payload),
    };

    let chat = ChatId::from(user_id);
    // The latest connection a user spoke on receives their chat.
    match writer.try_clone() {
        Ok(stream) => {
            shared.clients.lock().insert(chat, Arc::new(Mutex::new(stream)));
        }
        Err(err) => {
            tracing::warn!(target: "tide_pet::network", %chat, error = %err, "client.register_failed");
        }
    }

    let kind = if payload.starts_with('/') {
        UpdateKind::Command { text: payload }
    } else {
        let serial = shared.next_callback.fetch_add(1, Ordering::Relaxed);
        let callback_id = format!("cb{serial}");
        shared.callbacks.lock().insert(callback_id.clone(), chat);
        UpdateKind::Callback {
            callback_id,
            data: payload,
            message_id,
        }
    };
    ServerEvent::Update(Update {
        user_id,
        chat_id: chat,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_schema::PlayerId;

    fn connect(server: &ChatServer) -> (TcpStream, BufReader<TcpStream>) {
        let stream = TcpStream::connect(server.local_addr()).unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());
        (stream, reader)
    }

    #[test]
    fn commands_and_callbacks_become_updates() {
        let (server, events) = ChatServer::start("127.0.0.1:0".parse().unwrap()).unwrap();
        let (mut client, _) = connect(&server);
        client.write_all(b"5 /start\n5 #3 portal\nad_viewed ab12\n").unwrap();

        let timeout = Duration::from_secs(5);
        let first = events.recv_timeout(timeout).unwrap();
        assert_eq!(
            first,
            ServerEvent::Update(Update {
                user_id: PlayerId(5),
                chat_id: ChatId(5),
                kind: UpdateKind::Command {
                    text: "/start".to_string()
                },
            })
        );
        match events.recv_timeout(timeout).unwrap() {
            ServerEvent::Update(Update {
                kind: UpdateKind::Callback { data, message_id, .. },
                ..
            }) => {
                assert_eq!(data, "portal");
                assert_eq!(message_id, Some(MessageId(3)));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(
            events.recv_timeout(timeout).unwrap(),
            ServerEvent::AdViewed("ab12".to_string())
        );
        server.shutdown();
    }

    #[test]
    fn replies_reach_the_chat_that_spoke() {
        let (server, events) = ChatServer::start("127.0.0.1:0".parse().unwrap()).unwrap();
        let (mut client, mut reader) = connect(&server);
        client.write_all(b"9 menu\n").unwrap();
        let callback_id = match events.recv_timeout(Duration::from_secs(5)).unwrap() {
            ServerEvent::Update(Update {
                kind: UpdateKind::Callback { callback_id, .. },
                ..
            }) => callback_id,
            other => panic!("unexpected event {other:?}"),
        };

        server.answer_callback(&callback_id).unwrap();
        let id = server
            .send_message(ChatId(9), "hello", &Keyboard::new())
            .unwrap();

        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(
            OutboundFrame::from_line(&line).unwrap(),
            OutboundFrame::CallbackAnswer { callback_id }
        );
        line.clear();
        reader.read_line(&mut line).unwrap();
        match OutboundFrame::from_line(&line).unwrap() {
            OutboundFrame::Message {
                chat_id,
                message_id,
                text,
                ..
            } => {
                assert_eq!(chat_id, ChatId(9));
                assert_eq!(message_id, id);
                assert_eq!(text, "hello");
            }
            other => panic!("unexpected frame {other:?}"),
        }
        assert!(matches!(
            server.send_message(ChatId(10), "nobody", &Keyboard::new()),
            Err(TransportError::NotConnected(ChatId(10)))
        ));
        server.shutdown();
    }

    #[test]
    fn a_client_that_stops_reading_does_not_stall_others() {
        let (server, events) = ChatServer::start("127.0.0.1:0".parse().unwrap()).unwrap();
        let (mut stalled, _unread) = connect(&server);
        let (mut active, mut active_reader) = connect(&server);
        stalled.write_all(b"1 /start\n").unwrap();
        events.recv_timeout(Duration::from_secs(5)).unwrap();
        active.write_all(b"2 /start\n").unwrap();
        events.recv_timeout(Duration::from_secs(5)).unwrap();

        let big = "x".repeat(64 * 1024);
        thread::scope(|scope| {
            let flood = scope.spawn(|| {
                (0..100_000).any(|_| server.send_message(ChatId(1), &big, &Keyboard::new()).is_err())
            });

            let mut line = String::new();
            for _ in 0..20 {
                thread::sleep(Duration::from_millis(50));
                let started = std::time::Instant::now();
                server
                    .send_message(ChatId(2), "still here", &Keyboard::new())
                    .unwrap();
                assert!(started.elapsed() < Duration::from_millis(500));
                line.clear();
                active_reader.read_line(&mut line).unwrap();
                assert!(line.contains("still here"));
            }

            assert!(flood.join().unwrap(), "stalled client was never dropped");
        });
        assert!(matches!(
            server.send_message(ChatId(1), "gone", &Keyboard::new()),
            Err(TransportError::NotConnected(ChatId(1)))
        ));
        server.shutdown();
    }
}
