#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{net::SocketAddr, time::Duration};

use serde::Deserialize;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::broadcast,
};
use twmailer_common::{
    Signal,
    error::{ProtocolError, SessionError},
    listener::Listener,
    traits::protocol::{Protocol, SessionHandler},
};

/// Writes its greeting and hangs up.
#[derive(Default)]
struct Greeter;

#[derive(Clone, Debug, Default, Deserialize)]
struct GreeterArgs {
    #[serde(default)]
    greeting: String,
}

struct GreeterSession {
    stream: TcpStream,
    greeting: String,
}

impl SessionHandler for GreeterSession {
    async fn run(mut self, _signal: broadcast::Receiver<Signal>) -> Result<(), SessionError> {
        self.stream.write_all(self.greeting.as_bytes()).await?;
        self.stream.shutdown().await?;
        Ok(())
    }
}

impl Protocol for Greeter {
    type Session = GreeterSession;
    type Args = GreeterArgs;

    fn handle(&self, stream: TcpStream, _peer: SocketAddr, args: Self::Args) -> Self::Session {
        GreeterSession {
            stream,
            greeting: args.greeting,
        }
    }

    fn validate(&self, args: &mut Self::Args) -> Result<(), ProtocolError> {
        if args.greeting.is_empty() {
            return Err(ProtocolError::MissingField("greeting"));
        }
        Ok(())
    }

    fn ty() -> &'static str {
        "Greeter"
    }
}

fn listener(greeting: &str) -> Listener<Greeter> {
    Listener::new(
        "127.0.0.1:0".parse().unwrap(),
        GreeterArgs {
            greeting: greeting.to_string(),
        },
    )
}

#[test]
fn test_init_rejects_zero_sessions() {
    let mut listener = listener("hello").with_max_sessions(0);
    assert!(matches!(
        listener.init(),
        Err(ProtocolError::InvalidConfiguration { .. })
    ));
}

#[test]
fn test_init_runs_protocol_validation() {
    let mut listener = listener("");
    assert!(matches!(
        listener.init(),
        Err(ProtocolError::MissingField("greeting"))
    ));
}

#[test]
fn test_map_args_and_port() {
    let mut listener = listener("hello");
    listener.map_args(|mut args| {
        args.greeting.push_str(", world");
        args
    });
    listener.set_port(7000);

    assert_eq!(listener.options().greeting, "hello, world");
    assert_eq!(listener.socket().port(), 7000);
}

#[test]
fn test_listener_from_ron() {
    let listener: Listener<Greeter> =
        ron::from_str(r#"(socket: "127.0.0.1:6543", options: (greeting: "hi"))"#).unwrap();
    assert_eq!(listener.socket().port(), 6543);
    assert_eq!(listener.options().greeting, "hi");
}

#[tokio::test]
async fn test_serve_until_shutdown() {
    let mut listener = listener("hello\n");
    listener.init().unwrap();

    let socket = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = socket.local_addr().unwrap();

    let (shutdown, receiver) = broadcast::channel(4);
    let server = tokio::spawn(async move { listener.serve_on(socket, receiver).await });

    for _ in 0..3 {
        let mut stream = TcpStream::connect(address).await.unwrap();
        let mut greeting = String::new();
        stream.read_to_string(&mut greeting).await.unwrap();
        assert_eq!(greeting, "hello\n");
    }

    shutdown.send(Signal::Shutdown).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("listener did not stop")
        .unwrap()
        .unwrap();
}
