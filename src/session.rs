use {
    crate::{
        auction,
        state::{
            ClientHandle,
            Store,
        },
    },
    std::{
        net::SocketAddr,
        sync::Arc,
    },
    tokio::{
        io::{
            AsyncBufReadExt,
            AsyncWriteExt,
            BufReader,
        },
        net::{
            tcp::OwnedWriteHalf,
            TcpStream,
        },
        sync::mpsc,
    },
};

/// Worker for one accepted connection. Reads request lines until the client
/// closes or errors, dispatching each one to the command processor under the
/// store lock. Replies travel through the session's channel to a dedicated
/// writer task, so any worker holding the store lock can queue notifications
/// for this client without touching the socket itself.
pub async fn run_session(store: Arc<Store>, stream: TcpStream, peer: SocketAddr) {
    let id = store.next_session_id();
    tracing::info!(session = id, %peer, "Client connected");

    let (read_half, write_half) = stream.into_split();
    let (sender, receiver) = mpsc::unbounded_channel();
    let client = ClientHandle::new(id, sender);
    tokio::spawn(write_replies(receiver, write_half));

    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let mut auction = store.auction.lock().await;
                auction::handle_line(&mut auction, &client, &line);
            }
            // End of stream or a fatal read error both close the session.
            Ok(None) | Err(_) => break,
        }
    }

    // The session is gone but its listings are not: mark it dead wherever it
    // is seller or top bidder and leave settlement to the expiry sweeper.
    {
        let mut auction = store.auction.lock().await;
        auction.mark_disconnected(id);
    }
    store.session_closed();
    tracing::info!(session = id, "Client disconnected");
    // The writer task winds down on its own once the last listing holding a
    // handle to this session is retired and the channel closes.
}

/// Drain one session's reply channel to its socket, flushing after every
/// line. Stops on write failure or once every sender is gone.
async fn write_replies(mut receiver: mpsc::UnboundedReceiver<String>, mut writer: OwnedWriteHalf) {
    while let Some(line) = receiver.recv().await {
        if writer.write_all(line.as_bytes()).await.is_err()
            || writer.write_all(b"\n").await.is_err()
            || writer.flush().await.is_err()
        {
            break;
        }
    }
}
