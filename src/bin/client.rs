//! Interactive text client for the auctioneer server.
//!
//! A thin adapter with no coordination logic: operator lines from stdin are
//! forwarded to the server, every server line is echoed to stdout, and two
//! net counters (active listings, active bids) gate the `quit` command so an
//! operator cannot walk away from an auction still in progress.

use {
    clap::Parser,
    std::sync::{
        atomic::{
            AtomicI64,
            Ordering,
        },
        Arc,
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
    },
};

const CONNECT_ERR_EXIT: i32 = 4;
const PIPE_ERR_EXIT: i32 = 5;
const AUCTION_EXIT: i32 = 14;

const AUCTION_PROGRESS_MSG: &str = "Auction in progress - unable to exit yet";
const AUCTION_EXIT_MSG: &str = "Exiting with auction still in progress";
const PIPE_ERR_MSG: &str = "auctionclient: server connection terminated";

#[derive(Parser, Debug)]
#[command(name = "auctionclient")]
#[command(about = "Interactive client for the auctioneer server")]
struct Options {
    /// Port the auctioneer server is listening on.
    port: u16,
}

/// Net bookkeeping of the operator's stake in running auctions, updated from
/// the server's reply stream. Both counters return to zero once every
/// listing the operator sold or bid on has been settled.
#[derive(Default)]
struct AuctionProgress {
    listed: AtomicI64,
    bids:   AtomicI64,
}

impl AuctionProgress {
    fn apply_server_line(&self, line: &str) {
        match line.split_whitespace().next() {
            Some(":listed") => {
                self.listed.fetch_add(1, Ordering::SeqCst);
            }
            Some(":sold") | Some(":unsold") => {
                self.listed.fetch_sub(1, Ordering::SeqCst);
            }
            Some(":bid") => {
                self.bids.fetch_add(1, Ordering::SeqCst);
            }
            Some(":outbid") | Some(":won") => {
                self.bids.fetch_sub(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }

    fn idle(&self) -> bool {
        self.listed.load(Ordering::SeqCst) == 0 && self.bids.load(Ordering::SeqCst) == 0
    }
}

#[tokio::main]
async fn main() {
    let options = Options::parse();

    let stream = match TcpStream::connect(("localhost", options.port)).await {
        Ok(stream) => stream,
        Err(_) => {
            eprintln!("auctionclient: unable to connect to port {}", options.port);
            std::process::exit(CONNECT_ERR_EXIT);
        }
    };
    let (read_half, write_half) = stream.into_split();

    let progress = Arc::new(AuctionProgress::default());
    tokio::spawn(forward_stdin(write_half, progress.clone()));

    // Echo every server line and keep the progress counters current.
    let mut lines = BufReader::new(read_half).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        println!("{line}");
        progress.apply_server_line(&line);
    }

    // Server closed the connection (or errored): terminate immediately.
    eprintln!("{PIPE_ERR_MSG}");
    std::process::exit(PIPE_ERR_EXIT);
}

/// Forward operator lines to the server. Empty lines and `#` comments are
/// dropped locally; the literal `quit` is only honored when no auction the
/// operator is part of remains unsettled.
async fn forward_stdin(mut writer: OwnedWriteHalf, progress: Arc<AuctionProgress>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line == "quit" {
            if !progress.idle() {
                println!("{AUCTION_PROGRESS_MSG}");
                continue;
            }
            std::process::exit(0);
        }

        if writer.write_all(format!("{line}\n").as_bytes()).await.is_err()
            || writer.flush().await.is_err()
        {
            eprintln!("{PIPE_ERR_MSG}");
            std::process::exit(PIPE_ERR_EXIT);
        }
    }

    // Stdin closed.
    if !progress.idle() {
        eprintln!("{AUCTION_EXIT_MSG}");
        std::process::exit(AUCTION_EXIT);
    }
    std::process::exit(0);
}
