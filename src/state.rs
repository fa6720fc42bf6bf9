use {
    crate::protocol::Reply,
    std::sync::atomic::{
        AtomicU64,
        AtomicUsize,
        Ordering,
    },
    time::OffsetDateTime,
    tokio::sync::{
        mpsc,
        Mutex,
    },
};

/// Stable per-connection identity. A reconnecting client always receives a
/// fresh id and has no claim on listings or bids of a previous connection.
pub type SessionId = u64;

/// Handle to a connected client: its identity plus the channel its writer
/// task drains to the socket. Clones of this handle live inside listings for
/// the seller and current top bidder, so notifications can be queued for a
/// session by whichever worker holds the store lock.
#[derive(Clone, Debug)]
pub struct ClientHandle {
    pub id: SessionId,
    sender: mpsc::UnboundedSender<String>,
}

impl ClientHandle {
    pub fn new(id: SessionId, sender: mpsc::UnboundedSender<String>) -> Self {
        Self { id, sender }
    }

    /// Queue one reply line for delivery. Sending to a session whose writer
    /// task has already gone away is a no-op: nothing is owed to a client
    /// that disconnected.
    pub fn send(&self, reply: Reply) {
        let _ = self.sender.send(reply.to_string());
    }
}

/// One active listing. Created by a valid `sell`, mutated by accepted bids,
/// removed only by the expiry sweeper.
#[derive(Debug)]
pub struct Listing {
    pub item:        String,
    pub reserve:     i64,
    pub duration:    i64,
    pub expiry:      OffsetDateTime,
    /// 0 until the first accepted bid.
    pub highest_bid: i64,
    pub seller:      ClientHandle,
    pub seller_live: bool,
    pub top_bidder:  Option<ClientHandle>,
    pub bidder_live: bool,
}

impl Listing {
    /// Time left before expiry, for `:list` display. Negative once the
    /// expiry instant has passed but the sweeper has not retired the
    /// listing yet; never used to decide whether the listing is active.
    pub fn remaining_ms(&self, now: OffsetDateTime) -> i64 {
        (self.expiry - now).whole_milliseconds() as i64
    }
}

/// All active listings in insertion order. Only ever touched through the
/// store-wide lock in `Store`; nothing in here performs I/O beyond queueing
/// reply lines onto session channels.
#[derive(Default, Debug)]
pub struct AuctionState {
    pub listings: Vec<Listing>,
}

impl AuctionState {
    pub fn find(&self, item: &str) -> Option<&Listing> {
        self.listings.iter().find(|listing| listing.item == item)
    }

    pub fn find_mut(&mut self, item: &str) -> Option<&mut Listing> {
        self.listings
            .iter_mut()
            .find(|listing| listing.item == item)
    }

    /// A session's connection closed: mark it dead wherever it is the seller
    /// or the current top bidder. The listings themselves stay untouched so
    /// the sweeper can still settle them (a departed seller's item can still
    /// sell, a departed bidder's win stays on the books).
    pub fn mark_disconnected(&mut self, id: SessionId) {
        for listing in &mut self.listings {
            if listing.seller.id == id {
                listing.seller_live = false;
            }
            if let Some(top_bidder) = &listing.top_bidder {
                if top_bidder.id == id {
                    listing.bidder_live = false;
                }
            }
        }
    }
}

/// Shared server state: the auction store behind its single coarse lock plus
/// the session bookkeeping counters. Every read or mutation of listing state
/// happens while holding `auction`; the counters are deliberately outside it
/// so the acceptor's capacity poll never touches the lock.
pub struct Store {
    pub auction:     Mutex<AuctionState>,
    active_sessions: AtomicUsize,
    session_counter: AtomicU64,
}

impl Store {
    pub fn new() -> Self {
        Self {
            auction:         Mutex::new(AuctionState::default()),
            active_sessions: AtomicUsize::new(0),
            session_counter: AtomicU64::new(0),
        }
    }

    pub fn next_session_id(&self) -> SessionId {
        self.session_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    pub fn session_opened(&self) {
        self.active_sessions.fetch_add(1, Ordering::SeqCst);
    }

    pub fn session_closed(&self) {
        self.active_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        time::Duration,
    };

    fn handle(id: SessionId) -> (ClientHandle, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (ClientHandle::new(id, sender), receiver)
    }

    fn listing(item: &str, seller: &ClientHandle) -> Listing {
        Listing {
            item:        item.to_string(),
            reserve:     10,
            duration:    30,
            expiry:      OffsetDateTime::now_utc() + Duration::seconds(30),
            highest_bid: 0,
            seller:      seller.clone(),
            seller_live: true,
            top_bidder:  None,
            bidder_live: false,
        }
    }

    #[test]
    fn test_mark_disconnected_flips_roles_but_keeps_listings() {
        let (seller, _seller_rx) = handle(1);
        let (bidder, _bidder_rx) = handle(2);

        let mut state = AuctionState::default();
        state.listings.push(listing("widget", &seller));
        state.listings.push(listing("gadget", &bidder));
        let widget = state.find_mut("widget").unwrap();
        widget.top_bidder = Some(bidder.clone());
        widget.bidder_live = true;
        widget.highest_bid = 15;

        state.mark_disconnected(bidder.id);

        assert_eq!(state.listings.len(), 2);
        let widget = state.find("widget").unwrap();
        assert!(widget.seller_live);
        assert!(!widget.bidder_live);
        assert_eq!(widget.highest_bid, 15);
        let gadget = state.find("gadget").unwrap();
        assert!(!gadget.seller_live);
    }

    #[test]
    fn test_session_counters() {
        let store = Store::new();
        assert_eq!(store.next_session_id(), 0);
        assert_eq!(store.next_session_id(), 1);

        assert_eq!(store.active_sessions(), 0);
        store.session_opened();
        store.session_opened();
        assert_eq!(store.active_sessions(), 2);
        store.session_closed();
        assert_eq!(store.active_sessions(), 1);
    }

    #[test]
    fn test_send_to_closed_session_is_silent() {
        let (client, receiver) = handle(7);
        drop(receiver);
        client.send(Reply::Rejected);
    }
}
